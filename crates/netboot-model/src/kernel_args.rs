// SPDX-License-Identifier: Apache-2.0

use crate::entry::BootEntry;
use crate::error::{ManifestError, TemplateError};
use minijinja::{Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RawKernelArgument {
    key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    template: String,
}

/// One `kernel_args` item of a distribution manifest.
///
/// The manifest form is a mapping with a `key` and at most one of `value` or
/// `template`; `value` takes precedence when both are given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKernelArgument", into = "RawKernelArgument")]
#[non_exhaustive]
pub enum KernelArgument {
    Literal { key: String, value: String },
    Template { key: String, template: String },
    Unary { key: String },
}

impl TryFrom<RawKernelArgument> for KernelArgument {
    type Error = ManifestError;

    fn try_from(raw: RawKernelArgument) -> Result<Self, Self::Error> {
        if raw.key.trim().is_empty() {
            return Err(ManifestError(
                "kernel argument requires a non-empty key".to_string(),
            ));
        }
        if !raw.value.is_empty() {
            Ok(Self::Literal {
                key: raw.key,
                value: raw.value,
            })
        } else if !raw.template.is_empty() {
            Ok(Self::Template {
                key: raw.key,
                template: raw.template,
            })
        } else {
            Ok(Self::Unary { key: raw.key })
        }
    }
}

impl From<KernelArgument> for RawKernelArgument {
    fn from(arg: KernelArgument) -> Self {
        match arg {
            KernelArgument::Literal { key, value } => Self {
                key,
                value,
                template: String::new(),
            },
            KernelArgument::Template { key, template } => Self {
                key,
                value: String::new(),
                template,
            },
            KernelArgument::Unary { key } => Self {
                key,
                value: String::new(),
                template: String::new(),
            },
        }
    }
}

impl KernelArgument {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Literal { key, .. } | Self::Template { key, .. } | Self::Unary { key } => key,
        }
    }

    /// Renders the argument as it appears on the kernel command line.
    pub fn render(&self, entry: &BootEntry) -> Result<String, TemplateError> {
        match self {
            Self::Literal { key, value } => Ok(format_pair(key, value)),
            Self::Template { key, template } => {
                let value = render_value(template, entry)?;
                Ok(format_pair(key, &value))
            }
            Self::Unary { key } => Ok(key.clone()),
        }
    }
}

fn render_value(template: &str, entry: &BootEntry) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.render_str(template, entry.template_fields())
        .map_err(|e| TemplateError(format!("kernel argument template: {e}")))
}

fn format_pair(key: &str, value: &str) -> String {
    if value.contains([' ', '\t', '=']) {
        format!("{key}={}", quote(value))
    } else {
        format!("{key}={value}")
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
