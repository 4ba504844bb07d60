// SPDX-License-Identifier: Apache-2.0

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Operator-supplied menu variables.
///
/// ```yaml
/// default_vars:
///   console: ttyS0
/// product_vars:
///   edge-router:
///     console: tty0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarsConfig {
    #[serde(default)]
    pub default_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub product_vars: BTreeMap<String, BTreeMap<String, String>>,
}

impl VarsConfig {
    pub fn from_yaml_slice(raw: &[u8]) -> Result<Self, ConfigError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_yaml::from_slice(raw).map_err(|e| ConfigError(format!("decode vars: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path)
            .map_err(|e| ConfigError(format!("read vars {}: {e}", path.display())))?;
        Self::from_yaml_slice(&raw)
    }
}
