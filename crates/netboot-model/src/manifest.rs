// SPDX-License-Identifier: Apache-2.0

use crate::error::ManifestError;
use crate::kernel_args::KernelArgument;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MANIFEST_FILE_NAME: &str = "distro.yaml";

/// Family-level metadata read from `<family>/distro.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistroManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: bool,
    pub kernel: String,
    pub initrd: String,
    #[serde(default)]
    pub kernel_args: Vec<KernelArgument>,
    #[serde(default)]
    pub files: BTreeMap<String, serde_yaml::Value>,
}

impl DistroManifest {
    pub fn from_yaml_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Self = serde_yaml::from_slice(bytes)
            .map_err(|e| ManifestError(format!("decode {MANIFEST_FILE_NAME}: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        for (field, value) in [("kernel", &self.kernel), ("initrd", &self.initrd)] {
            if value.trim().is_empty() {
                return Err(ManifestError(format!("{field} must not be empty")));
            }
            if value.contains('/') {
                return Err(ManifestError(format!(
                    "{field} must be a plain file name, got `{value}`"
                )));
            }
        }
        Ok(())
    }

    /// True when both boot files appear among `files`.
    #[must_use]
    pub fn boot_files_present(&self, files: &BTreeSet<String>) -> bool {
        files.contains(&self.kernel) && files.contains(&self.initrd)
    }
}
