// SPDX-License-Identifier: Apache-2.0

use crate::kernel_args::KernelArgument;
use crate::manifest::DistroManifest;
use crate::version::compare_versions;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const CONSOLE_ARGUMENT: &str = "console=ttyS0,115200n8";
pub const DISTRO_URL_PREFIX: &str = "/distros";

/// One bootable image variant: a family manifest bound to a concrete
/// `<version>/<architecture>` directory that holds its kernel and initrd.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootEntry {
    short_name: String,
    name: String,
    default: bool,
    full_version: String,
    architecture: String,
    kernel: String,
    initrd: String,
    kernel_args: Vec<KernelArgument>,
    files: BTreeMap<String, serde_yaml::Value>,
}

/// Values a template can reference for one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryFields<'a> {
    pub short_name: &'a str,
    pub name: &'a str,
    pub default: bool,
    pub full_version: &'a str,
    pub base_version: &'a str,
    pub architecture: &'a str,
    pub kernel: &'a str,
    pub initrd: &'a str,
    pub slug: String,
    pub distro_path: String,
    pub files: &'a BTreeMap<String, serde_yaml::Value>,
}

impl BootEntry {
    #[must_use]
    pub fn new(
        short_name: &str,
        manifest: &DistroManifest,
        full_version: &str,
        architecture: &str,
    ) -> Self {
        Self {
            short_name: short_name.to_string(),
            name: manifest.name.clone(),
            default: manifest.default,
            full_version: full_version.to_string(),
            architecture: architecture.to_string(),
            kernel: manifest.kernel.clone(),
            initrd: manifest.initrd.clone(),
            kernel_args: manifest.kernel_args.clone(),
            files: manifest.files.clone(),
        }
    }

    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.default
    }

    #[must_use]
    pub fn full_version(&self) -> &str {
        &self.full_version
    }

    #[must_use]
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    #[must_use]
    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    #[must_use]
    pub fn initrd(&self) -> &str {
        &self.initrd
    }

    #[must_use]
    pub fn kernel_args(&self) -> &[KernelArgument] {
        &self.kernel_args
    }

    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.files
    }

    /// Copy of this entry with the default flag cleared.
    #[must_use]
    pub fn without_default(mut self) -> Self {
        self.default = false;
        self
    }

    #[must_use]
    pub fn slug(&self) -> String {
        format!(
            "{}-{}-{}",
            self.short_name, self.full_version, self.architecture
        )
    }

    #[must_use]
    pub fn distro_path(&self) -> String {
        format!(
            "{DISTRO_URL_PREFIX}/{}/{}/{}",
            self.short_name, self.full_version, self.architecture
        )
    }

    /// `major.minor` of versions with three or more components.
    #[must_use]
    pub fn base_version(&self) -> &str {
        let mut dots = self.full_version.match_indices('.');
        match (dots.next(), dots.next()) {
            (Some(_), Some((idx, _))) => &self.full_version[..idx],
            _ => &self.full_version,
        }
    }

    /// `initrd=` first, manifest arguments in order, console last. Arguments
    /// whose template fails to render are left out.
    #[must_use]
    pub fn kernel_command_line(&self) -> String {
        let mut out = vec![format!("initrd={}", self.initrd)];
        out.extend(
            self.kernel_args
                .iter()
                .filter_map(|arg| arg.render(self).ok()),
        );
        out.push(CONSOLE_ARGUMENT.to_string());
        out.join(" ")
    }

    #[must_use]
    pub fn template_fields(&self) -> EntryFields<'_> {
        EntryFields {
            short_name: &self.short_name,
            name: &self.name,
            default: self.default,
            full_version: &self.full_version,
            base_version: self.base_version(),
            architecture: &self.architecture,
            kernel: &self.kernel,
            initrd: &self.initrd,
            slug: self.slug(),
            distro_path: self.distro_path(),
            files: &self.files,
        }
    }

    /// Catalog order: newest version first, then family and architecture
    /// name ascending.
    #[must_use]
    pub fn catalog_order(a: &Self, b: &Self) -> Ordering {
        compare_versions(&b.full_version, &a.full_version)
            .then_with(|| a.short_name.cmp(&b.short_name))
            .then_with(|| a.architecture.cmp(&b.architecture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> DistroManifest {
        DistroManifest::from_yaml_slice(
            b"name: Alpine Linux\ndefault: true\nkernel: vmlinuz-lts\ninitrd: initramfs-lts\n",
        )
        .expect("manifest")
    }

    #[test]
    fn derived_values_follow_directory_coordinates() {
        let entry = BootEntry::new("alpine", &manifest(), "3.18.4", "x86_64");
        assert_eq!(entry.slug(), "alpine-3.18.4-x86_64");
        assert_eq!(entry.distro_path(), "/distros/alpine/3.18.4/x86_64");
        assert_eq!(entry.base_version(), "3.18");
    }

    #[test]
    fn base_version_keeps_short_versions() {
        let entry = BootEntry::new("alpine", &manifest(), "3.18", "x86_64");
        assert_eq!(entry.base_version(), "3.18");
        let entry = BootEntry::new("alpine", &manifest(), "edge", "x86_64");
        assert_eq!(entry.base_version(), "edge");
    }

    #[test]
    fn without_default_only_clears_flag() {
        let entry = BootEntry::new("alpine", &manifest(), "3.18.4", "x86_64");
        let demoted = entry.clone().without_default();
        assert!(entry.is_default());
        assert!(!demoted.is_default());
        assert_eq!(entry.slug(), demoted.slug());
    }
}
