// SPDX-License-Identifier: Apache-2.0

use crate::store::{join_path, DistroStore, StoreError};
use crate::telemetry::ScanMetrics;
use netboot_model::{BootEntry, DistroManifest, MANIFEST_FILE_NAME};
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use tracing::{debug, error, trace};

/// Failures that abort a scan. The previous snapshot stays current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    RootReadFailed { message: String },
    VersionScanFailed { family: String, message: String },
    /// The blocking scan task panicked or was cancelled.
    ScanTaskFailed { message: String },
}

impl ScanError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RootReadFailed { .. } => "root_read_failed",
            Self::VersionScanFailed { .. } => "version_scan_failed",
            Self::ScanTaskFailed { .. } => "scan_task_failed",
        }
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootReadFailed { message } => {
                write!(f, "cannot read distribution root: {message}")
            }
            Self::VersionScanFailed { family, message } => {
                write!(f, "cannot enumerate versions of {family}: {message}")
            }
            Self::ScanTaskFailed { message } => write!(f, "scan task failed: {message}"),
        }
    }
}

impl std::error::Error for ScanError {}

/// Failures that skip one family, version or architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFailure {
    FamilyRead,
    ManifestRead,
    ManifestDecode,
    ArchCandidateRead,
    ListFilesRead,
}

impl SoftFailure {
    pub const ALL: [Self; 5] = [
        Self::FamilyRead,
        Self::ManifestRead,
        Self::ManifestDecode,
        Self::ArchCandidateRead,
        Self::ListFilesRead,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FamilyRead => "family_read_failed",
            Self::ManifestRead => "manifest_read_failed",
            Self::ManifestDecode => "manifest_decode_failed",
            Self::ArchCandidateRead => "arch_candidate_read_failed",
            Self::ListFilesRead => "list_files_read_failed",
        }
    }
}

fn soft(metrics: &ScanMetrics, kind: SoftFailure, path: &str, err: &dyn Display) {
    metrics.record_soft_failure(kind.as_str());
    debug!(reason = kind.as_str(), path, error = %err, "skipping distribution candidate");
}

fn hard(metrics: &ScanMetrics, err: ScanError) -> ScanError {
    metrics.record_hard_failure(err.reason());
    error!(reason = err.reason(), error = %err, "distribution scan aborted");
    err
}

/// Walks `<family>/<version>/<arch>/` and returns the version-ordered,
/// default-reconciled entries.
pub fn scan_distributions(
    store: &dyn DistroStore,
    metrics: &ScanMetrics,
) -> Result<Vec<BootEntry>, ScanError> {
    let families = store.read_dir("").map_err(|e| {
        hard(
            metrics,
            ScanError::RootReadFailed {
                message: e.to_string(),
            },
        )
    })?;

    let mut entries = Vec::new();
    for family in families.iter().filter(|e| e.is_dir()) {
        scan_family(store, metrics, &family.name, &mut entries)?;
    }
    entries.sort_by(BootEntry::catalog_order);
    Ok(reconcile_defaults(entries))
}

fn scan_family(
    store: &dyn DistroStore,
    metrics: &ScanMetrics,
    family: &str,
    entries: &mut Vec<BootEntry>,
) -> Result<(), ScanError> {
    let children = match store.read_dir(family) {
        Ok(children) => children,
        Err(err) => {
            soft(metrics, SoftFailure::FamilyRead, family, &err);
            return Ok(());
        }
    };
    if !children
        .iter()
        .any(|c| c.is_file() && c.name == MANIFEST_FILE_NAME)
    {
        trace!(family, "no manifest; skipping family");
        return Ok(());
    }

    let manifest_path = join_path(family, MANIFEST_FILE_NAME);
    let raw = match store.read_file(&manifest_path) {
        Ok(raw) => raw,
        Err(err) => {
            soft(metrics, SoftFailure::ManifestRead, &manifest_path, &err);
            return Ok(());
        }
    };
    let manifest = match DistroManifest::from_yaml_slice(&raw) {
        Ok(manifest) => manifest,
        Err(err) => {
            soft(metrics, SoftFailure::ManifestDecode, &manifest_path, &err);
            return Ok(());
        }
    };

    let versions = store.read_dir(family).map_err(|e: StoreError| {
        hard(
            metrics,
            ScanError::VersionScanFailed {
                family: family.to_string(),
                message: e.to_string(),
            },
        )
    })?;

    for version in versions.iter().filter(|e| e.is_dir()) {
        let version_path = join_path(family, &version.name);
        let arches = match store.read_dir(&version_path) {
            Ok(arches) => arches,
            Err(err) => {
                soft(metrics, SoftFailure::ArchCandidateRead, &version_path, &err);
                continue;
            }
        };
        for arch in arches.iter().filter(|e| e.is_dir()) {
            let arch_path = join_path(&version_path, &arch.name);
            let files = match store.read_dir(&arch_path) {
                Ok(files) => files,
                Err(err) => {
                    soft(metrics, SoftFailure::ListFilesRead, &arch_path, &err);
                    continue;
                }
            };
            let regular: BTreeSet<String> = files
                .into_iter()
                .filter(|f| f.is_file())
                .map(|f| f.name)
                .collect();
            if manifest.boot_files_present(&regular) {
                entries.push(BootEntry::new(family, &manifest, &version.name, &arch.name));
            } else {
                trace!(path = %arch_path, "kernel or initrd missing; skipping");
            }
        }
    }
    Ok(())
}

/// Keeps the first default per architecture in the given order and clears
/// the flag on every later claimant.
#[must_use]
pub fn reconcile_defaults(entries: Vec<BootEntry>) -> Vec<BootEntry> {
    let mut claimed: HashSet<String> = HashSet::new();
    entries
        .into_iter()
        .map(|entry| {
            if !entry.is_default() || claimed.insert(entry.architecture().to_string()) {
                entry
            } else {
                debug!(slug = %entry.slug(), "demoting duplicate default");
                entry.without_default()
            }
        })
        .collect()
}
