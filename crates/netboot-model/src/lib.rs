#![forbid(unsafe_code)]
//! Boot catalog value types.
//!
//! A distribution tree is laid out as
//! `<short_name>/distro.yaml` plus `<short_name>/<version>/<arch>/<files>`.
//! This crate holds the immutable values derived from it; walking the tree
//! lives in the server crate.

mod entry;
mod error;
mod kernel_args;
mod manifest;
mod version;

pub use entry::{BootEntry, EntryFields, CONSOLE_ARGUMENT, DISTRO_URL_PREFIX};
pub use error::{ManifestError, TemplateError};
pub use kernel_args::KernelArgument;
pub use manifest::{DistroManifest, MANIFEST_FILE_NAME};
pub use version::{compare_versions, is_semver, semver_precedence};
