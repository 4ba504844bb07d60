#![forbid(unsafe_code)]
//! Network boot server.
//!
//! A [`catalog::Catalog`] scans the distribution tree, the refresh scheduler
//! keeps it current, and an [`render::IpxeRenderer`] subscribed to the
//! catalog turns each snapshot into the iPXE menu served over HTTP.

pub mod catalog;
pub mod config;
pub mod http;
pub mod render;
pub mod store;
pub mod telemetry;

pub use catalog::{
    spawn_refresh_scheduler, Catalog, RescanTrigger, ScanError, Snapshot, SnapshotReceiver,
    SoftFailure,
};
pub use config::{ConfigError, ServerConfig};
pub use http::{build_router, AppState};
pub use render::{IpxeRenderer, RenderError, VarsConfig, DEFAULT_IPXE_TEMPLATE};
pub use store::fake::FakeStore;
pub use store::local_fs::LocalFsStore;
pub use store::{DirEntry, DistroStore, EntryKind, FileSource, StoreError};
pub use telemetry::{RequestMetrics, ScanMetrics};
