// SPDX-License-Identifier: Apache-2.0

pub mod logging;
pub mod metrics;

pub use metrics::{RequestMetrics, ScanMetrics};
