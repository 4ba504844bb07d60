// SPDX-License-Identifier: Apache-2.0

pub mod handlers;
pub mod request_tracing;

use crate::catalog::{Catalog, RescanTrigger};
use crate::render::IpxeRenderer;
use crate::store::DistroStore;
use crate::telemetry::RequestMetrics;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub renderer: Arc<IpxeRenderer>,
    pub distros: Arc<dyn DistroStore>,
    pub rescan: RescanTrigger,
    pub http_server: Arc<str>,
    pub accepting_requests: Arc<AtomicBool>,
    pub(crate) requests: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        renderer: Arc<IpxeRenderer>,
        distros: Arc<dyn DistroStore>,
        rescan: RescanTrigger,
        http_server: &str,
    ) -> Self {
        Self {
            catalog,
            renderer,
            distros,
            rescan,
            http_server: Arc::from(http_server),
            accepting_requests: Arc::new(AtomicBool::new(true)),
            requests: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/boot.ipxe", get(handlers::ipxe_redirect_handler))
        .route("/:mac/boot.ipxe", get(handlers::ipxe_menu_handler))
        .route("/distros/", get(handlers::distro_root_handler))
        .route("/distros/*path", get(handlers::distro_file_handler))
        .route("/healthz", get(handlers::healthz_handler))
        .route("/readyz", get(handlers::readyz_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/admin/rescan", post(handlers::rescan_handler))
        .fallback(handlers::not_found_handler)
        .layer(from_fn_with_state(
            state.clone(),
            request_tracing::request_tracing_middleware,
        ))
        .with_state(state)
}
