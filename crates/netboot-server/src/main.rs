#![forbid(unsafe_code)]

#[cfg(unix)]
use netboot_server::catalog::scheduler::spawn_hangup_listener;
use netboot_server::telemetry::logging::init_tracing;
use netboot_server::{
    build_router, spawn_refresh_scheduler, AppState, Catalog, DistroStore, IpxeRenderer,
    LocalFsStore, RescanTrigger, ScanError, ScanMetrics, ServerConfig, VarsConfig,
    DEFAULT_IPXE_TEMPLATE,
};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("cannot register SIGTERM/SIGINT; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn load_template(cfg: &ServerConfig) -> Result<String, String> {
    match &cfg.ipxe_template_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("read iPXE template {}: {e}", path.display())),
        None => Ok(DEFAULT_IPXE_TEMPLATE.to_string()),
    }
}

#[cfg(not(unix))]
fn spawn_hangup_listener(
    _trigger: RescanTrigger,
    _shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cfg = ServerConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;
    init_tracing(cfg.log_json);
    info!(
        config = %serde_json::to_string(&cfg).unwrap_or_default(),
        "netboot-server starting"
    );

    let vars = VarsConfig::load(&cfg.vars_config_path).map_err(|e| e.to_string())?;
    let template = load_template(&cfg)?;
    let renderer = Arc::new(IpxeRenderer::new(
        vars,
        cfg.http_server.clone(),
        cfg.ntp_server.clone(),
    ));
    renderer
        .parse_template(&template)
        .await
        .map_err(|e| e.to_string())?;

    let metrics = Arc::new(ScanMetrics::new());
    let store: Arc<dyn DistroStore> = Arc::new(LocalFsStore::new(cfg.distro_root.clone()));
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<ScanError>(cfg.fatal_error_capacity);
    let catalog = Catalog::load(Arc::clone(&store), metrics, fatal_tx)
        .await
        .map_err(|e| format!("initial distribution scan failed: {e}"))?;

    let shutdown = CancellationToken::new();
    let rescan = RescanTrigger::new();
    let watcher = renderer.spawn_watch(catalog.register_watcher(), shutdown.clone());
    let scheduler = spawn_refresh_scheduler(
        Arc::clone(&catalog),
        cfg.scan_interval,
        rescan.clone(),
        shutdown.clone(),
    );
    let hangups = spawn_hangup_listener(rescan.clone(), shutdown.clone());

    let state = AppState::new(
        Arc::clone(&catalog),
        Arc::clone(&renderer),
        store,
        rescan,
        &cfg.http_server,
    );
    let app = build_router(state.clone());
    let listener = TcpListener::bind(&cfg.bind_addr)
        .await
        .map_err(|e| format!("bind {} failed: {e}", cfg.bind_addr))?;
    info!(bind = %cfg.bind_addr, "netboot-server listening");

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
    });

    let fatal = tokio::select! {
        Some(err) = fatal_rx.recv() => Some(err),
        () = wait_for_shutdown_signal() => None,
    };
    match &fatal {
        Some(err) => error!(reason = err.reason(), error = %err, "fatal scan error; shutting down"),
        None => info!("shutdown signal received"),
    }

    state.accepting_requests.store(false, Ordering::Relaxed);
    if !cfg.shutdown_drain.is_zero() {
        tokio::time::sleep(cfg.shutdown_drain).await;
    }
    shutdown.cancel();

    let _ = tokio::join!(scheduler, watcher, hangups);
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("server failed: {e}")),
        Err(e) => return Err(format!("server task failed: {e}")),
    }
    info!("netboot-server stopped");

    match fatal {
        Some(err) => Err(format!("distribution scan failed: {err}")),
        None => Ok(()),
    }
}
