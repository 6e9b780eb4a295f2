use anyhow::{Context, Result};
use axum::serve;
use server::create_app;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waypoint_core::{config::AppConfig, runtime::WaypointRuntime};

fn init_logging(config: &AppConfig) {
    let filter = match std::env::var("RUST_LOG").as_deref() {
        Ok("debug") => EnvFilter::new("warn,waypoint_core=debug,server=debug,tower_http=debug"),
        Ok("trace") => EnvFilter::new("warn,waypoint_core=trace,server=trace,tower_http=trace"),
        Ok(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,waypoint_core=debug,server=debug")),
        Err(_) => EnvFilter::new(format!(
            "warn,waypoint_core={level},server={level}",
            level = config.logging.level
        )),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_logging(&config);
    info!(config_path = %AppConfig::config_path(), "starting waypoint gateway");
    debug!(
        services = config.services.len(),
        dual_sources = config.dual_sources.len(),
        bind_port = config.server.bind_port,
        "configuration loaded"
    );

    let addr: SocketAddr = config.socket_addr().map_err(anyhow::Error::msg)?;

    let mut builder = WaypointRuntime::builder().with_config(config.clone());
    if config.prober.enabled {
        builder = builder.enable_prober();
    }
    let runtime = Arc::new(builder.build()?);

    let app = create_app(runtime.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "gateway listening");

    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "server error occurred");
    }

    match Arc::try_unwrap(runtime) {
        Ok(runtime) => runtime.shutdown().await,
        Err(runtime) => {
            debug!("runtime still shared at shutdown, signalling background tasks only");
            runtime.signal_shutdown();
        }
    }
    info!("gateway shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, starting graceful shutdown");
}
