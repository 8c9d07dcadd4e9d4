use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsroom_core::{load_config, validate_config};
use newsroom_server::api::create_router;
use newsroom_server::app::App;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging; NEWSROOM_LOG_FORMAT=json switches to structured output
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("NEWSROOM_LOG_FORMAT").is_ok_and(|v| v == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config_path = std::env::var("NEWSROOM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!(version = VERSION, "Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        sources = config.sources.iter().filter(|s| s.enabled).count(),
        interval_secs = config.scheduler.interval_secs,
        scheduler_enabled = config.scheduler.enabled,
        "Configuration loaded successfully"
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let App {
        state,
        orchestrator,
        notify_writer,
        telegram,
    } = App::build(config)?;

    let writer_task = tokio::spawn(notify_writer.run());

    let handle = state.orchestrator().clone();
    let orchestrator_task = tokio::spawn(orchestrator.run());
    info!("Execution context started");

    let poller_task = telegram.map(|client| {
        let handle = handle.clone();
        let shutdown = handle.subscribe_shutdown();
        tokio::spawn(async move { client.poll_decisions(handle, shutdown).await })
    });

    let app = create_router(Arc::clone(&state));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    handle.shutdown();

    if let Some(poller) = poller_task {
        if let Err(e) = poller.await {
            warn!(error = %e, "Decision poller ended abnormally");
        }
    }

    match orchestrator_task.await {
        Ok(ctx) => info!(
            runs = ctx.runs_completed,
            decisions = ctx.decisions_handled,
            "Execution context stopped"
        ),
        Err(e) => warn!(error = %e, "Execution context ended abnormally"),
    }

    // The writer drains and exits once the stopped orchestrator has dropped
    // its notify handles.
    let _ = writer_task.await;
    info!("Failure notifier stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
