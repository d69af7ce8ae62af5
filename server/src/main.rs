use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod codegen;
mod config;
mod error;
mod handlers;
mod models;
mod persist;
mod store;

use persist::SnapshotFile;
use store::LinkStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<LinkStore>,
    pub config: config::AppConfig,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortcut=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting shortcut on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // Restore before accepting any request
    let snapshot_file = SnapshotFile::new(&config.data_file);
    let store = Arc::new(persist::restore(&snapshot_file).await);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = persist::spawn_flusher(
        store.clone(),
        snapshot_file.clone(),
        config.save_interval,
        shutdown_rx,
    );

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        store: store.clone(),
        config,
    });
    let app = handlers::router(state);

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // ── Teardown ───────────────────────────────────────────────────────────
    // Stop the periodic flusher first so the final write is the only writer.
    let _ = shutdown_tx.send(true);
    if let Err(e) = flusher.await {
        tracing::error!("Flush task ended abnormally: {e}");
    }

    if let Err(e) = persist::flush_now(&store, &snapshot_file).await {
        tracing::error!("Final flush failed: {e}");
    }

    tracing::info!("goodbye");
    served?;
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM or SIGQUIT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
            (Ok(mut term), Ok(mut quit)) => {
                tokio::select! {
                    _ = term.recv() => {},
                    _ = quit.recv() => {},
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Unable to install SIGTERM/SIGQUIT handler: {e}");
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

    tracing::info!("Shutdown signal received");
}
