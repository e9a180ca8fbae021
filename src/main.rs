use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use innkeep::booking::ReconcileOptions;
use innkeep::config::Config;
use innkeep::engine::{Engine, EngineError};
use innkeep::store::TimedStore;
use innkeep::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path())?);
    for (id, name) in &config.rooms {
        match engine.create_room(*id, name.clone()).await {
            Ok(_) => info!("created room {id} ({name})"),
            Err(EngineError::RoomExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    tokio::spawn(innkeep::compactor::run_compactor(
        engine.clone(),
        config.compact_threshold,
    ));

    let store = Arc::new(TimedStore::new(engine, config.store_timeout));
    let state = AppState::new(
        store,
        ReconcileOptions {
            dedupe_additions: config.dedupe_blocks,
        },
    );

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  rooms: {}", config.rooms.len());
    info!("  dedupe_blocks: {}", config.dedupe_blocks);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("innkeep stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
