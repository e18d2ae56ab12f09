//! meterline reporter binary.
//!
//! Loads `meterline.yaml` (or the path given as the first argument), starts
//! periodic reporting and the optional ops endpoints, and flushes a final
//! cycle on Ctrl-C.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use meterline_core::error::Result;
use meterline_reporter::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "meterline-reporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "meterline.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let ops = cfg.ops.clone();

    let state = app_state::AppState::new(cfg)?;
    state.start()?;
    tracing::info!(config = %path, "meterline-reporter started");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = if ops.enabled {
        let listen = ops.listen_addr()?;
        let listener = tokio::net::TcpListener::bind(listen).await?;
        tracing::info!(%listen, "ops endpoints listening");
        let app = router::build_router(state.clone());
        Some(tokio::spawn(async move {
            let res = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = res {
                tracing::error!(error = %e, "ops server failed");
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    // readyz flips to 503 before the blocking flush starts
    let flushing = state.clone();
    if tokio::task::spawn_blocking(move || flushing.shutdown()).await.is_err() {
        tracing::error!("final flush panicked");
    }

    let _ = stop_tx.send(());
    if let Some(server) = server {
        let _ = server.await;
    }
    Ok(())
}
