//! HTTP prediction server.
//!
//! The artifact is loaded once, before the listener binds. A load failure is
//! fatal (exit code 5) and no request is ever accepted without a model.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::ServeConfig;
use crate::error::AppError;
use crate::io::read_artifact;

pub mod routes;
pub mod service;

pub use routes::*;
pub use service::*;

/// Load the artifact and serve until Ctrl-C.
pub fn run(config: &ServeConfig) -> Result<(), AppError> {
    let pipeline = read_artifact(&config.model_path)?;
    info!(
        path = %config.model_path.display(),
        trained_at = %pipeline.card.trained_at,
        categories = pipeline.encoder.width(),
        trees = pipeline.forest.n_trees(),
        "model loaded"
    );

    let service = PredictionService::new(Arc::new(pipeline)).with_strict_status(config.strict_status);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(2, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(serve(Arc::new(service), config.bind))
}

async fn serve(service: Arc<PredictionService>, addr: SocketAddr) -> Result<(), AppError> {
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
                std::future::pending::<()>().await;
            }
        }
    };
    let (bound, server) = warp::serve(routes(service))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| AppError::new(2, format!("Failed to bind {addr}: {e}")))?;

    info!(addr = %bound, "listening");
    server.await;
    info!("server stopped");
    Ok(())
}
