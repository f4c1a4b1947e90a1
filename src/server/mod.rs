//! # HTTP Surface
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /process` | submit `{video_url, filter}`, answers 202 `{job_id}` |
//! | `GET /status/:job_id` | job snapshot |
//! | `GET /videos/:file` | finished result videos |
//! | `GET /thumb/:file` | result thumbnails |
//! | `GET /health` | liveness |

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{CompositorError, Result};
use crate::jobs::{JobManager, THUMB_ROUTE, VIDEO_ROUTE};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub vision_backend: String,
}

pub fn router(state: AppState, cors: bool) -> Router {
    // scratch downloads and intermediates live one level up and stay private
    let files = state.jobs.workspace().results_dir();

    let router = Router::new()
        .route("/process", post(handlers::submit_job))
        .route("/status/:job_id", get(handlers::job_status))
        .route("/health", get(handlers::health))
        .nest_service(VIDEO_ROUTE, ServeDir::new(&files))
        .nest_service(THUMB_ROUTE, ServeDir::new(&files))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| CompositorError::generic(format!("invalid listen address: {}", e)))?;

    let app = router(state, config.cors);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
