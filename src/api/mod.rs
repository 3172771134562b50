//! HTTP + websocket surface.
//!
//! ## Endpoints
//!
//! - `GET  /api/health`      - liveness
//! - `POST /api/scrape`      - start a training job, answers before it runs
//! - `GET  /api/vocab-size`  - current vocabulary size
//! - `GET  /ws/tokenize`     - real-time tokenize channel (websocket)

mod routes;
mod ws;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::VocabError;
use crate::hub::BroadcastHub;
use crate::training::TrainingWorker;
use crate::vocabulary::VocabularyStore;

pub use routes::{ScrapeAck, VocabSize};

/// Shared application state. Everything is constructed once by the binary
/// and passed in; nothing here is global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VocabularyStore>,
    pub hub: Arc<BroadcastHub>,
    pub worker: Arc<TrainingWorker>,
}

impl AppState {
    pub fn new(
        store: Arc<VocabularyStore>,
        hub: Arc<BroadcastHub>,
        worker: Arc<TrainingWorker>,
    ) -> Self {
        Self { store, hub, worker }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/scrape", post(routes::trigger_scrape))
        .route("/api/vocab-size", get(routes::vocab_size))
        .route("/ws/tokenize", get(ws::tokenize_ws))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error: a [`VocabError`] rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct AppError(VocabError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error = match &self.0 {
            VocabError::InvalidInput(message) => message.clone(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<VocabError>,
{
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}
