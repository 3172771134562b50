//! Request/response handlers.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AppError, AppState};
use crate::error::VocabError;
use crate::extractor::parse_http_url;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeAck {
    pub status: String,
    pub message: String,
    #[serde(rename = "jobId")]
    pub job_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VocabSize {
    pub vocab_size: u64,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/scrape: validate, then hand off to the training worker.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ScrapeAck>), AppError> {
    let url = validated_url(&body)?;
    let job_id = state.worker.spawn(url);
    Ok((
        StatusCode::ACCEPTED,
        Json(ScrapeAck {
            status: "processing".to_string(),
            message: "Scraper started".to_string(),
            job_id,
        }),
    ))
}

fn validated_url(body: &[u8]) -> Result<String, VocabError> {
    let invalid = || VocabError::InvalidInput("Invalid URL".to_string());

    let request: ScrapeRequest = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "unreadable scrape request");
        invalid()
    })?;
    let raw = request
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(invalid)?;

    parse_http_url(&raw).map_err(|e| {
        tracing::debug!(error = %e, "rejected scrape url");
        invalid()
    })?;
    Ok(raw)
}

/// GET /api/vocab-size
pub async fn vocab_size(State(state): State<AppState>) -> Result<Json<VocabSize>, AppError> {
    let vocab_size = state.store.size().await?;
    Ok(Json(VocabSize { vocab_size }))
}
