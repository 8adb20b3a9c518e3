//! Axum route handler for the Extraction API.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::extraction::channel::ExtractionChannel;
use crate::extraction::document::PageSnapshot;
use crate::extraction::field_extractor::FieldConfidence;
use crate::extraction::loader::{check_public_url, PageLoad};
use crate::extraction::orchestrator::{PollOutcome, PollingOrchestrator, TokioDelay};
use crate::models::records::ProfileRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
    /// Page markup captured by the caller. Fetched from `url` when absent.
    #[serde(default)]
    pub html: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub profile: ProfileRecord,
    pub attempts: u32,
    pub confidence: FieldConfidence,
}

/// POST /api/v1/extract
///
/// Runs one extraction session against the page and returns the first usable record.
/// Without `html` the page is fetched from `url`, which must be a public http(s) address.
pub async fn handle_extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err(AppError::Validation("url cannot be empty".to_string()));
    }

    let channel = ExtractionChannel::default();
    let _page = match request.html {
        Some(html) => PageLoad::inline(
            &channel,
            PageSnapshot::new(url, html),
            Arc::clone(&state.extractor),
        ),
        None => {
            let url = check_public_url(&url)
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            PageLoad::fetch(
                &channel,
                state.http.clone(),
                url.to_string(),
                Arc::clone(&state.extractor),
            )
        }
    };

    let orchestrator = PollingOrchestrator::new(
        Arc::new(channel),
        Arc::new(TokioDelay),
        state.config.retry_policy(),
    );

    match orchestrator
        .start()
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    {
        PollOutcome::Succeeded { attempt, profile } => Ok(Json(ExtractResponse {
            confidence: FieldConfidence::of_profile(&profile),
            profile,
            attempts: attempt + 1,
        })),
        PollOutcome::Exhausted {
            attempts, message, ..
        } => Err(AppError::ExtractionExhausted { attempts, message }),
    }
}
