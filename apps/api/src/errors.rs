use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::service::GenerationError;
use crate::settings::SettingsError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction gave up after {attempts} attempts: {message}")]
    ExtractionExhausted { attempts: u32, message: String },

    #[error("Settings error: {0}")]
    Settings(SettingsError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Invalid(_) => AppError::Validation(e.to_string()),
            other => AppError::Settings(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ExtractionExhausted { attempts, message } => {
                tracing::warn!("Extraction exhausted after {attempts} attempts");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EXTRACTION_EXHAUSTED",
                    message.clone(),
                )
            }
            AppError::Settings(e) => {
                tracing::error!("Settings error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SETTINGS_ERROR",
                    "Settings could not be read or saved".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
