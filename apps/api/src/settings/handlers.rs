//! Axum route handlers for the Settings API.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::records::UserRecord;
use crate::settings::validate_user;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub user: Option<UserRecord>,
}

/// GET /api/v1/settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let user = state.settings.load_user().await?;
    Ok(Json(SettingsResponse { user }))
}

/// PUT /api/v1/settings
///
/// Trims every field, requires name, currentRole and topSkills, then replaces the stored user.
pub async fn handle_put_settings(
    State(state): State<AppState>,
    Json(user): Json<UserRecord>,
) -> Result<Json<SettingsResponse>, AppError> {
    let user = validate_user(&user)?;
    state.settings.save_user(&user).await?;
    Ok(Json(SettingsResponse { user: Some(user) }))
}
