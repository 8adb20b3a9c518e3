//! Axum route handler for the Generation API.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};

use crate::errors::AppError;
use crate::models::records::GenerationRequest;
use crate::state::AppState;

/// POST /generate
///
/// Streams the outreach message as server-sent events: `{"chunk": ..}` frames followed by a
/// single `{"done": true}`, and nothing else on the wire (no keep-alive comments). A request
/// missing `user` or `profile` is rejected with 400 before any model call.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let events = state.generation.generate(request)?;
    Ok(Sse::new(events.map(|event| event.to_sse())))
}
