//! Wire frames for the generation stream.
//!
//! Each event travels as one server-sent event whose data is either
//! `{"chunk": "<text>"}` or, exactly once and last, `{"done": true}`.

use axum::response::sse::Event;
use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// One event of a generation stream as seen by either end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    /// Terminal; nothing follows it.
    Done,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Chunk { chunk: String },
    Done { done: bool },
}

impl StreamEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }

    fn to_wire(&self) -> WireFrame {
        match self {
            StreamEvent::Chunk(text) => WireFrame::Chunk {
                chunk: text.clone(),
            },
            StreamEvent::Done => WireFrame::Done { done: true },
        }
    }

    /// Server side: wraps the event as an axum SSE event.
    pub fn to_sse(&self) -> Result<Event, axum::Error> {
        Event::default().json_data(self.to_wire())
    }

    /// Client side: parses the data field of one SSE message.
    pub fn from_data(data: &str) -> Result<Self, TransportError> {
        match serde_json::from_str::<WireFrame>(data) {
            Ok(WireFrame::Chunk { chunk }) => Ok(StreamEvent::Chunk(chunk)),
            Ok(WireFrame::Done { done: true }) => Ok(StreamEvent::Done),
            Ok(WireFrame::Done { done: false }) | Err(_) => {
                Err(TransportError::Malformed(data.to_string()))
            }
        }
    }
}
