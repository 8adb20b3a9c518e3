// Stream transport: SSE framing, incremental decoding, and the caller-side consumer.

pub mod client;
pub mod decoder;
pub mod frame;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation rejected (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("malformed stream frame: {0}")]
    Malformed(String),

    #[error("stream ended before completion signal")]
    UnexpectedEnd,
}
