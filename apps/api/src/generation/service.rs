//! Generation service: validates a request, streams the model's output as it arrives, and
//! substitutes the fallback message when the model produces nothing usable.
//!
//! Each request gets its own producer task writing into a bounded channel. The task watches
//! the channel for closure so that a consumer going away drops the upstream stream at once.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::generation::fallback::fallback_message;
use crate::generation::prompts::build_outreach_prompt;
use crate::llm_client::{LlmError, TextModel};
use crate::models::records::{GenerationRequest, ProfileRecord, UserRecord};
use crate::transport::frame::StreamEvent;

/// Events buffered between the producer task and the response body.
const EVENT_BUFFER: usize = 32;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Rejected before any model call. Carries the name of the absent part.
    #[error("Missing user or profile data")]
    InvalidRequest(&'static str),
}

/// Ordered events for one request: chunks, then exactly one `Done` unless the consumer
/// cancelled first.
pub type EventStream = ReceiverStream<StreamEvent>;

#[derive(Clone)]
pub struct GenerationService {
    model: Arc<dyn TextModel>,
    idle_timeout: Duration,
}

/// How the relay from the upstream model ended.
#[derive(Debug)]
enum Relay {
    Completed { relayed: usize },
    Failed { relayed: usize, error: LlmError },
    Cancelled,
}

impl GenerationService {
    pub fn new(model: Arc<dyn TextModel>, idle_timeout: Duration) -> Self {
        Self {
            model,
            idle_timeout,
        }
    }

    /// Starts generating an outreach message.
    ///
    /// Validation happens here, synchronously: an invalid request returns `Err` without
    /// touching the model. Otherwise the producer is spawned and its events returned.
    pub fn generate(&self, request: GenerationRequest) -> Result<EventStream, GenerationError> {
        let user = request.user.ok_or(GenerationError::InvalidRequest("user"))?;
        let profile = request
            .profile
            .ok_or(GenerationError::InvalidRequest("profile"))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let request_id = Uuid::new_v4();
        let span = info_span!("generate", %request_id, role = %profile.role, company = %profile.company);

        tokio::spawn(
            produce(Arc::clone(&self.model), self.idle_timeout, user, profile, tx).instrument(span),
        );

        Ok(ReceiverStream::new(rx))
    }
}

async fn produce(
    model: Arc<dyn TextModel>,
    idle_timeout: Duration,
    user: UserRecord,
    profile: ProfileRecord,
    tx: mpsc::Sender<StreamEvent>,
) {
    let prompt = build_outreach_prompt(&user, &profile);

    let relay = tokio::select! {
        _ = tx.closed() => Relay::Cancelled,
        relay = relay_upstream(model.as_ref(), &prompt, idle_timeout, &tx) => relay,
    };

    match relay {
        Relay::Completed { relayed } => {
            info!("Generation completed ({relayed} chunks)");
        }
        Relay::Cancelled => {
            info!("Consumer went away; upstream stream dropped");
            return;
        }
        Relay::Failed { relayed: 0, error } => {
            warn!("Model unavailable, sending fallback message: {error}");
            let fallback = StreamEvent::Chunk(fallback_message(&user, &profile));
            if tx.send(fallback).await.is_err() {
                return;
            }
        }
        Relay::Failed { relayed, error } => {
            // Already-sent text cannot be retracted; close the stream as it stands.
            warn!("Model failed after {relayed} chunks, closing without fallback: {error}");
        }
    }

    // Receiver gone means nobody is waiting for the signal.
    let _ = tx.send(StreamEvent::Done).await;
}

/// Forwards each non-empty upstream unit as soon as it arrives. Every wait on the upstream
/// (opening the stream and each following unit) is bounded by `idle_timeout`.
async fn relay_upstream(
    model: &dyn TextModel,
    prompt: &str,
    idle_timeout: Duration,
    tx: &mpsc::Sender<StreamEvent>,
) -> Relay {
    let mut upstream = match timeout(idle_timeout, model.stream(prompt)).await {
        Ok(Ok(upstream)) => upstream,
        Ok(Err(error)) => return Relay::Failed { relayed: 0, error },
        Err(_) => {
            return Relay::Failed {
                relayed: 0,
                error: LlmError::Timeout(idle_timeout),
            }
        }
    };

    let mut relayed = 0;
    loop {
        match timeout(idle_timeout, upstream.next()).await {
            Ok(Some(Ok(text))) => {
                if text.is_empty() {
                    continue;
                }
                if tx.send(StreamEvent::Chunk(text)).await.is_err() {
                    return Relay::Cancelled;
                }
                relayed += 1;
            }
            Ok(Some(Err(error))) => return Relay::Failed { relayed, error },
            Ok(None) if relayed == 0 => {
                return Relay::Failed {
                    relayed,
                    error: LlmError::EmptyContent,
                }
            }
            Ok(None) => return Relay::Completed { relayed },
            Err(_) => {
                return Relay::Failed {
                    relayed,
                    error: LlmError::Timeout(idle_timeout),
                }
            }
        }
    }
}
