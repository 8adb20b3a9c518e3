//! Polling Orchestrator — drives a `ProfileSource` until it yields a usable profile
//! or the attempt budget runs out.
//!
//! State machine: `Idle -> Polling -> {Succeeded | Exhausted}`.
//!
//! Attempts are strictly sequential. Attempt 0 is issued immediately; after each failed
//! attempt `k` with `k < max_attempts` the next one is issued after a fixed delay, so an
//! always-failing source sees exactly `max_attempts + 1` attempts. The delay is injected
//! through the `Delay` trait so tests control time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::extraction::channel::{ExtractionFailure, ProfileSource};
use crate::models::records::ProfileRecord;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed; no backoff. The wait being covered is the page's own load time.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Timer abstraction between attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling { attempt: u32 },
    Succeeded { attempt: u32 },
    Exhausted { attempts: u32 },
}

/// Terminal result of one extraction session. Produced exactly once per `start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded {
        attempt: u32,
        profile: ProfileRecord,
    },
    Exhausted {
        attempts: u32,
        /// Explanation suitable for showing to the user as-is.
        message: String,
        last_failure: ExtractionFailure,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("extraction session is not idle (current state: {0:?})")]
    NotIdle(PollState),
}

pub struct PollingOrchestrator {
    source: Arc<dyn ProfileSource>,
    delay: Arc<dyn Delay>,
    policy: RetryPolicy,
    state: watch::Sender<PollState>,
}

impl PollingOrchestrator {
    pub fn new(source: Arc<dyn ProfileSource>, delay: Arc<dyn Delay>, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            source,
            delay,
            policy,
            state,
        }
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Progress feed for rendering "attempt k/N" while a session runs.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Index of the attempt in flight, or the final one once terminal. Zero when idle.
    pub fn current_attempt(&self) -> u32 {
        match *self.state.borrow() {
            PollState::Idle => 0,
            PollState::Polling { attempt } | PollState::Succeeded { attempt } => attempt,
            PollState::Exhausted { attempts } => attempts.saturating_sub(1),
        }
    }

    /// Runs one session from `Idle` to a terminal state.
    ///
    /// Fails without touching the source when the orchestrator is not idle; call
    /// `retry()` to start over after a terminal state.
    pub async fn start(&self) -> Result<PollOutcome, OrchestratorError> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if *state == PollState::Idle {
                *state = PollState::Polling { attempt: 0 };
                true
            } else {
                rejected = Some(state.clone());
                false
            }
        });
        if let Some(state) = rejected {
            return Err(OrchestratorError::NotIdle(state));
        }

        Ok(self.run().await)
    }

    /// Resets a finished session to `Idle` (attempt count back to zero) and starts again.
    pub async fn retry(&self) -> Result<PollOutcome, OrchestratorError> {
        let mut rejected = None;
        self.state.send_if_modified(|state| match state {
            PollState::Polling { .. } => {
                rejected = Some(state.clone());
                false
            }
            _ => {
                *state = PollState::Idle;
                true
            }
        });
        if let Some(state) = rejected {
            return Err(OrchestratorError::NotIdle(state));
        }

        self.start().await
    }

    async fn run(&self) -> PollOutcome {
        let _session = SessionGuard { state: &self.state };
        let max = self.policy.max_attempts;
        let mut attempt = 0;

        loop {
            self.state.send_replace(PollState::Polling { attempt });
            debug!("Extraction attempt {}/{}", attempt + 1, max + 1);

            let failure = match self.source.request().await {
                Ok(profile) => {
                    self.state.send_replace(PollState::Succeeded { attempt });
                    info!(
                        "Extraction succeeded on attempt {} ({} at {})",
                        attempt, profile.role, profile.company
                    );
                    return PollOutcome::Succeeded { attempt, profile };
                }
                Err(failure) => failure,
            };

            if attempt >= max {
                let attempts = attempt + 1;
                self.state.send_replace(PollState::Exhausted { attempts });
                warn!("Extraction exhausted after {attempts} attempts: {failure}");
                return PollOutcome::Exhausted {
                    attempts,
                    message: exhausted_message(attempts, &failure),
                    last_failure: failure,
                };
            }

            debug!(
                "Attempt {} failed ({failure}); retrying in {}ms",
                attempt,
                self.policy.delay.as_millis()
            );
            self.delay.wait(self.policy.delay).await;
            attempt += 1;
        }
    }
}

/// Returns an abandoned session to `Idle`. A `start()` future dropped mid-session (caller
/// timeout, client gone) would otherwise leave the state at `Polling` for good.
struct SessionGuard<'a> {
    state: &'a watch::Sender<PollState>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if matches!(state, PollState::Polling { .. }) {
                debug!("Extraction session abandoned at {state:?}");
                *state = PollState::Idle;
                true
            } else {
                false
            }
        });
    }
}

fn exhausted_message(attempts: u32, failure: &ExtractionFailure) -> String {
    match failure {
        ExtractionFailure::ChannelUnavailable(_) => format!(
            "Couldn't connect to the job page after {attempts} attempts. \
             Reload the posting, wait for it to finish loading, then try again."
        ),
        ExtractionFailure::IncompleteData(_) => format!(
            "Couldn't find the job title and company on this page after {attempts} attempts. \
             Open a job posting and try again once it has fully loaded."
        ),
    }
}
