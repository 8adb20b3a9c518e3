//! Extraction Channel — request/reply bridge between a requester and the page-context executor.
//!
//! The executor registers a listener once its page has loaded. Until then every request fails
//! with `ChannelError::NotRegistered`, the same way a message to a tab without a content script
//! finds no receiving end. A reply that arrives but fails the usability check is reported
//! separately as `ExtractionFailure::IncompleteData`; retry policy belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::extraction::document::{PageDocument, PageSnapshot};
use crate::extraction::field_extractor::FieldExtractor;
use crate::models::records::ProfileRecord;

const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const LISTENER_QUEUE: usize = 8;

/// Typed request understood by the executor. Serialized as `{"type": "GET_PROFILE"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionRequest {
    GetProfile,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no executor is listening on this page yet")]
    NotRegistered,

    #[error("executor went away before the request was delivered")]
    Disconnected,

    #[error("executor did not reply")]
    NoReply,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(#[from] ChannelError),

    #[error("executor replied without role and company")]
    IncompleteData(ProfileRecord),
}

/// Anything the polling orchestrator can ask for a profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn request(&self) -> Result<ProfileRecord, ExtractionFailure>;
}

struct Envelope {
    request: ExtractionRequest,
    reply: oneshot::Sender<ProfileRecord>,
}

/// The requester side. Cheap to clone; all clones address the same listener slot.
#[derive(Clone)]
pub struct ExtractionChannel {
    listener: Arc<watch::Sender<Option<mpsc::Sender<Envelope>>>>,
    reply_timeout: Duration,
}

impl Default for ExtractionChannel {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_TIMEOUT)
    }
}

impl ExtractionChannel {
    pub fn new(reply_timeout: Duration) -> Self {
        let (listener, _) = watch::channel(None);
        Self {
            listener: Arc::new(listener),
            reply_timeout,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.listener
            .borrow()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Attaches an executor. Replaces any previous one. Dropping the returned handle
    /// stops the listener and clears the slot.
    pub fn register(&self, executor: PageExecutor) -> ListenerHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(LISTENER_QUEUE);

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let profile = executor.handle(envelope.request);
                // Requester may have timed out; nothing to do then.
                let _ = envelope.reply.send(profile);
            }
        });

        self.listener.send_replace(Some(tx.clone()));
        debug!("Page executor registered");

        ListenerHandle {
            task,
            slot: Arc::clone(&self.listener),
            tx,
        }
    }

    /// Sends one request and awaits its single reply.
    pub async fn send(&self, request: ExtractionRequest) -> Result<ProfileRecord, ChannelError> {
        let tx = self
            .listener
            .borrow()
            .clone()
            .ok_or(ChannelError::NotRegistered)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Envelope {
            request,
            reply: reply_tx,
        })
        .await
        .map_err(|_| ChannelError::Disconnected)?;

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(profile)) => Ok(profile),
            Ok(Err(_)) | Err(_) => Err(ChannelError::NoReply),
        }
    }
}

#[async_trait]
impl ProfileSource for ExtractionChannel {
    async fn request(&self) -> Result<ProfileRecord, ExtractionFailure> {
        let profile = self.send(ExtractionRequest::GetProfile).await?;
        if profile.is_usable() {
            Ok(profile)
        } else {
            Err(ExtractionFailure::IncompleteData(profile))
        }
    }
}

/// Keeps a registered listener alive.
pub struct ListenerHandle {
    task: JoinHandle<()>,
    slot: Arc<watch::Sender<Option<mpsc::Sender<Envelope>>>>,
    tx: mpsc::Sender<Envelope>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.slot.send_if_modified(|current| match current {
            Some(tx) if tx.same_channel(&self.tx) => {
                *current = None;
                true
            }
            _ => false,
        });
    }
}

/// Page-context executor: answers requests from the page as it looks right now.
pub struct PageExecutor {
    page: watch::Receiver<PageSnapshot>,
    extractor: Arc<FieldExtractor>,
}

impl PageExecutor {
    /// Executor over a page that may keep changing (e.g. still hydrating).
    pub fn new(page: watch::Receiver<PageSnapshot>, extractor: Arc<FieldExtractor>) -> Self {
        Self { page, extractor }
    }

    /// Executor over a fixed page.
    pub fn from_snapshot(snapshot: PageSnapshot, extractor: Arc<FieldExtractor>) -> Self {
        let (_, page) = watch::channel(snapshot);
        Self::new(page, extractor)
    }

    pub fn handle(&self, request: ExtractionRequest) -> ProfileRecord {
        match request {
            ExtractionRequest::GetProfile => {
                let snapshot = self.page.borrow().clone();
                self.extractor.extract(&PageDocument::parse(&snapshot))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY_PAGE: &str = r#"
        <h1 class="top-card-layout__title">Backend Engineer</h1>
        <a class="topcard__org-name-link">Acme</a>"#;

    fn executor(html: &str) -> PageExecutor {
        PageExecutor::from_snapshot(
            PageSnapshot::new("https://jobs.example/1", html),
            Arc::new(FieldExtractor::default()),
        )
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&ExtractionRequest::GetProfile).unwrap();
        assert_eq!(json, r#"{"type":"GET_PROFILE"}"#);
        let parsed: ExtractionRequest = serde_json::from_str(r#"{"type":"GET_PROFILE"}"#).unwrap();
        assert_eq!(parsed, ExtractionRequest::GetProfile);
    }

    #[tokio::test]
    async fn test_unregistered_channel_is_unavailable() {
        let channel = ExtractionChannel::default();
        assert!(!channel.is_registered());
        let err = channel.request().await.unwrap_err();
        assert_eq!(
            err,
            ExtractionFailure::ChannelUnavailable(ChannelError::NotRegistered)
        );
    }

    #[tokio::test]
    async fn test_registered_executor_replies_with_profile() {
        let channel = ExtractionChannel::default();
        let _handle = channel.register(executor(READY_PAGE));
        let profile = channel.request().await.unwrap();
        assert_eq!(profile.role, "Backend Engineer");
        assert_eq!(profile.company, "Acme");
        assert_eq!(profile.source_url, "https://jobs.example/1");
    }

    #[tokio::test]
    async fn test_unusable_reply_is_incomplete_data_not_channel_error() {
        let channel = ExtractionChannel::default();
        let _handle = channel.register(executor("<p>spinner</p>"));
        match channel.request().await {
            Err(ExtractionFailure::IncompleteData(profile)) => {
                assert_eq!(profile.role, "");
                assert_eq!(profile.source_url, "https://jobs.example/1");
            }
            other => panic!("expected IncompleteData, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropping_handle_unregisters() {
        let channel = ExtractionChannel::default();
        let handle = channel.register(executor(READY_PAGE));
        assert!(channel.is_registered());
        drop(handle);
        assert!(!channel.is_registered());
        assert_eq!(
            channel.send(ExtractionRequest::GetProfile).await.unwrap_err(),
            ChannelError::NotRegistered
        );
    }

    #[tokio::test]
    async fn test_executor_sees_page_updates() {
        let (page_tx, page_rx) = watch::channel(PageSnapshot::new("https://jobs.example/2", ""));
        let channel = ExtractionChannel::default();
        let _handle = channel.register(PageExecutor::new(
            page_rx,
            Arc::new(FieldExtractor::default()),
        ));

        assert!(matches!(
            channel.request().await,
            Err(ExtractionFailure::IncompleteData(_))
        ));

        page_tx.send_replace(PageSnapshot::new("https://jobs.example/2", READY_PAGE));
        assert_eq!(channel.request().await.unwrap().company, "Acme");
    }
}
