//! Caller-side consumer of the generation stream.
//!
//! Turns a response body into ordered `StreamEvent`s, stops at the first completion signal,
//! and reports a body that ends without one. Dropping the stream drops the response, which
//! closes the connection and cancels generation on the server.

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use tracing::debug;

use crate::models::records::GenerationRequest;
use crate::transport::decoder::sse_messages;
use crate::transport::frame::StreamEvent;
use crate::transport::TransportError;

pub struct GenerationClient {
    http: Client,
    base_url: String,
}

impl GenerationClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submits a request and returns its event stream. Rejections (4xx/5xx before streaming)
    /// surface here as `TransportError::Status`.
    pub async fn stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, TransportError>>, TransportError> {
        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_events(response.bytes_stream()).boxed())
    }

    /// Streams a request to completion and returns the accumulated message.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, TransportError> {
        let events = self.stream(request).await?;
        collect_message(events).await
    }
}

/// Decodes an SSE byte stream into events. Yields nothing after `Done`; yields
/// `UnexpectedEnd` once if the body ends first, and stops at the first malformed frame.
pub fn decode_events<S, E>(body: S) -> impl Stream<Item = Result<StreamEvent, TransportError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<TransportError>,
{
    let messages = Box::pin(sse_messages(body));
    stream::unfold(Some(messages), |messages| async move {
        let mut messages = messages?;
        let item = match messages.next().await {
            Some(Ok(message)) => StreamEvent::from_data(&message.data),
            Some(Err(e)) => Err(e.into()),
            None => {
                debug!("Generation stream closed without completion signal");
                Err(TransportError::UnexpectedEnd)
            }
        };
        let more = matches!(item, Ok(StreamEvent::Chunk(_)));
        Some((item, more.then_some(messages)))
    })
}

/// Concatenates chunk text until the completion signal.
pub async fn collect_message<S>(events: S) -> Result<String, TransportError>
where
    S: Stream<Item = Result<StreamEvent, TransportError>>,
{
    futures::pin_mut!(events);
    let mut message = String::new();
    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Chunk(text) => message.push_str(&text),
            StreamEvent::Done => return Ok(message),
        }
    }
    Err(TransportError::UnexpectedEnd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    impl From<Infallible> for TransportError {
        fn from(e: Infallible) -> Self {
            match e {}
        }
    }

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        let parts: Vec<Result<Bytes, Infallible>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order_and_single_done() {
        let parts = [
            "data: {\"chunk\":\"Hi \"}\n\n",
            "data: {\"chunk\":\"the",
            "re\"}\n\ndata: {\"done\":true}\n\n",
        ];
        let events: Vec<_> = decode_events(body(&parts)).collect().await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Chunk("Hi ".into()),
                StreamEvent::Chunk("there".into()),
                StreamEvent::Done,
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    }

    #[tokio::test]
    async fn test_collect_message_concatenates() {
        let parts = [
            ":\n\n",
            "data: {\"chunk\":\"Hi \"}\n\ndata: {\"chunk\":\"there\"}\n\ndata: {\"done\":true}\n\n",
        ];
        let message = collect_message(decode_events(body(&parts))).await.unwrap();
        assert_eq!(message, "Hi there");
    }

    #[tokio::test]
    async fn test_events_after_done_are_dropped() {
        let parts = ["data: {\"done\":true}\n\ndata: {\"chunk\":\"late\"}\n\n"];
        let events: Vec<_> = decode_events(body(&parts)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn test_missing_done_is_unexpected_end() {
        let parts = ["data: {\"chunk\":\"Hi\"}\n\n"];
        let result = collect_message(decode_events(body(&parts))).await;
        assert!(matches!(result, Err(TransportError::UnexpectedEnd)));
    }

    #[tokio::test]
    async fn test_malformed_frame_stops_stream() {
        let parts = ["data: nope\n\ndata: {\"done\":true}\n\n"];
        let events: Vec<_> = decode_events(body(&parts)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(TransportError::Malformed(_))));
    }
}
