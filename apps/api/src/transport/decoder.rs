//! Incremental server-sent-events decoder.
//!
//! Network reads do not respect event boundaries: one read can carry half an event, several
//! events, or a split multi-byte character. The decoder buffers raw bytes and only hands out
//! messages once their terminating blank line has arrived.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

/// One complete SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every message completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(newline + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(message) = self.process_line(line) {
                messages.push(message);
            }
        }
        messages
    }

    /// True when bytes or fields of an unterminated message are still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id / retry carry nothing this protocol uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage { event, data })
    }
}

/// Adapts a byte stream into a stream of complete SSE messages. Transport errors are passed
/// through; the stream ends when the body does (an unterminated trailing message is dropped).
pub fn sse_messages<S, E>(body: S) -> impl Stream<Item = Result<SseMessage, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    let state = (Box::pin(body), SseDecoder::new(), VecDeque::<SseMessage>::new());
    stream::unfold(state, |(mut body, mut decoder, mut pending)| async move {
        loop {
            if let Some(message) = pending.pop_front() {
                return Some((Ok(message), (body, decoder, pending)));
            }
            match body.next().await {
                Some(Ok(bytes)) => pending.extend(decoder.push(&bytes)),
                Some(Err(e)) => return Some((Err(e), (body, decoder, pending))),
                None => return None,
            }
        }
    })
}
