/// LLM Client — the single point of entry for all upstream model calls in Outreacher.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through this module.
///
/// Model: gemini-2.5-flash (hardcoded — do not make configurable to prevent drift)
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transport::decoder::sse_messages;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// The model used for all generation calls in Outreacher.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.5-flash";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No output from model within {0:?}")]
    Timeout(Duration),
}

/// Successive text units of one streamed completion.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// A streaming text model. `AppState` carries an `Arc<dyn TextModel>` so the
/// generation service can be exercised without a network.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// One-shot streaming completion of `prompt`. Not a chat: no history is kept.
    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError>;
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: u16,
    message: String,
}

/// The single model client used by all services in Outreacher.
/// Wraps the Gemini `streamGenerateContent` endpoint in SSE mode.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        // No overall timeout: streams stay open for the whole completion.
        // Per-chunk deadlines are enforced by the generation service.
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    /// Points the client at a different API root (local stand-ins, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, MODEL
        )
    }
}

#[async_trait]
impl TextModel for LlmClient {
    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {}: {}", status, body);
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Gemini stream opened (model: {MODEL})");

        let texts = sse_messages(response.bytes_stream()).filter_map(|message| async move {
            match message {
                Ok(message) => parse_stream_chunk(&message.data).transpose(),
                Err(e) => Some(Err(LlmError::Stream(e.to_string()))),
            }
        });

        Ok(texts.boxed())
    }
}

/// Extracts the text carried by one streamed chunk. Chunks with no text
/// (usage-only or finish markers) yield `None`.
fn parse_stream_chunk(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: StreamChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Api {
            status: error.code,
            message: error.message,
        });
    }

    let text: String = chunk
        .candidates
        .iter()
        .take(1)
        .filter_map(|c| c.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();

    Ok(Some(text).filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
        Router,
    };

    #[test]
    fn test_parse_chunk_with_text() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hi "},{"text":"there"}],"role":"model"}}]}"#;
        assert_eq!(parse_stream_chunk(data).unwrap().as_deref(), Some("Hi there"));
    }

    #[test]
    fn test_parse_chunk_without_text_is_none() {
        let data = r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":12}}"#;
        assert_eq!(parse_stream_chunk(data).unwrap(), None);
        assert_eq!(parse_stream_chunk(r#"{"usageMetadata":{}}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_chunk_error_payload() {
        let data = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        match parse_stream_chunk(data) {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert!(message.contains("exhausted"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_chunk_malformed() {
        assert!(matches!(parse_stream_chunk("{not json"), Err(LlmError::Parse(_))));
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_stream_relays_text_units() {
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Ada\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        let app = Router::new().route(
            "/models/:call",
            post(move || async move {
                Response::builder()
                    .header(header::CONTENT_TYPE, "text/event-stream")
                    .body(Body::from(sse))
                    .unwrap()
            }),
        );
        let client = LlmClient::new("test-key".into())
            .unwrap()
            .with_base_url(serve(app).await);

        let texts: Vec<String> = client
            .stream("prompt")
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(texts, vec!["Hello ", "Ada"]);
    }

    #[tokio::test]
    async fn test_stream_surfaces_api_error() {
        let app = Router::new().route(
            "/models/:call",
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    r#"{"error":{"code":403,"message":"API key not valid"}}"#,
                )
                    .into_response()
            }),
        );
        let client = LlmClient::new(String::new())
            .unwrap()
            .with_base_url(serve(app).await);

        match client.stream("prompt").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            Err(other) => panic!("expected Api error, got {other:?}"),
            Ok(_) => panic!("expected Api error, got a stream"),
        }
    }
}
