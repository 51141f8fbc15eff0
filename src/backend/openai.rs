//! Backend for OpenAI-compatible APIs.
//!
//! Endpoint: `/v1/chat/completions` (always chat mode, always streaming).
//! Streaming: SSE with `data: {"choices": [{"delta": {"content": "token"}}]}`.

use super::sse::SseDecoder;
use super::{Backend, CompletionRequest};
use crate::error::{Result, StoryError};
use crate::streaming::FragmentStream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for any OpenAI-compatible API (OpenAI, AI Studio, vLLM, Ollama `/v1/`, ...).
///
/// # Example
///
/// ```
/// use story_stream::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(backend.has_api_key());
/// ```
#[derive(Clone, Default)]
pub struct OpenAiBackend {
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    pub(crate) api_key: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .finish()
    }
}

/// Keep a short prefix of a secret for identification, hide the rest.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    if secret.chars().count() > 6 {
        format!("{}***", prefix)
    } else {
        "***".to_string()
    }
}

impl OpenAiBackend {
    /// Create a backend without authentication.
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_messages(request: &CompletionRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        if let Some(ref sys) = request.system {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        messages.push(json!({"role": "user", "content": request.user}));
        messages
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": Self::build_messages(request),
            "stream": true,
        })
    }

    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        req
    }
}

/// Extract the text of one streamed chunk.
///
/// A chunk without `choices[0].delta.content` yields an empty fragment. A
/// chunk carrying an `error` object fails the stream.
fn delta_content(event: &Value) -> Result<String> {
    if let Some(err) = event.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(StoryError::Upstream(message));
    }
    Ok(event
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string())
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<FragmentStream> {
        let base = base_url.trim_end_matches('/');
        let url = format!("{}/v1/chat/completions", base);
        let body = Self::build_body(request);

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoryError::HttpError {
                status: status.as_u16(),
                body: text,
            });
        }
        tracing::debug!(url = %url, model = %request.model, "completion stream opened");

        let mut bytes = resp.bytes_stream();
        let fragments = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(StoryError::from)?;
                for event in decoder.decode(&chunk)? {
                    yield delta_content(&event)?;
                }
                if decoder.is_done() {
                    break;
                }
            }
            for event in decoder.flush()? {
                yield delta_content(&event)?;
            }
        };

        Ok(FragmentStream::new(fragments))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
