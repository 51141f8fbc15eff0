//! The generation client.
//!
//! [`GenerationClient`] carries the HTTP client, backend, endpoint and default
//! sampling parameters. It is built once at process start (usually through
//! [`GenerationClient::from_settings`]) and shared as `Arc<GenerationClient>`
//! by every request that needs it.

use crate::backend::{Backend, CompletionRequest, OpenAiBackend};
use crate::config::{self, Settings};
use crate::error::{Result, StoryError};
use crate::prompt::Prompt;
use crate::streaming::FragmentStream;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Message used when credentials or endpoint are missing.
pub const NOT_INITIALIZED_MESSAGE: &str = "未能初始化 AI 服务客户端，请检查 API 密钥和服务地址配置";

/// Model and sampling temperature for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: config::DEFAULT_MODEL.to_string(),
            temperature: config::DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationParams {
    pub fn new(model: impl Into<String>, temperature: f64) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }

    /// Reject temperatures outside `[0, 2]` and blank model names.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StoryError::InvalidConfig("model must not be empty".into()));
        }
        config::check_temperature(self.temperature)
    }
}

/// Streaming chat-completion client shared across requests.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use story_stream::backend::MockBackend;
/// use story_stream::{GenerationClient, GenerationRequest, PromptBuilder};
///
/// # tokio_test::block_on(async {
/// let client = GenerationClient::builder("http://unused")
///     .backend(Arc::new(MockBackend::new(["Hel", "lo"])))
///     .build()
///     .unwrap();
/// let prompt = PromptBuilder::build(&GenerationRequest::new());
/// let mut stream = client.stream(&prompt).await.unwrap();
/// assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "Hel");
/// # });
/// ```
pub struct GenerationClient {
    http: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    params: GenerationParams,
    read_timeout: Option<Duration>,
}

impl GenerationClient {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> GenerationClientBuilder {
        GenerationClientBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            api_key: None,
            params: GenerationParams::default(),
            read_timeout: Some(config::DEFAULT_READ_TIMEOUT),
            connect_timeout: config::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Build the OpenAI-compatible client described by `settings`.
    ///
    /// Fails with [`StoryError::ClientNotInitialized`] when the API key or the
    /// base URL is missing. No network call is made here.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (Some(api_key), Some(base_url)) = (&settings.api_key, &settings.base_url) else {
            tracing::error!(
                has_api_key = settings.api_key.is_some(),
                has_base_url = settings.base_url.is_some(),
                "generation client not initialized"
            );
            return Err(StoryError::ClientNotInitialized(
                NOT_INITIALIZED_MESSAGE.to_string(),
            ));
        };

        Self::builder(base_url.as_str())
            .api_key(api_key.as_str())
            .model(settings.model.as_str())
            .temperature(settings.temperature)
            .read_timeout(settings.read_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
    }

    /// Default parameters used by [`stream`](Self::stream).
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Normalized base URL (provider path suffixes stripped).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Open a fragment stream for `prompt` with the default parameters.
    pub async fn stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        self.stream_with(prompt, &self.params, None).await
    }

    /// Open a fragment stream with explicit parameters and an optional
    /// cancellation token. Cancelling ends the wait for the response as well
    /// as the fragment reads that follow.
    ///
    /// Issues exactly one backend call. Errors returned here mean no fragment
    /// was produced; later failures surface from the stream itself.
    pub async fn stream_with(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
        cancel: Option<CancellationToken>,
    ) -> Result<FragmentStream> {
        params.validate()?;
        let request = CompletionRequest {
            model: params.model.clone(),
            temperature: params.temperature,
            system: Some(prompt.system.clone()).filter(|s| !s.is_empty()),
            user: prompt.user.clone(),
        };

        tracing::debug!(
            backend = self.backend.name(),
            model = %params.model,
            temperature = params.temperature,
            prompt_chars = prompt.user.chars().count(),
            "dispatching generation call"
        );

        let call = self.backend.stream(&self.http, &self.base_url, &request);
        // the read timeout also bounds the wait for response headers
        let bounded = async {
            match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(StoryError::Timeout(limit))),
                None => call.await,
            }
        };
        let dispatched = match cancel.clone() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(StoryError::Cancelled),
                result = bounded => result,
            },
            None => bounded.await,
        };
        let stream = dispatched.inspect_err(|e| {
            tracing::warn!(backend = self.backend.name(), error = %e, "generation call failed");
        })?;

        Ok(stream
            .with_read_timeout(self.read_timeout)
            .with_cancellation(cancel))
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("params", &self.params)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// Builder for [`GenerationClient`].
pub struct GenerationClientBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    api_key: Option<String>,
    params: GenerationParams,
    read_timeout: Option<Duration>,
    connect_timeout: Duration,
}

impl GenerationClientBuilder {
    /// Set the HTTP client. If not set, one is built with the connect timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the backend. Default: [`OpenAiBackend`] with the configured key.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// API key for the default backend. Ignored when a backend is set explicitly.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.params.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.params.temperature = temperature;
        self
    }

    /// Per-fragment read timeout. `None` waits indefinitely.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Connect timeout for the built HTTP client. Default: 10 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GenerationClient> {
        self.params.validate()?;
        let http = match self.client {
            Some(client) => client,
            None => Client::builder()
                .connect_timeout(self.connect_timeout)
                .build()
                .map_err(|e| {
                    StoryError::ClientNotInitialized(format!(
                        "{}: {}",
                        NOT_INITIALIZED_MESSAGE, e
                    ))
                })?,
        };
        let backend = self.backend.unwrap_or_else(|| {
            let backend = match self.api_key {
                Some(key) => OpenAiBackend::new().with_api_key(key),
                None => OpenAiBackend::new(),
            };
            Arc::new(backend)
        });

        Ok(GenerationClient {
            http,
            base_url: normalize_base_url(&self.base_url),
            backend,
            params: self.params,
            read_timeout: self.read_timeout,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// The backend appends its own path, so
/// "https://api.example.com/v1" -> "https://api.example.com".
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    // longest first
    for suffix in &["/v1/chat/completions", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn prompt() -> Prompt {
        Prompt {
            system: "你是一位专业的小说家".into(),
            user: "写一个故事".into(),
        }
    }

    #[test]
    fn test_normalize_base_url_strips_v1() {
        assert_eq!(normalize_base_url("https://api.example.com/v1"), "https://api.example.com");
        assert_eq!(normalize_base_url("https://api.example.com/v1/"), "https://api.example.com");
    }

    #[test]
    fn test_normalize_base_url_strips_full_path() {
        assert_eq!(
            normalize_base_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
    }

    #[test]
    fn test_from_settings_requires_credentials() {
        let mut settings = Settings::default();
        let err = GenerationClient::from_settings(&settings).unwrap_err();
        assert!(matches!(err, StoryError::ClientNotInitialized(_)));

        settings.api_key = Some("sk-test".into());
        let err = GenerationClient::from_settings(&settings).unwrap_err();
        assert!(matches!(err, StoryError::ClientNotInitialized(_)));

        settings.base_url = Some("https://api.example.com/v1".into());
        let client = GenerationClient::from_settings(&settings).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(client.backend_name(), "openai");
        assert_eq!(client.params().model, config::DEFAULT_MODEL);
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let err = GenerationClient::builder("http://unused")
            .temperature(3.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, StoryError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_stream_forwards_prompt_and_params() {
        let mock = Arc::new(MockBackend::new(["a"]));
        let client = GenerationClient::builder("http://unused")
            .backend(mock.clone())
            .model("qwen2.5:14b")
            .temperature(0.3)
            .build()
            .unwrap();

        let mut stream = client.stream(&prompt()).await.unwrap();
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "a");

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.model, "qwen2.5:14b");
        assert_eq!(sent.temperature, 0.3);
        assert_eq!(sent.system.as_deref(), Some("你是一位专业的小说家"));
        assert_eq!(sent.user, "写一个故事");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_with_rejects_bad_params_without_calling() {
        let mock = Arc::new(MockBackend::new(["a"]));
        let client = GenerationClient::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();
        let params = GenerationParams::new("gemma3:27b", -0.1);
        assert!(client.stream_with(&prompt(), &params, None).await.is_err());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_call_is_not_retried() {
        let mock = Arc::new(MockBackend::unreachable("connection refused"));
        let client = GenerationClient::builder("http://unused")
            .backend(mock.clone())
            .build()
            .unwrap();
        let err = client.stream(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Generation);
        assert_eq!(mock.calls(), 1);
    }
}
