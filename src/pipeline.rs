//! One-shot story generation: validate, build the prompt, call, deliver.
//!
//! ```text
//! raw JSON ──► RequestValidator ──► PromptBuilder ──► GenerationClient
//!                                                          │
//!                                                   FragmentStream
//!                                                          │
//!                                   StreamAccumulator::{buffer, forward}
//!                                                          │
//!                                                     OutputSink
//! ```
//!
//! There is no loop-back: each request produces one prompt, and each prompt
//! at most one upstream call.

use crate::accumulator::{ForwardSummary, StreamAccumulator};
use crate::client::{GenerationClient, GenerationParams};
use crate::error::Result;
use crate::prompt::{Prompt, PromptBuilder};
use crate::request::{GenerationRequest, RequestValidator};
use crate::sink::{FileSink, OutputSink};
use crate::streaming::FragmentStream;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ties a shared [`GenerationClient`] to a [`RequestValidator`].
///
/// Cheap to clone; clones share the client.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use story_stream::backend::MockBackend;
/// use story_stream::{GenerationClient, RequestValidator, StoryPipeline};
///
/// # tokio_test::block_on(async {
/// let client = GenerationClient::builder("http://unused")
///     .backend(Arc::new(MockBackend::new(["The ", "young ", "swordsman..."])))
///     .build()
///     .unwrap();
/// let pipeline = StoryPipeline::new(Arc::new(client), RequestValidator::default());
///
/// let prompt = pipeline.prepare(&json!({"style": "武侠"})).unwrap();
/// let text = pipeline.generate_text(&prompt).await.unwrap();
/// assert_eq!(text, "The young swordsman...");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct StoryPipeline {
    client: Arc<GenerationClient>,
    validator: RequestValidator,
}

impl StoryPipeline {
    pub fn new(client: Arc<GenerationClient>, validator: RequestValidator) -> Self {
        Self { client, validator }
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// Validate raw input and build its prompt. No network call.
    pub fn prepare(&self, raw: &Value) -> Result<Prompt> {
        let request = self.validator.validate(raw)?;
        Ok(Self::prompt_for(&request))
    }

    /// Build the prompt for an already-validated request.
    pub fn prompt_for(request: &GenerationRequest) -> Prompt {
        let prompt = PromptBuilder::build(request);
        tracing::debug!(
            style = request.style(),
            title = request.title(),
            is_continue = request.continuation_source().is_some(),
            prompt_chars = prompt.user.chars().count(),
            "prompt built"
        );
        prompt
    }

    /// Start the upstream call with the client's default parameters.
    pub async fn open(&self, prompt: &Prompt) -> Result<FragmentStream> {
        self.client.stream(prompt).await
    }

    /// Start the upstream call with explicit parameters and cancellation.
    pub async fn open_with(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
        cancel: Option<CancellationToken>,
    ) -> Result<FragmentStream> {
        self.client.stream_with(prompt, params, cancel).await
    }

    /// Generate the full text and return it as one string.
    pub async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        let stream = self.open(prompt).await?;
        StreamAccumulator::buffer(stream).await
    }

    /// Generate into `sink`, fragment by fragment.
    ///
    /// If the call cannot be started the sink is aborted, so the sink always
    /// receives exactly one terminal signal.
    pub async fn generate_into<S>(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
        cancel: Option<CancellationToken>,
        sink: &mut S,
    ) -> Result<ForwardSummary>
    where
        S: OutputSink + ?Sized,
    {
        let stream = match self.open_with(prompt, params, cancel).await {
            Ok(stream) => stream,
            Err(e) => {
                sink.abort(&e).await;
                return Err(e);
            }
        };
        StreamAccumulator::forward(stream, sink).await
    }

    /// Generate into a file at `path`, overwriting it. Nothing is written on failure.
    pub async fn generate_to_file(
        &self,
        prompt: &Prompt,
        path: impl Into<PathBuf>,
    ) -> Result<ForwardSummary> {
        let mut sink = FileSink::new(path);
        let params = self.client.params().clone();
        self.generate_into(prompt, &params, None, &mut sink).await
    }
}
