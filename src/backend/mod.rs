//! Backend trait and the normalized completion request.
//!
//! The [`Backend`] trait abstracts over how a streaming chat completion is
//! obtained. [`OpenAiBackend`] talks to any OpenAI-compatible endpoint;
//! [`MockBackend`] replays scripted fragments for tests.
//!
//! ## Architecture
//!
//! ```text
//! GenerationClient ──► CompletionRequest ──► Backend::stream() ──► FragmentStream
//!                                                  │
//!                                        ┌─────────┴─────────┐
//!                                   OpenAiBackend        MockBackend
//!                               /v1/chat/completions   scripted fragments
//!                                  SSE streaming
//! ```
//!
//! Backends issue exactly one request per call and never retry.

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::error::Result;
use crate::streaming::FragmentStream;
use async_trait::async_trait;
use reqwest::Client;

/// A provider-agnostic streaming chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier (e.g. `"gemma3:27b"`).
    pub model: String,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f64,
    /// Optional system instruction, sent as the first message.
    pub system: Option<String>,
    /// The user instruction.
    pub user: String,
}

/// Abstraction over streaming text-generation providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Dispatch one streaming completion call.
    ///
    /// Errors returned here happened before any fragment was produced
    /// (connection refused, non-2xx status). Failures while reading the body
    /// surface as items of the returned [`FragmentStream`].
    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<FragmentStream>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}
