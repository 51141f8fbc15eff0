//! # Story Stream
//!
//! Streaming fiction generation over OpenAI-compatible chat completions.
//!
//! A request flows one way through five components, with no loop-backs:
//!
//! ```text
//! RequestValidator ──► PromptBuilder ──► GenerationClient ──► StreamAccumulator ──► OutputSink
//!   raw JSON           Prompt            FragmentStream        buffer / forward      file, terminal,
//!                                                                                     HTTP body
//! ```
//!
//! ## Core Concepts
//!
//! - **[`GenerationRequest`]**: the named story fields; anything left out
//!   resolves to a default when the prompt is built.
//! - **[`RequestValidator`]**: turns raw JSON into a request, leniently or
//!   strictly ([`ValidationPolicy`]).
//! - **[`PromptBuilder`]**: pure mapping from a request to a [`Prompt`].
//! - **[`GenerationClient`]**: one streaming call per prompt, never retried.
//!   Built once and shared as `Arc<GenerationClient>`.
//! - **[`FragmentStream`]**: the forward-only sequence of generated text.
//! - **[`StreamAccumulator`]**: drains a stream into a string or a sink.
//! - **[`OutputSink`]**: [`FileSink`], [`TerminalSink`], [`ChannelSink`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use story_stream::{GenerationClient, RequestValidator, Settings, StoryPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // AISTUDIO_API_KEY and AISTUDIO_BASE_URL must be set
//!     let settings = Settings::from_env()?;
//!     let client = Arc::new(GenerationClient::from_settings(&settings)?);
//!     let pipeline = StoryPipeline::new(client, RequestValidator::default());
//!
//!     let prompt = pipeline.prepare(&json!({
//!         "style": "武侠",
//!         "title": "少年剑客",
//!         "plot": "讲述一位年轻剑客的成长故事",
//!     }))?;
//!     pipeline.generate_to_file(&prompt, "少年剑客.txt").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Binaries
//!
//! - `story-server`: `POST /generate`, streamed `text/plain` response.
//! - `story-cli`: pick an author, enter a theme, watch the text arrive.
//! - `story-file`: one fixed request written to a file.

pub mod accumulator;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod interactive;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod server;
pub mod sink;
pub mod streaming;
pub mod telemetry;

pub use accumulator::{ForwardSummary, StreamAccumulator};
pub use backend::{Backend, CompletionRequest, MockBackend, OpenAiBackend};
pub use client::{GenerationClient, GenerationClientBuilder, GenerationParams};
pub use config::Settings;
pub use error::{ErrorKind, Result, StoryError};
pub use pipeline::StoryPipeline;
pub use prompt::{Prompt, PromptBuilder, SUPPORTED_AUTHORS};
pub use request::{GenerationRequest, RequestValidator, ValidationPolicy};
pub use sink::{ChannelSink, FileSink, OutputSink, TerminalSink, TextStats};
pub use streaming::FragmentStream;
pub use tokio_util::sync::CancellationToken;
