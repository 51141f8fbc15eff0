//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] replays scripted fragments, optionally ending in a
//! failure, and records every request it receives so tests can assert on
//! prompts and on the one-call-per-invocation rule.
//!
//! # Example
//!
//! ```
//! use story_stream::backend::MockBackend;
//!
//! let mock = MockBackend::new(["The ", "young ", "swordsman..."]);
//! let broken = MockBackend::new(["partial"]).failing_with("connection reset");
//! let offline = MockBackend::unreachable("connection refused");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, CompletionRequest};
use crate::error::{Result, StoryError};
use crate::streaming::FragmentStream;

/// A test backend that streams canned fragments.
#[derive(Debug)]
pub struct MockBackend {
    fragments: Vec<String>,
    /// Error raised after all fragments were streamed.
    trailing_error: Option<String>,
    /// Error raised by the call itself, before any stream exists.
    dispatch_error: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockBackend {
    /// Create a mock that streams `fragments` in order and then ends cleanly.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            trailing_error: None,
            dispatch_error: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock whose call fails before any stream exists, like a refused connection.
    pub fn unreachable(message: impl Into<String>) -> Self {
        let mut mock = Self::new(Vec::<String>::new());
        mock.dispatch_error = Some(message.into());
        mock
    }

    /// Fail the stream with [`StoryError::Upstream`] after the scripted fragments.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.trailing_error = Some(message.into());
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn stream(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &CompletionRequest,
    ) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if let Some(ref message) = self.dispatch_error {
            return Err(StoryError::Upstream(message.clone()));
        }

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(ref message) = self.trailing_error {
            items.push(Err(StoryError::Upstream(message.clone())));
        }
        Ok(FragmentStream::new(futures::stream::iter(items)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
