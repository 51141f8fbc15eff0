//! Forward-only fragment sequences.
//!
//! [`FragmentStream`] wraps whatever a backend produces (an SSE body, a
//! scripted mock) behind one contract: `next_fragment()` yields the next
//! fragment, an error, or `None` at the end. Once it has yielded `None` or an
//! error it is spent and yields `None` forever.

use crate::error::{Result, StoryError};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type BoxedFragments = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A lazy, single-pass sequence of generated text fragments.
///
/// Fragments may be empty (a chunk without content); consumers decide what
/// to do with them.
///
/// # Example
///
/// ```
/// use story_stream::FragmentStream;
///
/// # tokio_test::block_on(async {
/// let mut stream = FragmentStream::from_fragments(["Hel", "", "lo"]);
/// assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "Hel");
/// assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "");
/// assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "lo");
/// assert!(stream.next_fragment().await.is_none());
/// # });
/// ```
pub struct FragmentStream {
    inner: BoxedFragments,
    read_timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
    primed: Option<String>,
    finished: bool,
}

impl FragmentStream {
    /// Wrap a stream of fragment results.
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            read_timeout: None,
            cancellation: None,
            primed: None,
            finished: false,
        }
    }

    /// A stream over fixed fragments that never fails.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Result<String>> = fragments.into_iter().map(|f| Ok(f.into())).collect();
        Self::new(futures::stream::iter(items))
    }

    /// Fail with [`StoryError::Timeout`] when a single fragment takes longer than `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Stop with [`StoryError::Cancelled`] once the token is cancelled, even
    /// while waiting for a fragment.
    pub fn with_cancellation(mut self, cancel: Option<CancellationToken>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Whether the stream has ended (exhausted or failed).
    pub fn is_finished(&self) -> bool {
        self.finished && self.primed.is_none()
    }

    /// Pull the next fragment.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        if let Some(fragment) = self.primed.take() {
            return Some(Ok(fragment));
        }
        if self.finished {
            return None;
        }
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            self.finished = true;
            return Some(Err(StoryError::Cancelled));
        }

        let pull = pull_next(&mut self.inner, self.read_timeout);
        let next = match self.cancellation.clone() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Some(Err(StoryError::Cancelled)),
                item = pull => item,
            },
            None => pull.await,
        };

        if !matches!(next, Some(Ok(_))) {
            self.finished = true;
        }
        next
    }

    /// Read ahead until the first non-empty fragment and hold it.
    ///
    /// Returns an error if the stream fails before producing any text. The
    /// held fragment is the first thing [`next_fragment`](Self::next_fragment)
    /// returns afterwards. An empty stream primes successfully with nothing held.
    pub async fn prime(&mut self) -> Result<()> {
        if self.primed.is_some() {
            return Ok(());
        }
        while let Some(item) = self.next_fragment().await {
            let fragment = item?;
            if !fragment.is_empty() {
                self.primed = Some(fragment);
                break;
            }
        }
        Ok(())
    }
}

async fn pull_next(
    inner: &mut BoxedFragments,
    read_timeout: Option<Duration>,
) -> Option<Result<String>> {
    match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, inner.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(StoryError::Timeout(limit))),
        },
        None => inner.next().await,
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream")
            .field("read_timeout", &self.read_timeout)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("primed", &self.primed.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}
