//! Draining fragment streams.
//!
//! A stream is consumed exactly one way: either buffered into a single string
//! ([`StreamAccumulator::buffer`]) or forwarded fragment by fragment into an
//! [`OutputSink`] ([`StreamAccumulator::forward`]). Both take the stream by
//! value, so neither can run twice on the same stream.

use crate::error::Result;
use crate::sink::OutputSink;
use crate::streaming::FragmentStream;

/// What a completed forwarding run delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardSummary {
    /// Non-empty fragments written to the sink.
    pub fragments: usize,
    /// Characters written to the sink.
    pub chars: usize,
}

/// Consumes a [`FragmentStream`] in order, skipping empty fragments.
pub struct StreamAccumulator;

impl StreamAccumulator {
    /// Concatenate every fragment into one string.
    ///
    /// A failure part-way through is returned as-is and the partial text is
    /// discarded. A stream of only empty fragments yields `""`.
    ///
    /// # Example
    ///
    /// ```
    /// use story_stream::{FragmentStream, StreamAccumulator};
    ///
    /// # tokio_test::block_on(async {
    /// let stream = FragmentStream::from_fragments(["The ", "", "young ", "swordsman..."]);
    /// let text = StreamAccumulator::buffer(stream).await.unwrap();
    /// assert_eq!(text, "The young swordsman...");
    /// # });
    /// ```
    pub async fn buffer(mut stream: FragmentStream) -> Result<String> {
        let mut text = String::new();
        while let Some(item) = stream.next_fragment().await {
            let fragment = item?;
            text.push_str(&fragment);
        }
        Ok(text)
    }

    /// Push each fragment into `sink` as it arrives.
    ///
    /// On exhaustion the sink is closed; on a stream or write failure the
    /// sink is aborted and the error returned. The sink receives exactly one
    /// of the two. Dropping the stream on failure releases the upstream call.
    pub async fn forward<S>(mut stream: FragmentStream, sink: &mut S) -> Result<ForwardSummary>
    where
        S: OutputSink + ?Sized,
    {
        let mut summary = ForwardSummary::default();
        while let Some(item) = stream.next_fragment().await {
            let written = match item {
                Ok(fragment) if fragment.is_empty() => continue,
                Ok(fragment) => sink
                    .write_fragment(&fragment)
                    .await
                    .map(|_| fragment.chars().count()),
                Err(e) => Err(e),
            };
            match written {
                Ok(chars) => {
                    summary.fragments += 1;
                    summary.chars += chars;
                }
                Err(e) => {
                    drop(stream);
                    tracing::warn!(
                        error = %e,
                        fragments = summary.fragments,
                        chars = summary.chars,
                        "forwarding stopped"
                    );
                    sink.abort(&e).await;
                    return Err(e);
                }
            }
        }

        sink.close().await.inspect_err(|e| {
            tracing::warn!(error = %e, "closing output failed");
        })?;
        tracing::debug!(fragments = summary.fragments, chars = summary.chars, "forwarding finished");
        Ok(summary)
    }
}
