//! Output destinations for generated text.
//!
//! Every sink follows the same lifecycle: zero or more
//! [`write_fragment`](OutputSink::write_fragment) calls followed by exactly one
//! terminal signal, either [`close`](OutputSink::close) or
//! [`abort`](OutputSink::abort). [`StreamAccumulator::forward`] drives that
//! lifecycle; callers holding a full string use
//! [`write_all`](OutputSink::write_all).
//!
//! [`StreamAccumulator::forward`]: crate::accumulator::StreamAccumulator::forward

use crate::error::{Result, StoryError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Outputs shorter than this many characters get a notice in the CLI summary.
pub const SHORT_OUTPUT_THRESHOLD: usize = 800;

/// A destination for generated text.
#[async_trait]
pub trait OutputSink: Send {
    /// Deliver one fragment, in order.
    async fn write_fragment(&mut self, fragment: &str) -> Result<()>;

    /// Deliver a complete text and close.
    async fn write_all(&mut self, text: &str) -> Result<()> {
        self.write_fragment(text).await?;
        self.close().await
    }

    /// Signal normal end of output. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Signal that output ended with `error`. Nothing further is written.
    async fn abort(&mut self, error: &StoryError);
}

/// Character and whitespace-separated word counts of a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
}

impl TextStats {
    pub fn from_text(text: &str) -> Self {
        Self {
            chars: text.chars().count(),
            words: text.split_whitespace().count(),
        }
    }

    pub fn is_short(&self) -> bool {
        self.chars < SHORT_OUTPUT_THRESHOLD
    }
}

fn closed_error() -> StoryError {
    StoryError::SinkWrite(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "sink already closed",
    ))
}

/// Buffers the text and writes it to a file once, on close.
///
/// An existing file is overwritten. An aborted sink writes nothing, so a
/// failed generation never leaves a partial file behind.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    buffer: String,
    done: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buffer: String::new(),
            done: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> TextStats {
        TextStats::from_text(&self.buffer)
    }
}

#[async_trait]
impl OutputSink for FileSink {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        if self.done {
            return Err(closed_error());
        }
        self.buffer.push_str(fragment);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        tokio::fs::write(&self.path, self.buffer.as_bytes()).await?;
        tracing::info!(path = %self.path.display(), chars = self.buffer.chars().count(), "story written");
        Ok(())
    }

    async fn abort(&mut self, error: &StoryError) {
        if !self.done {
            tracing::warn!(path = %self.path.display(), error = %error, "discarding output, nothing written");
        }
        self.done = true;
        self.buffer.clear();
    }
}

/// Item type carried by a [`ChannelSink`] channel; matches what a streaming
/// HTTP body consumes.
pub type BodyChunk = std::result::Result<Bytes, StoryError>;

/// Forwards fragments into a bounded channel, one body chunk per fragment.
///
/// The channel has capacity 1, so a slow reader slows generation down rather
/// than letting text pile up. A dropped receiver means the reader went away:
/// the write fails with [`StoryError::SinkWrite`] and forwarding stops.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Option<mpsc::Sender<BodyChunk>>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<BodyChunk>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { sender: Some(tx) }, rx)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(closed_error)?;
        sender
            .send(Ok(Bytes::copy_from_slice(fragment.as_bytes())))
            .await
            .map_err(|_| {
                StoryError::SinkWrite(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "client disconnected",
                ))
            })
    }

    async fn close(&mut self) -> Result<()> {
        self.sender = None;
        Ok(())
    }

    async fn abort(&mut self, error: &StoryError) {
        if let Some(sender) = self.sender.take() {
            // the reader may already be gone
            let _ = sender
                .send(Err(StoryError::StreamAborted(error.to_string())))
                .await;
        }
    }
}

/// Prints every fragment as soon as it arrives.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    stats: TextStats,
    /// Set when the last character written was whitespace, for word counting.
    at_boundary: bool,
    closed: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stats: TextStats::default(),
            at_boundary: true,
            closed: false,
        }
    }

    /// Running statistics of everything written so far.
    pub fn stats(&self) -> TextStats {
        self.stats
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn count(&mut self, fragment: &str) {
        for ch in fragment.chars() {
            self.stats.chars += 1;
            if ch.is_whitespace() {
                self.at_boundary = true;
            } else if self.at_boundary {
                self.stats.words += 1;
                self.at_boundary = false;
            }
        }
    }
}

#[async_trait]
impl<W: Write + Send> OutputSink for TerminalSink<W> {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.out.write_all(fragment.as_bytes())?;
        self.out.flush()?;
        self.count(fragment);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.flush()?;
        Ok(())
    }

    async fn abort(&mut self, _error: &StoryError) {
        self.closed = true;
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> std::fmt::Debug for TerminalSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSink")
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_stats() {
        let stats = TextStats::from_text("The young  swordsman\nwalked");
        assert_eq!(stats.words, 4);
        assert_eq!(stats.chars, 27);
        assert!(stats.is_short());
        assert_eq!(TextStats::from_text("剑客少年").chars, 4);
    }

    #[tokio::test]
    async fn test_file_sink_writes_once_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "old content that is longer").unwrap();

        let mut sink = FileSink::new(&path);
        sink.write_fragment("少年").await.unwrap();
        sink.write_fragment("剑客").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old content that is longer");

        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "少年剑客");
        assert!(sink.write_fragment("more").await.is_err());
    }

    #[tokio::test]
    async fn test_file_sink_abort_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");

        let mut sink = FileSink::new(&path);
        sink.write_fragment("partial").await.unwrap();
        sink.abort(&StoryError::Upstream("reset".into())).await;
        sink.close().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_sink_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("story.txt");
        let mut sink = FileSink::new(&path);
        let err = sink.write_all("text").await.unwrap_err();
        assert!(matches!(err, StoryError::SinkWrite(_)));
    }

    #[tokio::test]
    async fn test_channel_sink_one_chunk_per_fragment() {
        let (mut sink, mut rx) = ChannelSink::channel();
        let reader = tokio::spawn(async move {
            let mut chunks = Vec::new();
            while let Some(chunk) = rx.recv().await {
                chunks.push(chunk.unwrap());
            }
            chunks
        });
        sink.write_fragment("The ").await.unwrap();
        sink.write_fragment("young").await.unwrap();
        sink.close().await.unwrap();

        let chunks = reader.await.unwrap();
        assert_eq!(chunks, vec![Bytes::from("The "), Bytes::from("young")]);
    }

    #[tokio::test]
    async fn test_channel_sink_abort_sends_error() {
        let (mut sink, mut rx) = ChannelSink::channel();
        sink.abort(&StoryError::Upstream("reset".into())).await;
        assert!(matches!(
            rx.recv().await,
            Some(Err(StoryError::StreamAborted(_)))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_reader_gone() {
        let (mut sink, rx) = ChannelSink::channel();
        drop(rx);
        let err = sink.write_fragment("text").await.unwrap_err();
        assert!(matches!(err, StoryError::SinkWrite(_)));
    }

    #[tokio::test]
    async fn test_terminal_sink_counts_across_fragments() {
        let mut sink = TerminalSink::new(Vec::new());
        sink.write_fragment("The you").await.unwrap();
        sink.write_fragment("ng sword").await.unwrap();
        sink.write_fragment("sman").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(sink.stats(), TextStats::from_text("The young swordsman"));
        assert_eq!(sink.into_inner(), b"The young swordsman".to_vec());
    }
}
