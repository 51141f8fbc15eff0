//! SSE (Server-Sent Events) decoder for OpenAI-compatible chat streams.
//!
//! Handles the `data: ` prefix, `[DONE]` termination, line buffering across
//! TCP chunk boundaries, comments, and empty keep-alive lines. Buffering is
//! byte-based so multi-byte characters split between chunks survive intact.

use crate::error::{Result, StoryError};
use serde_json::Value;

/// Longest slice of an undecodable payload quoted in errors.
const SNIPPET_LEN: usize = 120;

/// SSE stream decoder for OpenAI-compatible APIs.
///
/// # Example
///
/// ```
/// use story_stream::backend::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n";
/// let values = decoder.decode(data).unwrap();
/// assert_eq!(values.len(), 1);
/// assert!(decoder.is_done());
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes and return the JSON payload of every complete `data:` line.
    ///
    /// A `data:` line that is not valid JSON fails with
    /// [`StoryError::MalformedChunk`]. Lines after `[DONE]` are ignored.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Value>> {
        self.buffer.extend_from_slice(chunk);

        let mut values = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(value) = self.decode_line(&line)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Decode whatever is left in the buffer once the body has ended.
    pub fn flush(&mut self) -> Result<Vec<Value>> {
        let raw = std::mem::take(&mut self.buffer);
        let remaining = String::from_utf8_lossy(&raw);
        let mut values = Vec::new();
        for line in remaining.lines() {
            if let Some(value) = self.decode_line(line)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<Value>> {
        let line = line.trim();
        if self.done || line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let Some(data) = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
        else {
            // event:, id:, retry: carry nothing we need
            return Ok(None);
        };

        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        serde_json::from_str::<Value>(data).map(Some).map_err(|e| {
            let snippet: String = data.chars().take(SNIPPET_LEN).collect();
            StoryError::MalformedChunk(format!("{} (payload: {})", e, snippet))
        })
    }
}
