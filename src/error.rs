use std::time::Duration;
use thiserror::Error;

/// Errors produced by the generation pipeline and its components.
#[derive(Error, Debug)]
pub enum StoryError {
    /// The incoming request was not well-formed structured data.
    #[error("{0}")]
    MalformedRequest(String),

    /// Strict validation rejected a request that lacks expected fields.
    #[error("缺少必要的创作信息: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// The request body exceeded the configured size limit.
    #[error("请求体过大，超过 {0} 字节上限")]
    PayloadTooLarge(usize),

    /// Credentials or endpoint are unusable; no network call was made.
    #[error("{0}")]
    ClientNotInitialized(String),

    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// A streamed chunk could not be decoded.
    #[error("malformed stream chunk: {0}")]
    MalformedChunk(String),

    /// The provider reported an error object inside the stream.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// No fragment arrived within the configured read timeout.
    #[error("no fragment received within {0:?}")]
    Timeout(Duration),

    /// Generation was cancelled through its cancellation token.
    #[error("generation was cancelled")]
    Cancelled,

    /// A forwarding run ended with an error after output had started.
    #[error("stream aborted: {0}")]
    StreamAborted(String),

    /// The output destination could not accept the text.
    #[error("failed to write output: {0}")]
    SinkWrite(#[from] std::io::Error),

    /// Invalid configuration detected while loading settings or building a client.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick user-facing outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local validation failed; the pipeline never ran.
    MalformedRequest,
    /// The generation client is unusable; no network call was made.
    ClientNotInitialized,
    /// The remote call failed after dispatch.
    Generation,
    /// The sink could not accept output.
    SinkWrite,
    /// Configuration or anything else.
    Config,
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoryError::MalformedRequest(_)
            | StoryError::MissingFields(_)
            | StoryError::PayloadTooLarge(_) => ErrorKind::MalformedRequest,
            StoryError::ClientNotInitialized(_) => ErrorKind::ClientNotInitialized,
            StoryError::Request(_)
            | StoryError::HttpError { .. }
            | StoryError::MalformedChunk(_)
            | StoryError::Upstream(_)
            | StoryError::Timeout(_)
            | StoryError::Cancelled
            | StoryError::StreamAborted(_) => ErrorKind::Generation,
            StoryError::SinkWrite(_) => ErrorKind::SinkWrite,
            StoryError::InvalidConfig(_) | StoryError::Other(_) => ErrorKind::Config,
        }
    }
}

impl From<anyhow::Error> for StoryError {
    fn from(err: anyhow::Error) -> Self {
        StoryError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            StoryError::MalformedRequest("x".into()).kind(),
            ErrorKind::MalformedRequest
        );
        assert_eq!(
            StoryError::MissingFields(vec!["style"]).kind(),
            ErrorKind::MalformedRequest
        );
        assert_eq!(
            StoryError::PayloadTooLarge(1024).kind(),
            ErrorKind::MalformedRequest
        );
        assert_eq!(
            StoryError::ClientNotInitialized("x".into()).kind(),
            ErrorKind::ClientNotInitialized
        );
        assert_eq!(
            StoryError::HttpError {
                status: 429,
                body: "slow down".into()
            }
            .kind(),
            ErrorKind::Generation
        );
        assert_eq!(StoryError::Cancelled.kind(), ErrorKind::Generation);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(StoryError::from(io).kind(), ErrorKind::SinkWrite);
    }

    #[test]
    fn test_missing_fields_message_lists_fields() {
        let err = StoryError::MissingFields(vec!["style", "plot"]);
        assert_eq!(err.to_string(), "缺少必要的创作信息: style, plot");
    }
}
