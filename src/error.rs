use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`FetchError`], used by callers that only
/// care about what went wrong, not which library reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or browser-process failure. Retryable.
    Transport,
    /// The response was confirmed not to be HTML. Not retryable.
    InvalidContentKind,
    /// Bad URL or configuration supplied by the caller. Not retryable.
    InvalidInput,
}

/// Errors surfaced by the fetch engine
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("response is not html (content-type: {content_type})")]
    InvalidContentKind { content_type: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not start webdriver session: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("webdriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),

    #[error("scratch directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("fetching {url} failed after {attempts} attempt(s) in {elapsed:.2?}: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Classify the error, looking through the attempt-count wrapper.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidContentKind { .. } => ErrorKind::InvalidContentKind,
            FetchError::InvalidUrl { .. } | FetchError::Config(_) => ErrorKind::InvalidInput,
            FetchError::Http(_)
            | FetchError::Session(_)
            | FetchError::Command(_)
            | FetchError::Io(_)
            | FetchError::Transport(_) => ErrorKind::Transport,
            FetchError::Exhausted { source, .. } => source.kind(),
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Number of attempts made, when the error came out of the retry loop
    pub fn attempts(&self) -> Option<u32> {
        match self {
            FetchError::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
