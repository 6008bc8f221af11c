//! Error taxonomy shared by the fetch and download pipelines.

use std::time::Duration;

/// Coarse classification of a failure.
///
/// Callers map kinds to user-facing status messages; the pipelines use them to
/// decide whether a failure stays local to one item or ends the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote server did not answer within the deadline.
    Timeout,
    /// The remote answered, but the requested document is not available there.
    NotIndexed,
    /// Input required for a lookup (e.g. a DOI) is absent.
    MissingInput,
    /// No progress was observed for longer than the stall timeout.
    Stalled,
    /// The batch was cancelled through its cancellation token.
    Cancelled,
    /// Anything else: parse errors, unexpected responses, connection resets.
    Unknown,
}

/// Errors produced by providers, the fetcher, the download manager and the
/// progress monitor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request deadline elapsed
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// Document not available on the remote
    #[error("Not indexed: {0}")]
    NotIndexed(String),

    /// Required input is missing
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Progress stopped moving
    #[error("No progress for {waited:?} ({completed}/{total} complete)")]
    Stalled {
        completed: usize,
        total: usize,
        waited: Duration,
    },

    /// Batch cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Markup or response shape could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Remote answered with an unexpected status
    #[error("API error: {0}")]
    Api(String),

    /// No provider registered under this name
    #[error("Provider '{0}' not found")]
    UnknownProvider(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::NotIndexed(_) => ErrorKind::NotIndexed,
            Error::MissingInput(_) => ErrorKind::MissingInput,
            Error::Stalled { .. } => ErrorKind::Stalled,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Network(_)
            | Error::Parse(_)
            | Error::Api(_)
            | Error::UnknownProvider(_)
            | Error::Io(_) => ErrorKind::Unknown,
        }
    }

    /// Short human-readable status for batch-level reporting.
    pub fn status_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Timeout | ErrorKind::Stalled => "Connection timed out",
            ErrorKind::NotIndexed => "Not indexed by the mirror",
            ErrorKind::MissingInput => "Missing input",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unknown => "Unknown error",
        }
    }

    /// Whether re-submitting the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Parse(format!("URL: {}", err))
    }
}
