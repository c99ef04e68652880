//! Classified error surface shared by every source, database and the network client.
//!
//! Faults are classified where they happen (the `From` impls below), so `?` inside an
//! adapter already produces the right [ErrorKind]. [try_connect](super::try_connect) is
//! the funnel that turns whatever is left (panics included) into a [Response].

use serde::Serialize;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Boxed underlying cause kept on every [ScrapeError] for diagnostics.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of one source operation: a value or a classified error, never both.
pub type Response<T> = Result<T, ScrapeError>;

/// Coarse classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refusal, timeout, non-success HTTP status.
    Network,
    /// Expected element, attribute or JSON field absent or malformed.
    Parsing,
    /// Anything uncategorized.
    Unknown,
}

/// Error returned by source and database operations.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Parsing error: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Unknown error: {message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Non-success HTTP status. Kept as the cause of a [ScrapeError::Network].
#[derive(Debug, Clone, Error)]
#[error("HTTP {status} when fetching: {url}")]
pub struct HttpStatusError {
    pub status: u16,
    pub url: String,
}

impl ScrapeError {
    pub fn network(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ScrapeError::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        ScrapeError::Parsing {
            message: message.into(),
            source: None,
        }
    }

    pub fn parsing_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ScrapeError::Parsing {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn unknown(message: impl Into<String>, source: Option<BoxError>) -> Self {
        ScrapeError::Unknown {
            message: message.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Network { .. } => ErrorKind::Network,
            ScrapeError::Parsing { .. } => ErrorKind::Parsing,
            ScrapeError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScrapeError::Network { message, .. }
            | ScrapeError::Parsing { message, .. }
            | ScrapeError::Unknown { message, .. } => message,
        }
    }

    /// Status code when the cause is a non-success HTTP reply.
    pub fn http_status(&self) -> Option<u16> {
        self.cause()
            .and_then(|c| c.downcast_ref::<HttpStatusError>())
            .map(|c| c.status)
    }

    /// The original fault, if one was captured.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            ScrapeError::Network { source, .. }
            | ScrapeError::Parsing { source, .. }
            | ScrapeError::Unknown { source, .. } => source.as_deref(),
        }
    }
}

impl From<HttpStatusError> for ScrapeError {
    fn from(e: HttpStatusError) -> Self {
        ScrapeError::network(e.to_string(), e)
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown url>".to_string());
        if e.is_timeout() {
            ScrapeError::network(format!("request timed out: {}", url), e)
        } else if e.is_connect() {
            ScrapeError::network(format!("could not reach {}", url), e)
        } else if e.is_status() {
            let status = e.status().map(|s| s.as_u16()).unwrap_or_default();
            ScrapeError::network(format!("HTTP {} when fetching: {}", status, url), e)
        } else if e.is_redirect() {
            ScrapeError::network(format!("redirect error at {}", url), e)
        } else if e.is_decode() || e.is_body() {
            ScrapeError::parsing_with(format!("failed to read response body from {}", url), e)
        } else if e.is_request() {
            ScrapeError::network(format!("request to {} failed", url), e)
        } else {
            ScrapeError::unknown(format!("HTTP client error at {}", url), Some(Box::new(e)))
        }
    }
}

impl From<io::Error> for ScrapeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable => ScrapeError::network(e.to_string(), e),
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                ScrapeError::parsing_with(e.to_string(), e)
            }
            _ => ScrapeError::unknown(e.to_string(), Some(Box::new(e))),
        }
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::parsing_with(format!("malformed JSON: {}", e), e)
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(e: url::ParseError) -> Self {
        ScrapeError::parsing_with(format!("malformed URL: {}", e), e)
    }
}
