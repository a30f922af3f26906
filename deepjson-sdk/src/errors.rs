//! Unified error types for the `deepjson` crate.
//!
//! This module centralizes all failures that can occur while using the SDK and
//! provides a single top-level [`Error`] enum plus the convenient [`Result`] alias.
//! Errors from lower layers (`reqwest`, `tokio-tungstenite`, URL parsing) are
//! mapped into structured variants so callers can tell an API error apart from
//! a network failure or a local fault.

use thiserror::Error;

// --- Build-Time Error ---

/// Errors that can occur while building a [`DeepJsonClient`](crate::DeepJsonClient).
#[derive(Debug, Error)]
pub enum BuildError {
    /// No base URL was supplied to the builder.
    #[error("A base URL is required to build the client")]
    MissingBaseUrl,

    /// The supplied base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    /// Failed to build the HTTP client (reqwest configuration).
    #[error("Failed to build the HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

// --- The Main Operational Error Enum ---

/// The crate’s top-level error type.
///
/// It groups failures into high-level categories:
/// - [`Error::Request`]: HTTP API, network and local request faults
/// - [`Error::Session`]: real-time channel failures
/// - [`Error::Parse`]: URL parsing failures
/// - [`Error::Build`]: construction of the client failed
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request/response failed (server status, network, validation, JSON).
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// Real-time session channel failed.
    #[error("Session channel error: {0}")]
    Session(#[from] SessionError),

    /// URL parsing failed while preparing a request or a socket URL.
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] url::ParseError),

    /// Building the client failed.
    #[error("Client build failed: {0}")]
    Build(#[from] BuildError),
}

impl Error {
    /// HTTP status of an API error, `None` for every other kind.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Request(RequestError::Server { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Server-provided body of an API error, `None` for every other kind.
    pub fn details(&self) -> Option<&str> {
        match self {
            Error::Request(RequestError::Server { message, .. }) => Some(message),
            _ => None,
        }
    }
}

// --- Request Error ---

/// Transport and server-side HTTP errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The server returned a non-success status. Includes status and body.
    #[error("API Error: {status} - {message}")]
    Server {
        /// The HTTP status code returned by the server.
        status: reqwest::StatusCode,
        /// The server response body captured for context.
        message: String,
    },

    /// The request was sent but no response arrived (timeout, connection drop, TLS).
    #[error("Network Error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request could not be constructed locally.
    #[error("Request Error: {message}")]
    Invalid {
        /// Human-readable explanation of what was invalid.
        message: String,
    },

    /// JSON decoding failed when parsing a server response.
    #[error("JSON decode error: {message}")]
    DecodeJson {
        /// Error message from the JSON deserializer.
        message: String,
    },

    /// Reading a file for upload failed.
    #[error("Failed to read upload file `{path}`: {source}")]
    File {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            RequestError::Invalid {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            RequestError::DecodeJson {
                message: err.to_string(),
            }
        } else {
            RequestError::Network(err)
        }
    }
}

// --- Session Channel Error ---

/// Errors produced by [`SessionChannel`](crate::SessionChannel).
#[derive(Debug, Error)]
pub enum SessionError {
    /// `join_session` was called with an empty channel id.
    #[error("Channel ID required")]
    MissingChannelId,

    /// `send` was called without an attached, connected transport.
    #[error("Not connected to a session")]
    NotConnected,

    /// The WebSocket handshake failed.
    #[error("Failed to open the session transport: {0}")]
    Connect(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The server reported an error before the session was established.
    #[error("Server rejected the session: {0}")]
    Rejected(String),

    /// Session establishment did not complete within the caller's timeout.
    #[error("Timed out waiting for the session to be established")]
    Timeout,

    /// The transport closed before the session was established.
    #[error("Session transport closed before the session was established")]
    Closed,

    /// A frame could not be encoded or decoded.
    #[error("Malformed session frame: {0}")]
    Protocol(String),
}

/// A specialized `Result` type for `deepjson` operations.
pub type Result<T> = std::result::Result<T, Error>;

// A macro to reduce boilerplate for converting base errors into the top-level Error.
macro_rules! impl_from_for_error {
    ($from_type:ty, $to_variant:path) => {
        impl From<$from_type> for Error {
            fn from(err: $from_type) -> Self {
                $to_variant(err.into())
            }
        }
    };
}

impl_from_for_error!(reqwest::Error, Error::Request);
impl_from_for_error!(tokio_tungstenite::tungstenite::Error, Error::Session);

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Connect(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_status_and_details() {
        let err = Error::from(RequestError::Server {
            status: reqwest::StatusCode::NOT_FOUND,
            message: "{\"error\":\"missing\"}".into(),
        });
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
        assert_eq!(err.details(), Some("{\"error\":\"missing\"}"));
        assert!(err.to_string().contains("API Error: 404"));
    }

    #[test]
    fn non_api_errors_have_no_status() {
        let err = Error::from(SessionError::NotConnected);
        assert_eq!(err.status(), None);
        assert_eq!(err.details(), None);
        assert_eq!(
            err.to_string(),
            "Session channel error: Not connected to a session"
        );
    }
}
