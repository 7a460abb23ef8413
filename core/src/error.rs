//! Error types for the trip journal API client.
//!
//! # Design
//! Every failure mode of a call maps to exactly one `ApiError` variant so the
//! caller can react without inspecting transport internals. `Unauthorized`
//! covers both "no token held" and "server answered 401"; in the second case
//! the client has already cleared its session by the time the error is
//! returned.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by `JournalClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request path could not be resolved against the base URL.
    #[error("Invalid URL.")]
    InvalidUrl,

    /// The transport returned something that is not a valid HTTP response.
    #[error("Invalid server response.")]
    InvalidResponse,

    /// The server returned a non-2xx status other than 401.
    #[error("Server returned status code {0}.")]
    HttpStatus(u16),

    /// No token is held, or the server rejected the one we sent.
    #[error("Unauthorized. Please log in again.")]
    Unauthorized,

    /// A 2xx response body could not be decoded into the expected type.
    #[error("Failed to decode server response.")]
    Decoding(#[source] serde_json::Error),

    /// The round trip failed below HTTP, or the request body could not be encoded.
    #[error("{0}")]
    Underlying(#[source] TransportError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Status code carried by `HttpStatus`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}
