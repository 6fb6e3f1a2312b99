//! Client-side error types.

use thiserror::Error;

/// Errors raised by the client's infrastructure.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Reading or writing the snapshot slot failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("task service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, if any.
        message: String,
    },
}
