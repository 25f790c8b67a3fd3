//! Error types for the anonymization core.

use thiserror::Error;

/// Errors that abort the anonymization of a message.
#[derive(Debug, Error)]
pub enum Error {
    /// The message has neither headers nor body.
    #[error("Message is empty")]
    EmptyMessage,

    /// No To/Cc, Received or override recipient could be found.
    #[error("No recipient could be resolved")]
    NoRecipientResolved,

    /// A text part declares a transfer encoding that cannot be re-applied.
    #[error("Unsupported Content-Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// The serialized message has no blank line between headers and body.
    #[error("Header/body boundary not found")]
    HeaderBoundaryNotFound,

    /// MIME decoding failed.
    #[error("MIME error: {0}")]
    Mime(#[from] anonmail_mime::Error),

    /// A matcher could not be compiled.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
