//! # anonmail-core
//!
//! Recipient-driven anonymization of email messages.
//!
//! This crate provides:
//! - **Token derivation** - name fragments, domains and full addresses from
//!   the recipient fields
//! - **Masking** - literal, case-insensitive, longest token first
//! - **Body codecs** - charset and transfer-encoding round trips for text parts
//! - **Header rewriting** - RFC 2047 aware masking of recipient-like headers
//! - **URL anonymization** - query values masked in plain text and HTML links
//! - **Orchestration** - one call from a parsed message to final bytes
//!
//! ## Example
//!
//! ```ignore
//! use anonmail_core::{AnonymizerConfig, anonymize_bytes};
//!
//! let raw = b"To: jane.doe@corp.tld\r\n\r\nHi Jane\r\n";
//! let result = anonymize_bytes(raw, &AnonymizerConfig::default(), None)?;
//! assert_eq!(result.bytes, b"To: xxxx.xxx@xxxx.xxx\r\n\r\nHi xxxx\r\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod anonymizer;
pub mod codec;
mod config;
mod error;
pub mod header;
pub mod mask;
pub mod message;
pub mod recipients;
pub mod tokens;
pub mod url;

pub use anonymizer::{Anonymized, Anonymizer, Report, anonymize_bytes};
pub use config::AnonymizerConfig;
pub use error::{Error, Result};
pub use mask::{Masked, Masker};
pub use message::{MailMessage, MailPart};
pub use tokens::TokenSet;
pub use url::UrlAnonymizer;
