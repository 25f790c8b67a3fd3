//! # anonmail-mime
//!
//! MIME message parsing and re-serialization for anonmail.
//!
//! ## Features
//!
//! - **Lossless parsing**: Headers, multipart delimiters, preambles and
//!   epilogues are kept so an untouched message writes back byte for byte
//! - **Part tree**: Walk nested multiparts and replace leaf payloads
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Charsets**: Lossy conversion through `encoding_rs`
//!
//! ## Quick Start
//!
//! ```ignore
//! use anonmail_mime::Message;
//!
//! let raw = b"To: jane.doe@corp.tld\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello, Jane!";
//!
//! let mut message = Message::parse(raw);
//! message.for_each_leaf_mut(&mut |part| {
//!     let text = String::from_utf8_lossy(&part.decode_body()?).replace("Jane", "xxxx");
//!     part.set_body(text.into_bytes());
//!     Ok::<_, anonmail_mime::Error>(())
//! })?;
//!
//! let bytes = message.to_bytes();
//! ```
//!
//! ### Encoded words
//!
//! ```ignore
//! use anonmail_mime::encoding::{decode_encoded_words, encode_encoded_words};
//!
//! let words = decode_encoded_words("=?utf-8?B?SMOpbGxv?= world");
//! let header = encode_encoded_words(&words);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod charset;
pub mod encoding;

pub use content_type::ContentType;
pub use encoding::EncodedWord;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, LineEnding, Message, Multipart, Part, TransferEncoding, split_header_block};
