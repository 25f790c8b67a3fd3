//! MIME message structure and handling.
//!
//! A [`Message`] is a tree of [`Part`]s. Everything needed to write the
//! message back (delimiter lines, preamble, epilogue, header folding) is kept,
//! so only bodies that were replaced with [`Part::set_body`] change on output.

use crate::charset;
use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::Result;
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Binary (no encoding).
    Binary,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Anything else, with the label as written.
    Other(String),
}

impl TransferEncoding {
    /// Parses transfer encoding from a header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let label = s.trim();
        match label.to_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other(label.to_string()),
        }
    }

    /// Returns `true` for encodings that leave the bytes as they are.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::SevenBit | Self::EightBit | Self::Binary)
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Other(label) => write!(f, "{label}"),
        }
    }
}

/// Line ending convention of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\r\n`, as on the wire.
    #[default]
    Crlf,
    /// `\n`, as in most mail spools.
    Lf,
}

impl LineEnding {
    /// Detects the convention from the first line break.
    #[must_use]
    pub fn detect(raw: &[u8]) -> Self {
        match raw.iter().position(|b| *b == b'\n') {
            Some(i) if i > 0 && raw[i - 1] == b'\r' => Self::Crlf,
            Some(_) => Self::Lf,
            None => Self::default(),
        }
    }

    /// Returns the line break characters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
        }
    }
}

/// Finds the blank line separating headers from body.
///
/// Returns the header block (including the line break of its last field) and
/// the rest of the message starting at the blank line, or `None` when the
/// message has no blank line at all.
#[must_use]
pub fn split_header_block(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    header_end(raw).map(|(end, _)| raw.split_at(end))
}

/// Returns `(header_end, body_start)` offsets.
fn header_end(raw: &[u8]) -> Option<(usize, usize)> {
    let mut pos = 0;
    loop {
        let rest = &raw[pos..];
        if rest.starts_with(b"\r\n") {
            return Some((pos, pos + 2));
        }
        if rest.starts_with(b"\n") {
            return Some((pos, pos + 1));
        }
        pos += rest.iter().position(|b| *b == b'\n')? + 1;
    }
}

/// Body of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A leaf payload, still transfer-encoded.
    Single(Vec<u8>),
    /// Child parts.
    Multipart(Multipart),
}

/// Multipart container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    /// Boundary parameter of the container.
    pub boundary: String,
    /// Bytes before the first delimiter line.
    pub preamble: Vec<u8>,
    /// Child parts.
    pub parts: Vec<Part>,
    /// Delimiter lines with the line break preceding them; one per part,
    /// plus the closing delimiter when the container is closed.
    delimiters: Vec<Vec<u8>>,
    /// Bytes after the closing delimiter line.
    pub epilogue: Vec<u8>,
}

impl Multipart {
    fn parse(body: &[u8], boundary: &str, line_ending: LineEnding) -> Option<Self> {
        let delimiter = format!("--{boundary}").into_bytes();
        // (line start, content start, closing)
        let mut marks: Vec<(usize, usize, bool)> = Vec::new();
        let mut pos = 0;

        while pos < body.len() {
            let (line_end, next) = body[pos..]
                .iter()
                .position(|b| *b == b'\n')
                .map_or((body.len(), body.len()), |i| (pos + i, pos + i + 1));
            let line = &body[pos..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if let Some(rest) = line.strip_prefix(delimiter.as_slice()) {
                if rest.starts_with(b"--") {
                    marks.push((pos, next, true));
                    break;
                }
                if rest.iter().all(u8::is_ascii_whitespace) {
                    marks.push((pos, next, false));
                }
            }
            pos = next;
        }

        match marks.first() {
            Some((_, _, false)) => {}
            _ => return None,
        }

        // Each delimiter owns the line break in front of it.
        let cut = |p: usize, floor: usize| {
            let newline = if body[..p].ends_with(b"\r\n") {
                2
            } else {
                usize::from(body[..p].ends_with(b"\n"))
            };
            (p - newline).max(floor)
        };

        let mut multipart = Self {
            boundary: boundary.to_string(),
            preamble: Vec::new(),
            parts: Vec::new(),
            delimiters: Vec::new(),
            epilogue: Vec::new(),
        };

        let mut content_start = 0;
        for (i, &(line_start, next, closing)) in marks.iter().enumerate() {
            let start = cut(line_start, content_start);
            if i == 0 {
                multipart.preamble = body[..start].to_vec();
            } else {
                multipart
                    .parts
                    .push(Part::parse_with(&body[content_start..start], line_ending));
            }
            multipart.delimiters.push(body[start..next].to_vec());
            content_start = next;

            if closing {
                multipart.epilogue = body[next..].to_vec();
                return Some(multipart);
            }
        }

        // Unterminated: the last part runs to the end of the body.
        multipart
            .parts
            .push(Part::parse_with(&body[content_start..], line_ending));
        Some(multipart)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.preamble);
        for (delimiter, part) in self.delimiters.iter().zip(&self.parts) {
            out.extend_from_slice(delimiter);
            part.write_to(out);
        }
        if let Some(closing) = self.delimiters.get(self.parts.len()) {
            out.extend_from_slice(closing);
            out.extend_from_slice(&self.epilogue);
        }
    }
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
    /// Whether a blank line separates headers and body.
    separator: bool,
    line_ending: LineEnding,
}

impl Part {
    /// Creates a leaf part.
    #[must_use]
    pub fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Single(body),
            separator: true,
            line_ending: LineEnding::default(),
        }
    }

    fn parse_with(raw: &[u8], line_ending: LineEnding) -> Self {
        let (headers, body, separator) = match header_end(raw) {
            Some((end, body_start)) => (
                Headers::parse(&String::from_utf8_lossy(&raw[..end])),
                &raw[body_start..],
                true,
            ),
            None if starts_with_field(raw) => {
                (Headers::parse(&String::from_utf8_lossy(raw)), &raw[raw.len()..], false)
            }
            None => (Headers::new(), raw, false),
        };

        let mut part = Self {
            headers,
            body: Body::Single(Vec::new()),
            separator,
            line_ending,
        };

        let content_type = part.content_type();
        let multipart = content_type
            .boundary()
            .filter(|_| content_type.is_multipart())
            .and_then(|boundary| Multipart::parse(body, boundary, line_ending));
        part.body = multipart.map_or_else(|| Body::Single(body.to_vec()), Body::Multipart);
        part
    }

    /// Gets the content type, `text/plain` when missing or unparsable.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(&value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Gets the declared charset, lower-cased.
    #[must_use]
    pub fn charset(&self) -> Option<String> {
        self.content_type().charset()
    }

    /// Gets the transfer encoding, `None` when the header is absent.
    #[must_use]
    pub fn transfer_encoding(&self) -> Option<TransferEncoding> {
        self.headers
            .get("content-transfer-encoding")
            .map(|value| TransferEncoding::parse(&value))
    }

    /// Checks if this part holds child parts.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// Returns the line ending used when writing this part.
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Returns the raw (transfer-encoded) payload of a leaf part.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Single(bytes) => Some(bytes),
            Body::Multipart(_) => None,
        }
    }

    /// Replaces the body with an already transfer-encoded payload.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Body::Single(body);
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// Multipart containers decode to an empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body cannot be decoded even leniently.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        let Some(body) = self.body() else {
            return Ok(Vec::new());
        };
        match self.transfer_encoding() {
            Some(TransferEncoding::Base64) => decode_base64(body),
            Some(TransferEncoding::QuotedPrintable) => Ok(decode_quoted_printable(body)),
            _ => Ok(body.to_vec()),
        }
    }

    /// Returns this part and all descendants, depth-first, parents first.
    #[must_use]
    pub fn walk(&self) -> Vec<&Self> {
        let mut parts = vec![self];
        if let Body::Multipart(multipart) = &self.body {
            for child in &multipart.parts {
                parts.extend(child.walk());
            }
        }
        parts
    }

    /// Calls `f` on every leaf part, depth-first, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn for_each_leaf_mut<E, F>(&mut self, f: &mut F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut Self) -> std::result::Result<(), E>,
    {
        if let Body::Multipart(multipart) = &mut self.body {
            for child in &mut multipart.parts {
                child.for_each_leaf_mut(&mut *f)?;
            }
            return Ok(());
        }
        f(self)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let line_ending = self.line_ending.as_str();
        self.headers.write_to(out, line_ending);
        if self.separator {
            out.extend_from_slice(line_ending.as_bytes());
        }
        match &self.body {
            Body::Single(bytes) => out.extend_from_slice(bytes),
            Body::Multipart(multipart) => multipart.write_to(out),
        }
    }
}

/// Returns `true` if the first line looks like a `name: value` field.
fn starts_with_field(raw: &[u8]) -> bool {
    let first = raw.split(|b| *b == b'\n').next().unwrap_or_default();
    first.iter().position(|b| *b == b':').is_some_and(|colon| {
        colon > 0 && first[..colon].iter().all(|b| b.is_ascii_graphic())
    })
}

/// MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a raw message.
    ///
    /// Parsing never fails: anything that does not look like MIME structure
    /// ends up in a leaf body unchanged.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse_with(raw, LineEnding::detect(raw)),
        }
    }

    /// Message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Mutable message headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.root.headers
    }

    /// The top-level part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// The top-level part, mutably.
    pub fn root_mut(&mut self) -> &mut Part {
        &mut self.root
    }

    /// Line ending convention detected at parse time.
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.root.line_ending
    }

    /// Checks if the message has neither headers nor body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.headers.is_empty()
            && self
                .root
                .body()
                .is_some_and(|body| body.iter().all(u8::is_ascii_whitespace))
    }

    /// Charset for the message as a whole.
    ///
    /// The top-level declared charset, else the first charset found among the
    /// parts in walk order.
    #[must_use]
    pub fn charset(&self) -> Option<String> {
        self.root.walk().into_iter().find_map(Part::charset)
    }

    /// Same as [`Message::charset`] but falls back to UTF-8.
    #[must_use]
    pub fn charset_or_default(&self) -> String {
        self.charset()
            .unwrap_or_else(|| charset::DEFAULT_CHARSET.to_string())
    }

    /// Returns every part, depth-first, parents first.
    #[must_use]
    pub fn walk(&self) -> Vec<&Part> {
        self.root.walk()
    }

    /// Calls `f` on every leaf part.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn for_each_leaf_mut<E, F>(&mut self, f: &mut F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut Part) -> std::result::Result<(), E>,
    {
        self.root.for_each_leaf_mut(f)
    }

    /// Serializes the message.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.root.write_to(&mut out);
        out
    }
}
