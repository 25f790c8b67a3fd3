//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable (RFC 2045), and RFC 2047 encoded-word
//! header encoding. Decoders are lenient: real-world mail is full of
//! slightly broken transfer encodings and anonymization must still proceed.

use crate::charset;
use crate::error::Result;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use std::fmt::Write as _;

/// Maximum line length for Base64 and Quoted-Printable bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded word.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Decoder accepting missing padding and non-canonical trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes data as a single line of Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8], line_ending: &str) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str(line_ending);
        }
        // Base64 output is pure ASCII.
        result.push_str(&String::from_utf8_lossy(chunk));
    }

    result
}

/// Decodes Base64 data, ignoring whitespace, padding and stray characters.
///
/// # Errors
///
/// Returns an error if what remains after cleanup is still not Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let mut cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();

    // A lone trailing sextet cannot carry a full byte.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    LENIENT.decode(&cleaned).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input are kept as hard line breaks written with
/// `line_ending`. Longer lines get soft breaks.
#[must_use]
pub fn encode_quoted_printable(data: &[u8], line_ending: &str) -> String {
    let mut result = String::with_capacity(data.len());
    let mut lines = data.split(|b| *b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        encode_qp_line(line, line_ending, &mut result);
        if lines.peek().is_some() {
            result.push_str(line_ending);
        }
    }

    result
}

fn encode_qp_line(line: &[u8], line_ending: &str, out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let is_last = i + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Whitespace is only safe when something follows it on the line
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Keep room for the trailing '=' of a soft break.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push('=');
            out.push_str(line_ending);
            line_length = 0;
        }

        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Invalid escape sequences are kept literally instead of failing.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with transport padding before it
        let mut j = i + 1;
        while j < data.len() && (data[j] == b' ' || data[j] == b'\t') {
            j += 1;
        }
        if data[j..].starts_with(b"\r\n") {
            i = j + 2;
            continue;
        }
        if data[j..].starts_with(b"\n") {
            i = j + 1;
            continue;
        }

        // Hex encoded byte
        let hex = data
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        if let Some(decoded) = hex {
            result.push(decoded);
            i += 3;
        } else {
            result.push(b'=');
            i += 1;
        }
    }

    result
}

/// One decoded run of a header value.
///
/// `charset` is `None` for text that was not inside an encoded word (or whose
/// charset could not be resolved); such text must not be re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWord {
    /// Decoded text.
    pub text: String,
    /// Charset label of the encoded word(s) this text came from.
    pub charset: Option<String>,
}

impl EncodedWord {
    /// Creates a fragment of unencoded text.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charset: None,
        }
    }

    /// Creates a fragment tagged with a charset.
    #[must_use]
    pub fn encoded(text: impl Into<String>, charset: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charset: Some(charset.into()),
        }
    }
}

/// An encoded word located inside a header value.
struct RawWord<'a> {
    start: usize,
    end: usize,
    charset: &'a str,
    xfer: &'a str,
    content: &'a str,
}

/// Finds the next `=?charset?encoding?text?=` at or after `from`.
fn next_encoded_word(value: &str, from: usize) -> Option<RawWord<'_>> {
    let mut search = from;
    while let Some(offset) = value[search..].find("=?") {
        let start = search + offset;
        if let Some(word) = parse_encoded_word(value, start) {
            return Some(word);
        }
        search = start + 2;
    }
    None
}

fn parse_encoded_word(value: &str, start: usize) -> Option<RawWord<'_>> {
    let rest = &value[start + 2..];
    let (charset, rest) = rest.split_once('?')?;
    let (xfer, rest) = rest.split_once('?')?;
    let content = &rest[..rest.find("?=")?];

    if charset.is_empty()
        || charset.contains(char::is_whitespace)
        || !(xfer.eq_ignore_ascii_case("b") || xfer.eq_ignore_ascii_case("q"))
        || content.contains(|c: char| c.is_whitespace() || c == '?')
    {
        return None;
    }

    let end = start + "=?".len() + charset.len() + xfer.len() + content.len() + "???=".len();
    Some(RawWord {
        start,
        end,
        charset,
        xfer,
        content,
    })
}

/// Appends bytes, merging with the previous run when the charset matches.
fn push_run(runs: &mut Vec<(Vec<u8>, Option<String>)>, bytes: &[u8], charset: Option<String>) {
    match runs.last_mut() {
        Some((last, last_charset)) if *last_charset == charset => last.extend_from_slice(bytes),
        _ => runs.push((bytes.to_vec(), charset)),
    }
}

/// Splits a header value into decoded fragments (RFC 2047).
///
/// Whitespace between two adjacent encoded words is dropped, and adjacent
/// fragments with the same charset are merged before charset decoding so a
/// multi-byte character split across encoded words survives.
#[must_use]
pub fn decode_encoded_words(value: &str) -> Vec<EncodedWord> {
    let mut runs: Vec<(Vec<u8>, Option<String>)> = Vec::new();
    let mut last_end = 0;
    let mut last_was_encoded = false;

    while let Some(word) = next_encoded_word(value, last_end) {
        let gap = &value[last_end..word.start];
        if !gap.is_empty() && !(last_was_encoded && gap.chars().all(char::is_whitespace)) {
            push_run(&mut runs, gap.as_bytes(), None);
        }

        let decoded = if word.xfer.eq_ignore_ascii_case("b") {
            decode_base64(word.content.as_bytes()).ok()
        } else {
            // '_' stands for a space regardless of charset
            let spaced: Vec<u8> = word
                .content
                .bytes()
                .map(|b| if b == b'_' { b' ' } else { b })
                .collect();
            Some(decode_quoted_printable(&spaced))
        };

        match decoded {
            Some(bytes) => {
                let label = word.charset.split('*').next().unwrap_or_default();
                let charset = charset::is_known(label).then(|| label.to_lowercase());
                push_run(&mut runs, &bytes, charset);
            }
            // Undecodable words stay as they were written
            None => push_run(&mut runs, value[word.start..word.end].as_bytes(), None),
        }

        last_end = word.end;
        last_was_encoded = true;
    }

    if last_end < value.len() || runs.is_empty() {
        push_run(&mut runs, value[last_end..].as_bytes(), None);
    }

    runs.into_iter()
        .map(|(bytes, charset)| match charset {
            Some(label) => EncodedWord::encoded(charset::decode(&bytes, &label), label),
            None => EncodedWord::plain(String::from_utf8_lossy(&bytes)),
        })
        .collect()
}

/// Reassembles fragments into a header value (RFC 2047).
///
/// Charset-tagged fragments become B-encoded words in their own charset,
/// split so no encoded word exceeds 75 characters. `us-ascii` fragments that
/// are still ASCII are written as-is.
#[must_use]
pub fn encode_encoded_words(words: &[EncodedWord]) -> String {
    let mut result = String::new();
    let mut last_was_encoded = false;

    for word in words {
        if word.text.is_empty() {
            continue;
        }
        match word.charset.as_deref() {
            Some(label) if !(is_ascii_label(label) && word.text.is_ascii()) => {
                for chunk in chunk_for_encoding(&word.text, label) {
                    // Encoded words must be separated by whitespace
                    if last_was_encoded {
                        result.push(' ');
                    }
                    let _ = write!(result, "=?{label}?B?{}?=", encode_base64(&chunk));
                    last_was_encoded = true;
                }
            }
            _ => {
                result.push_str(&word.text);
                last_was_encoded = false;
            }
        }
    }

    result
}

fn is_ascii_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii")
}

/// Splits text into charset-encoded chunks small enough for one encoded word.
fn chunk_for_encoding(text: &str, label: &str) -> Vec<Vec<u8>> {
    let overhead = "=??B??=".len() + label.len();
    let max_bytes = (MAX_ENCODED_WORD_LENGTH.saturating_sub(overhead) / 4 * 3).max(3);

    let mut chunks = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        let bytes = charset::encode(ch.encode_utf8(&mut buf), label);
        if !current.is_empty() && current.len() + bytes.len() > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend(bytes);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_decode_tolerates_whitespace_and_missing_padding() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8s\r\nIFdvcmxkIQ").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_wrapped() {
        let data = vec![b'a'; 100];
        let encoded = encode_base64_wrapped(&data, "\r\n");
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!", "\n"), "Hello, World!");

        let encoded = encode_quoted_printable("Héllo".as_bytes(), "\n");
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        let encoded = encode_quoted_printable(b"one\r\ntwo \r\nthree", "\r\n");
        assert_eq!(encoded, "one\r\ntwo=20\r\nthree");
    }

    #[test]
    fn test_quoted_printable_soft_breaks_long_lines() {
        let line = "a".repeat(200);
        let encoded = encode_quoted_printable(line.as_bytes(), "\n");
        assert!(encoded.lines().all(|l| l.len() <= 76));
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), line.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_decode_invalid_escape_is_literal() {
        assert_eq!(decode_quoted_printable(b"a=ZZb="), b"a=ZZb=");
    }

    #[test]
    fn test_decode_plain_header() {
        let words = decode_encoded_words("Hello World");
        assert_eq!(words, vec![EncodedWord::plain("Hello World")]);
    }

    #[test]
    fn test_decode_rfc2047_examples() {
        let words = decode_encoded_words("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?= <keld@dkuug.dk>");
        assert_eq!(
            words,
            vec![
                EncodedWord::encoded("Keld Jørn Simonsen", "iso-8859-1"),
                EncodedWord::plain(" <keld@dkuug.dk>"),
            ]
        );
    }

    #[test]
    fn test_decode_drops_whitespace_between_encoded_words() {
        let words = decode_encoded_words("=?utf-8?B?SMOp?=  =?utf-8?Q?llo?=");
        assert_eq!(words, vec![EncodedWord::encoded("Héllo", "utf-8")]);
    }

    #[test]
    fn test_decode_merges_split_multibyte_character() {
        // "é" is C3 A9, split across two words
        let words = decode_encoded_words("=?utf-8?Q?caf=C3?= =?utf-8?Q?=A9?=");
        assert_eq!(words, vec![EncodedWord::encoded("café", "utf-8")]);
    }

    #[test]
    fn test_decode_unknown_charset_is_untagged() {
        let words = decode_encoded_words("=?x-unknown?Q?abc?=");
        assert_eq!(words, vec![EncodedWord::plain("abc")]);
    }

    #[test]
    fn test_encode_plain_and_ascii() {
        let words = vec![
            EncodedWord::plain("Re: "),
            EncodedWord::encoded("status", "us-ascii"),
        ];
        assert_eq!(encode_encoded_words(&words), "Re: status");
    }

    #[test]
    fn test_encode_splits_long_words() {
        let text = "é".repeat(60);
        let encoded = encode_encoded_words(&[EncodedWord::encoded(text.clone(), "utf-8")]);
        assert!(encoded.split(' ').all(|w| w.len() <= 75));
        assert_eq!(
            decode_encoded_words(&encoded),
            vec![EncodedWord::encoded(text, "utf-8")]
        );
    }

    #[test]
    fn test_encode_adjacent_charsets_are_separated() {
        let words = vec![
            EncodedWord::encoded("Jörg", "iso-8859-1"),
            EncodedWord::encoded("Łukasz", "utf-8"),
        ];
        let encoded = encode_encoded_words(&words);
        assert_eq!(decode_encoded_words(&encoded), words);
    }

    proptest! {
        #[test]
        fn prop_base64_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encoded = encode_base64_wrapped(&data, "\r\n");
            prop_assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), data);
        }

        #[test]
        fn prop_quoted_printable_roundtrip(text in "[^\r]{0,300}") {
            let encoded = encode_quoted_printable(text.as_bytes(), "\n");
            prop_assert_eq!(decode_quoted_printable(encoded.as_bytes()), text.as_bytes());
        }

        #[test]
        fn prop_encoded_word_roundtrip(text in "\\PC{1,120}") {
            let words = vec![EncodedWord::encoded(text, "utf-8")];
            let encoded = encode_encoded_words(&words);
            prop_assert_eq!(decode_encoded_words(&encoded), words);
        }
    }
}
