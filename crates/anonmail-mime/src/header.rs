//! MIME header handling.
//!
//! Fields keep their original text, folding included, so a header block that
//! is never touched serializes back to exactly what was parsed.

use crate::encoding::{EncodedWord, decode_encoded_words, encode_encoded_words};
use std::fmt;

/// Column after which [`Headers::set`] folds long values.
const FOLD_WIDTH: usize = 78;

/// A single header field as it appeared in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderField {
    /// Field name, empty for lines that are not `name: value` fields.
    name: String,
    /// Full field text, continuation lines joined with `\n`.
    raw: String,
}

impl HeaderField {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            raw: fold(name, value),
        }
    }

    fn matches(&self, name: &str) -> bool {
        !self.name.is_empty() && self.name.eq_ignore_ascii_case(name)
    }

    /// Unfolded, trimmed value.
    fn value(&self) -> String {
        let value = self.raw.split_once(':').map_or("", |(_, v)| v);
        value.replace(['\r', '\n'], "").trim().to_string()
    }
}

/// Folds `name: value` at whitespace so lines stay near [`FOLD_WIDTH`].
///
/// Unfolding the result yields the original value.
fn fold(name: &str, value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    let mut raw = format!("{name}:");
    let mut line_length = raw.len();

    for (i, word) in value.split(' ').enumerate() {
        if i > 0 && line_length + 1 + word.len() > FOLD_WIDTH {
            raw.push('\n');
            line_length = 0;
        }
        raw.push(' ');
        raw.push_str(word);
        line_length += 1 + word.len();
    }

    raw
}

/// Ordered collection of email headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no header lines at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: &str, value: &str) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// Sets a header value.
    ///
    /// The first existing field is replaced in place and any further fields
    /// with the same name are removed. Absent fields are appended.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter().position(|f| f.matches(name)) {
            Some(index) => {
                self.fields[index] = HeaderField::new(name, value);
                let mut seen = 0;
                self.fields.retain(|f| {
                    if f.matches(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.add(name, value),
        }
    }

    /// Rewrites every value of a header in place.
    ///
    /// `f` receives the unfolded value; fields whose value comes back
    /// unchanged keep their original formatting. Returns the number of fields
    /// that changed.
    pub fn update_all(&mut self, name: &str, mut f: impl FnMut(&str) -> String) -> usize {
        let mut changed = 0;
        for field in self.fields.iter_mut().filter(|f| f.matches(name)) {
            let value = field.value();
            let updated = f(&value);
            if updated != value {
                *field = HeaderField::new(&field.name, &updated);
                changed += 1;
            }
        }
        changed
    }

    /// Gets the first value for a header, unfolded and trimmed.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.matches(name))
            .map(HeaderField::value)
    }

    /// Gets all values for a header, in message order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.matches(name))
            .map(HeaderField::value)
            .collect()
    }

    /// Returns `true` if at least one field has this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.matches(name))
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.matches(name));
    }

    /// Returns an iterator over `(name, value)` pairs of real fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| (f.name.as_str(), f.value()))
    }

    /// Parses a raw header block.
    ///
    /// Continuation lines (starting with space or tab) belong to the field
    /// above them. Lines that are not `name: value` fields are kept verbatim
    /// and never match a lookup.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let is_continuation = line.starts_with(' ') || line.starts_with('\t');

            match headers.fields.last_mut() {
                Some(field) if is_continuation => {
                    field.raw.push('\n');
                    field.raw.push_str(line);
                }
                _ if line.is_empty() => {}
                _ => {
                    let name = line
                        .split_once(':')
                        .map(|(name, _)| name.trim())
                        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
                        .unwrap_or_default();
                    headers.fields.push(HeaderField {
                        name: name.to_string(),
                        raw: line.to_string(),
                    });
                }
            }
        }

        headers
    }

    /// Writes the header block, every line terminated by `line_ending`.
    pub fn write_to(&self, out: &mut Vec<u8>, line_ending: &str) {
        for field in &self.fields {
            for line in field.raw.split('\n') {
                out.extend_from_slice(line.as_bytes());
                out.extend_from_slice(line_ending.as_bytes());
            }
        }
    }

    /// Splits a header value into RFC 2047 fragments.
    #[must_use]
    pub fn decode_value(value: &str) -> Vec<EncodedWord> {
        decode_encoded_words(value)
    }

    /// Reassembles RFC 2047 fragments into a header value.
    #[must_use]
    pub fn encode_value(words: &[EncodedWord]) -> String {
        encode_encoded_words(words)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            writeln!(f, "{}", field.raw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type").as_deref(), Some("text/plain"));
        assert_eq!(headers.get("content-type").as_deref(), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("Subject", "Hi");
        headers.add("To", "bob@example.com");

        headers.set("To", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["To", "Subject"]);
    }

    #[test]
    fn test_headers_set_appends_when_absent() {
        let mut headers = Headers::new();
        headers.set("From", "anon@example.com");
        assert_eq!(headers.get("from").as_deref(), Some("anon@example.com"));
    }

    #[test]
    fn test_headers_update_all() {
        let text = "To: a@x.tld\nTo: b@y.tld\nX-Keep:  untouched\n";
        let mut headers = Headers::parse(text);
        let changed = headers.update_all("to", |v| v.replace("x.tld", "z.tld"));
        assert_eq!(changed, 1);
        assert_eq!(headers.get_all("To"), vec!["a@z.tld", "b@y.tld"]);

        let mut out = Vec::new();
        headers.write_to(&mut out, "\n");
        assert_eq!(out, b"To: a@z.tld\nTo: b@y.tld\nX-Keep:  untouched\n");
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("DKIM-Signature", "v=1");
        headers.add("DKIM-Signature", "v=1");
        headers.remove("dkim-signature");
        assert!(!headers.contains("DKIM-Signature"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From").as_deref(), Some("sender@example.com"));
        assert_eq!(headers.get("To").as_deref(), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject").as_deref(), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type").as_deref(),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_roundtrip_is_exact() {
        let text = "From nobody Mon Jan  1 00:00:00 2024\r\nReceived: from a\r\n\tby b;\r\nX-A:b\r\n";
        let headers = Headers::parse(text);
        let mut out = Vec::new();
        headers.write_to(&mut out, "\r\n");
        assert_eq!(out, text.as_bytes());
        assert_eq!(headers.get("received").as_deref(), Some("from a\tby b;"));
        assert_eq!(headers.get("from"), None);
    }

    #[test]
    fn test_long_values_are_folded() {
        let mut headers = Headers::new();
        let value = "word ".repeat(40);
        headers.set("Subject", value.trim_end());

        let mut out = Vec::new();
        headers.write_to(&mut out, "\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().all(|l| l.len() <= 78));
        assert_eq!(headers.get("Subject").unwrap(), value.trim_end());
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        let s = headers.to_string();
        assert!(s.contains("From: sender@example.com"));
        assert!(s.contains("To: recipient@example.com"));
    }
}
