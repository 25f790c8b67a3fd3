//! Masking of URL query values in plain text and HTML.
//!
//! Every query value is masked, whether or not it contains a token; keys,
//! paths and everything around the URL stay exactly as they were.

use crate::error::Result;
use crate::mask::{Masked, mask_word_chars};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::{Captures, Regex};
use std::fmt;
use std::ops::Range;

/// URLs in running text: the classic `http[s]://` character class, plus `~`
/// and `#`, minus the `<`/`>` that usually delimit a URL.
const URL_PATTERN: &str = r"https?://[A-Za-z0-9$%\&'()*+,\-./:;=?@\[\\\]^_!\~\#]+";

/// Start of an anchor tag with attributes.
const ANCHOR_PATTERN: &str = r"(?i)<a\s";

/// Trailing characters taken as sentence punctuation rather than URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\''];

/// Characters left as-is in form-encoded values, besides alphanumerics.
const FORM_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A URL split into its components, borrowing from the original string.
///
/// Displaying an unmodified `ParsedUrl` gives back the original bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedUrl<'a> {
    /// Scheme without the `:`.
    pub scheme: Option<&'a str>,
    /// Authority without the leading `//`.
    pub authority: Option<&'a str>,
    /// Path, possibly empty.
    pub path: &'a str,
    /// Query without the `?`.
    pub query: Option<&'a str>,
    /// Fragment without the `#`.
    pub fragment: Option<&'a str>,
}

impl<'a> ParsedUrl<'a> {
    /// Splits a URL. Never fails; unrecognised pieces end up in the path.
    #[must_use]
    pub fn parse(url: &'a str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (url, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (scheme, rest) = match rest.split_once(':') {
            Some((scheme, rest)) if is_scheme(scheme) => (Some(scheme), rest),
            _ => (None, rest),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(rest) => {
                let end = rest.find('/').unwrap_or(rest.len());
                (Some(&rest[..end]), &rest[end..])
            }
            None => (None, rest),
        };

        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for ParsedUrl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = self.scheme {
            write!(f, "{scheme}:")?;
        }
        if let Some(authority) = self.authority {
            write!(f, "//{authority}")?;
        }
        f.write_str(self.path)?;
        if let Some(query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn form_decode(value: &str) -> String {
    percent_decode_str(&value.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn form_encode(value: &str) -> String {
    value
        .split(' ')
        .map(|chunk| utf8_percent_encode(chunk, FORM_VALUE).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Query pairs in order; the value is `None` when a pair has no `=`.
pub fn query_pairs(query: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    query.split('&').map(|pair| match pair.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (pair, None),
    })
}

/// Masks every non-empty value of a query string, keys untouched.
#[must_use]
pub fn mask_query(query: &str, mask: char) -> String {
    query_pairs(query)
        .map(|pair| match pair {
            (key, Some(value)) if !value.is_empty() => {
                format!("{key}={}", form_encode(&mask_word_chars(&form_decode(value), mask)))
            }
            (key, Some(_)) => format!("{key}="),
            (key, None) => key.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Splits sentence punctuation off the end of a URL found in running text.
///
/// A closing parenthesis goes too when the URL has no opening one left to
/// match it.
fn split_trailing_punctuation(url: &str) -> (&str, &str) {
    let mut end = url.len();
    loop {
        let head = &url[..end];
        let Some(last) = head.chars().next_back() else {
            break;
        };
        let unbalanced = last == ')' && head.matches(')').count() > head.matches('(').count();
        if TRAILING_PUNCTUATION.contains(&last) || unbalanced {
            end -= last.len_utf8();
        } else {
            break;
        }
    }
    url.split_at(end)
}

/// One attribute of a start tag, as byte ranges into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
    name: Range<usize>,
    /// Value range, without quotes, and the quote used.
    value: Option<(Range<usize>, Option<char>)>,
}

/// Reads the attributes of the start tag whose name ends at `start`.
///
/// Quoted values may contain `>`. Returns the attributes and the position
/// just past the closing `>`, or the end of the document when the tag is
/// never closed.
fn scan_attributes(html: &str, start: usize) -> (Vec<Attribute>, usize) {
    let bytes = html.as_bytes();
    let skip_space = |mut pos: usize| {
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        pos
    };

    let mut attributes = Vec::new();
    let mut pos = start;
    loop {
        while bytes
            .get(pos)
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'/')
        {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return (attributes, bytes.len()),
            Some(b'>') => return (attributes, pos + 1),
            Some(_) => {}
        }

        let name_start = pos;
        while bytes
            .get(pos)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(*b, b'=' | b'>' | b'/'))
        {
            pos += 1;
        }
        if pos == name_start {
            // A stray `=`
            pos += 1;
            continue;
        }
        let name = name_start..pos;

        let after_name = skip_space(pos);
        if bytes.get(after_name) != Some(&b'=') {
            attributes.push(Attribute { name, value: None });
            pos = after_name;
            continue;
        }

        pos = skip_space(after_name + 1);
        let value = match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = pos + 1;
                let value_end = bytes[value_start..]
                    .iter()
                    .position(|b| *b == quote)
                    .map_or(bytes.len(), |offset| value_start + offset);
                pos = (value_end + 1).min(bytes.len());
                (value_start..value_end, Some(char::from(quote)))
            }
            _ => {
                let value_start = pos;
                while bytes
                    .get(pos)
                    .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                {
                    pos += 1;
                }
                (value_start..pos, None)
            }
        };
        attributes.push(Attribute {
            name,
            value: Some(value),
        });
    }
}

/// Decodes the character references found in attribute values.
fn unescape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|end| *end <= 8)
            .and_then(|end| decode_reference(&rest[1..=end]).map(|c| (c, end + 2)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Escapes what cannot appear literally inside the attribute value.
fn escape_html(value: &str, quote: Option<char>, escape_amp: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' if escape_amp => out.push_str("&amp;"),
            '"' if quote == Some('"') => out.push_str("&quot;"),
            '\'' if quote == Some('\'') => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Masks query values of the URLs of one message.
#[derive(Debug, Clone)]
pub struct UrlAnonymizer {
    mask: char,
    url_pattern: Regex,
    anchor_pattern: Regex,
}

impl UrlAnonymizer {
    /// Compiles the URL matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new(mask: char) -> Result<Self> {
        Ok(Self {
            mask,
            url_pattern: Regex::new(URL_PATTERN)?,
            anchor_pattern: Regex::new(ANCHOR_PATTERN)?,
        })
    }

    /// Masks the query values of one URL.
    ///
    /// Returns `None` when there is nothing to change, including URLs with
    /// an empty or missing query.
    #[must_use]
    pub fn anonymize_url(&self, url: &str) -> Option<String> {
        let parsed = ParsedUrl::parse(url);
        let query = parsed.query.filter(|query| !query.is_empty())?;
        let masked = mask_query(query, self.mask);
        (masked != query).then(|| {
            ParsedUrl {
                query: Some(&masked),
                ..parsed
            }
            .to_string()
        })
    }

    /// Masks query values of every URL found in plain text.
    ///
    /// Punctuation ending a sentence right after a URL is not part of it.
    #[must_use]
    pub fn anonymize_text(&self, text: &str) -> Masked {
        let mut count = 0;
        let text = self
            .url_pattern
            .replace_all(text, |caps: &Captures<'_>| {
                let (url, trailing) = split_trailing_punctuation(&caps[0]);
                self.anonymize_url(url).map_or_else(
                    || caps[0].to_string(),
                    |rewritten| {
                        count += 1;
                        format!("{rewritten}{trailing}")
                    },
                )
            })
            .into_owned();

        Masked { text, count }
    }

    /// Masks query values of the `href` of every `<a>` tag in an HTML document.
    ///
    /// Only the attribute value changes; the rest of the document is kept
    /// byte for byte.
    #[must_use]
    pub fn anonymize_html(&self, html: &str) -> Masked {
        let mut text = String::with_capacity(html.len());
        let mut count = 0;
        let mut copied = 0;
        let mut pos = 0;

        while let Some(anchor) = self.anchor_pattern.find_at(html, pos) {
            let (attributes, end) = scan_attributes(html, anchor.start() + 2);
            pos = end;

            let href = attributes
                .into_iter()
                .find(|attribute| html[attribute.name.clone()].eq_ignore_ascii_case("href"));
            let Some((range, quote)) = href.and_then(|attribute| attribute.value) else {
                continue;
            };
            if let Some(rewritten) = self.rewrite_href(&html[range.clone()], quote) {
                text.push_str(&html[copied..range.start]);
                text.push_str(&rewritten);
                copied = range.end;
                count += 1;
            }
        }
        text.push_str(&html[copied..]);

        Masked { text, count }
    }

    /// Returns the escaped replacement for an attribute value, if it changes.
    fn rewrite_href(&self, value: &str, quote: Option<char>) -> Option<String> {
        let rewritten = self.anonymize_url(&unescape_html(value))?;
        Some(escape_html(&rewritten, quote, value.contains("&amp;")))
    }
}
