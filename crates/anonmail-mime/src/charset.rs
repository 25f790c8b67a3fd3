//! Charset conversion between raw bytes and text.
//!
//! Conversion is always lossy: malformed input never fails, it is replaced.
//! Labels that `encoding_rs` does not know are treated as UTF-8.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// Default charset when a message declares none.
pub const DEFAULT_CHARSET: &str = "utf-8";

fn lookup(label: &str) -> Option<&'static Encoding> {
    // RFC 2231 allows a language suffix on the charset ("utf-8*en").
    let label = label.split('*').next().unwrap_or(label).trim();
    Encoding::for_label_no_replacement(label.as_bytes())
}

/// Returns `true` if `label` names a charset this crate can convert.
#[must_use]
pub fn is_known(label: &str) -> bool {
    lookup(label).is_some()
}

/// Returns `true` if ASCII text has the same bytes in the charset named by
/// `label`. Unknown labels count as UTF-8.
#[must_use]
pub fn is_ascii_compatible(label: &str) -> bool {
    lookup(label).unwrap_or(UTF_8).is_ascii_compatible()
}

/// Decodes `bytes` in the charset named by `label`.
///
/// Malformed sequences become U+FFFD.
#[must_use]
pub fn decode(bytes: &[u8], label: &str) -> String {
    let encoding = lookup(label).unwrap_or(UTF_8);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encodes `text` in the charset named by `label`.
///
/// Characters the charset cannot represent are written as numeric character
/// references, which is what `encoding_rs` does for legacy encodings.
/// UTF-16 is written as code units here: `encoding_rs` only encodes to
/// UTF-8 for it.
#[must_use]
pub fn encode(text: &str, label: &str) -> Vec<u8> {
    let encoding = lookup(label).unwrap_or(UTF_8);
    if encoding == UTF_16LE {
        return text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    }
    if encoding == UTF_16BE {
        return text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    }
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode(b"Andr\xe9", "iso-8859-1"), "André");
    }

    #[test]
    fn test_decode_invalid_utf8_is_replaced() {
        assert_eq!(decode(b"ok\xff", "utf-8"), "ok\u{fffd}");
    }

    #[test]
    fn test_unknown_label_falls_back_to_utf8() {
        assert!(!is_known("x-made-up"));
        assert_eq!(decode("héllo".as_bytes(), "x-made-up"), "héllo");
        assert_eq!(encode("héllo", "x-made-up"), "héllo".as_bytes());
    }

    #[test]
    fn test_language_suffix_is_ignored() {
        assert!(is_known("UTF-8*en"));
    }

    #[test]
    fn test_encode_utf16_keeps_declared_byte_order() {
        let le = encode("Hé\n", "utf-16le");
        assert_eq!(le, [b'H', 0, 0xE9, 0, b'\n', 0]);
        assert_eq!(decode(&le, "UTF-16LE"), "Hé\n");

        let be = encode("Hé\n", "utf-16be");
        assert_eq!(be, [0, b'H', 0, 0xE9, 0, b'\n']);
        assert_eq!(decode(&be, "utf-16be"), "Hé\n");

        assert_eq!(decode(&encode("😀", "utf-16le"), "utf-16le"), "😀");
    }

    #[test]
    fn test_ascii_compatibility() {
        assert!(is_ascii_compatible("iso-8859-1"));
        assert!(is_ascii_compatible("x-made-up"));
        assert!(!is_ascii_compatible("utf-16le"));
        assert!(!is_ascii_compatible("UTF-16BE"));
    }

    #[test]
    fn test_encode_roundtrip_latin1() {
        let bytes = encode("Jörg", "ISO-8859-1");
        assert_eq!(bytes, b"J\xf6rg");
        assert_eq!(decode(&bytes, "ISO-8859-1"), "Jörg");
    }
}
