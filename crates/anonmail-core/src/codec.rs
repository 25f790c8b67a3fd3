//! Decoding text parts to strings and encoding them back.

use crate::error::{Error, Result};
use crate::message::MailPart;
use anonmail_mime::TransferEncoding;
use anonmail_mime::charset;
use anonmail_mime::encoding::{encode_base64_wrapped, encode_quoted_printable};

/// Decodes a text part's payload to a string.
///
/// A part without a charset is taken as already decoded text. Otherwise the
/// transfer encoding is removed and the bytes are decoded with the declared
/// charset, undecodable sequences becoming U+FFFD.
///
/// # Errors
///
/// Returns an error if the transfer encoding cannot be removed.
pub fn decode_part<P: MailPart + ?Sized>(part: &P) -> Result<String> {
    match part.charset() {
        None => Ok(String::from_utf8_lossy(&part.raw_payload()).into_owned()),
        Some(label) => Ok(charset::decode(&part.decoded_payload()?, &label)),
    }
}

/// Applies a Content-Transfer-Encoding to bytes.
///
/// No label, `7bit`, `8bit` and `binary` leave the bytes as they are.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTransferEncoding`] for any other label.
pub fn apply_transfer_encoding(
    bytes: Vec<u8>,
    label: Option<&str>,
    line_ending: &str,
) -> Result<Vec<u8>> {
    let Some(label) = label else {
        return Ok(bytes);
    };

    let encoding = TransferEncoding::parse(label);
    if encoding.is_identity() {
        return Ok(bytes);
    }
    match encoding {
        TransferEncoding::Base64 => Ok(encode_base64_wrapped(&bytes, line_ending).into_bytes()),
        TransferEncoding::QuotedPrintable => {
            Ok(encode_quoted_printable(&bytes, line_ending).into_bytes())
        }
        other => Err(Error::UnsupportedTransferEncoding(other.to_string())),
    }
}

/// Encodes text into the payload representation of `part`.
///
/// Parts with a charset get their text encoded in that charset and then
/// transfer-encoded; parts without one get the text bytes back unchanged.
/// A trailing line break of a base64 or quoted-printable payload is kept;
/// identity encodings carry it in the text itself.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTransferEncoding`] when the part's transfer
/// encoding cannot be re-applied.
pub fn encode_part<P: MailPart + ?Sized>(part: &P, text: &str) -> Result<Vec<u8>> {
    let Some(label) = part.charset() else {
        return Ok(text.as_bytes().to_vec());
    };

    let line_ending = part.line_ending();
    let transfer_encoding = part.transfer_encoding();
    let mut payload = apply_transfer_encoding(
        charset::encode(text, &label),
        transfer_encoding.as_deref(),
        line_ending,
    )?;

    let wrapped =
        transfer_encoding.is_some_and(|label| !TransferEncoding::parse(&label).is_identity());
    if wrapped && part.raw_payload().ends_with(b"\n") && !payload.ends_with(b"\n") {
        payload.extend_from_slice(line_ending.as_bytes());
    }

    Ok(payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anonmail_mime::Message;
    use anonmail_mime::encoding::{decode_base64, decode_quoted_printable};
    use proptest::prelude::*;

    fn first_leaf(raw: &[u8]) -> anonmail_mime::Part {
        Message::parse(raw).root().clone()
    }

    #[test]
    fn test_decode_without_charset_keeps_raw_payload() {
        let part = first_leaf(b"Content-Transfer-Encoding: base64\n\nSGVsbG8=\n");
        assert_eq!(decode_part(&part).unwrap(), "SGVsbG8=\n");
    }

    #[test]
    fn test_decode_with_charset() {
        let part = first_leaf(
            b"Content-Type: text/plain; charset=iso-8859-1\nContent-Transfer-Encoding: quoted-printable\n\nJ=FCrgen\n",
        );
        assert_eq!(decode_part(&part).unwrap(), "Jürgen\n");
    }

    #[test]
    fn test_decode_tolerates_bad_bytes() {
        let part = first_leaf(b"Content-Type: text/plain; charset=utf-8\n\nab\xFFcd");
        assert_eq!(decode_part(&part).unwrap(), "ab\u{FFFD}cd");
    }

    #[test]
    fn test_identity_encodings() {
        for label in [None, Some("7bit"), Some("8BIT"), Some("binary")] {
            assert_eq!(apply_transfer_encoding(b"a\nb".to_vec(), label, "\n").unwrap(), b"a\nb");
        }
    }

    #[test]
    fn test_unsupported_encoding() {
        let err = apply_transfer_encoding(b"a".to_vec(), Some("x-uuencode"), "\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransferEncoding(label) if label == "x-uuencode"));
    }

    #[test]
    fn test_encode_part_base64_keeps_trailing_newline() {
        let part = first_leaf(
            b"Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: base64\r\n\r\nSGVsbG8=\r\n",
        );
        let payload = encode_part(&part, "Héllo").unwrap();
        assert!(payload.ends_with(b"\r\n"));
        assert_eq!(decode_base64(&payload).unwrap(), "Héllo".as_bytes());
    }

    #[test]
    fn test_encode_part_in_declared_charset() {
        let part = first_leaf(b"Content-Type: text/plain; charset=iso-8859-1\n\nx\n");
        assert_eq!(encode_part(&part, "Jürgen\n").unwrap(), b"J\xFCrgen\n");
    }

    #[test]
    fn test_encode_part_utf16() {
        let raw = concat!(
            "Content-Type: text/plain; charset=utf-16le\n",
            "Content-Transfer-Encoding: base64\n",
            "\n",
            "SABlAGwAbABvACAASgBhAG4AZQA=\n",
        );
        let mut part = first_leaf(raw.as_bytes());
        assert_eq!(decode_part(&part).unwrap(), "Hello Jane");

        let payload = encode_part(&part, "Hello xxxx").unwrap();
        assert!(payload.ends_with(b"\n"));
        assert_eq!(decode_base64(&payload).unwrap()[..4], [b'H', 0, b'e', 0]);
        part.set_body(payload);
        assert_eq!(decode_part(&part).unwrap(), "Hello xxxx");
    }

    #[test]
    fn test_encode_part_utf16_binary_adds_no_stray_byte() {
        let mut raw = b"Content-Type: text/plain; charset=utf-16be\nContent-Transfer-Encoding: binary\n\n".to_vec();
        raw.extend([0, b'J', 0, b'o', 0, b'\n']);
        let part = first_leaf(&raw);
        let text = decode_part(&part).unwrap();
        assert_eq!(text, "Jo\n");

        let payload = encode_part(&part, "Jo").unwrap();
        assert_eq!(payload, [0, b'J', 0, b'o']);
    }

    #[test]
    fn test_encode_part_without_charset() {
        let part = first_leaf(b"Content-Transfer-Encoding: x-weird\n\nabc\n");
        assert_eq!(encode_part(&part, "xxx\n").unwrap(), b"xxx\n");
    }

    #[test]
    fn test_encode_part_unsupported() {
        let part = first_leaf(
            b"Content-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: x-uuencode\n\nabc\n",
        );
        assert!(matches!(
            encode_part(&part, "abc\n"),
            Err(Error::UnsupportedTransferEncoding(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_base64_roundtrip(text in "\\PC{0,300}") {
            let encoded = apply_transfer_encoding(text.clone().into_bytes(), Some("base64"), "\r\n").unwrap();
            prop_assert_eq!(decode_base64(&encoded).unwrap(), text.into_bytes());
        }

        #[test]
        fn prop_quoted_printable_roundtrip(text in "[^\r]{0,300}") {
            let encoded = apply_transfer_encoding(text.clone().into_bytes(), Some("quoted-printable"), "\n").unwrap();
            prop_assert_eq!(decode_quoted_printable(&encoded), text.into_bytes());
        }

        #[test]
        fn prop_latin1_roundtrip(text in "[ -~\u{a0}-\u{ff}]{0,200}") {
            let part = first_leaf(b"Content-Type: text/plain; charset=iso-8859-1\nContent-Transfer-Encoding: quoted-printable\n\n");
            let payload = encode_part(&part, &text).unwrap();
            let mut decoded = part.clone();
            decoded.set_body(payload);
            prop_assert_eq!(decode_part(&decoded).unwrap(), text);
        }
    }
}
