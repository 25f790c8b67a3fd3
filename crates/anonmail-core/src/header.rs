//! Header rewriting.
//!
//! Recipient-like headers are decoded into their RFC 2047 fragments, each
//! fragment is masked, and the value is encoded again with the same charset
//! tags. Custom identifying headers are masked wholesale.

use crate::mask::{Masked, Masker};
use crate::message::MailMessage;
use anonmail_mime::EncodedWord;
use anonmail_mime::encoding::{decode_encoded_words, encode_encoded_words};
use tracing::debug;

/// Masks the tokens inside a possibly RFC 2047 encoded header value.
///
/// The result decodes, under the original charset tags, to the masked text.
/// A value without tokens comes back unchanged.
#[must_use]
pub fn anonymize_encoded_value(value: &str, masker: &Masker) -> Masked {
    let mut count = 0;
    let words: Vec<EncodedWord> = decode_encoded_words(value)
        .into_iter()
        .map(|word| {
            let masked = masker.mask(&word.text);
            count += masked.count;
            EncodedWord {
                text: masked.text,
                charset: word.charset,
            }
        })
        .collect();

    if count == 0 {
        return Masked::unchanged(value.to_string());
    }
    Masked {
        text: encode_encoded_words(&words),
        count,
    }
}

/// Runs [`anonymize_encoded_value`] over every value of the named headers.
///
/// Absent headers are left alone. Returns the number of token matches.
pub fn anonymize_decoded_headers<M>(message: &mut M, names: &[String], masker: &Masker) -> usize
where
    M: MailMessage + ?Sized,
{
    let mut count = 0;
    for name in names {
        let changed = message.update_header(name, &mut |value| {
            let masked = anonymize_encoded_value(value, masker);
            count += masked.count;
            masked.text
        });
        if changed > 0 {
            debug!(header = %name, fields = changed, "masked decoded header");
        }
    }
    count
}

/// Masks every word character of the named headers, whatever their content.
///
/// Returns the number of fields rewritten.
pub fn mask_custom_headers<M>(message: &mut M, names: &[String], masker: &Masker) -> usize
where
    M: MailMessage + ?Sized,
{
    let mut count = 0;
    for name in names {
        let changed = message.update_header(name, &mut |value| masker.mask_all(value));
        if changed > 0 {
            debug!(header = %name, fields = changed, "masked custom header");
        }
        count += changed;
    }
    count
}

/// Header names carrying message signatures.
pub const SIGNATURE_HEADERS: [&str; 2] = ["DKIM-Signature", "DomainKey-Signature"];

/// Removes signature headers that no longer match the rewritten message.
///
/// Returns `true` if any was present.
pub fn strip_signatures<M: MailMessage + ?Sized>(message: &mut M) -> bool {
    let mut found = false;
    for name in SIGNATURE_HEADERS {
        if message.has_header(name) {
            message.remove_header(name);
            found = true;
        }
    }
    found
}
