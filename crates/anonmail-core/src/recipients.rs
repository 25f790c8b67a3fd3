//! Working out who a message was sent to.

use crate::error::{Error, Result};
use crate::message::MailMessage;
use crate::tokens::clean_token;
use anonmail_mime::encoding::decode_encoded_words;
use regex::RegexBuilder;

/// Headers naming the recipients directly.
const RECIPIENT_HEADERS: [&str; 2] = ["To", "Cc"];

/// Trace header whose `for <addr>;` clause names the envelope recipient.
const TRACE_HEADER: &str = "Received";

/// The `for <addr>;` clause of a trace header.
const TRACE_RECIPIENT_PATTERN: &str = r"for ([^;]+);";

/// Collects the recipient fields of a message.
///
/// To and Cc values are used when the first one contains an address. The
/// override `hint` is added when given; otherwise the `for` clauses of the
/// `Received` headers are. Header values are RFC 2047 decoded and each
/// decoded fragment is cleaned of brackets, quotes and whitespace.
///
/// # Errors
///
/// Returns [`Error::NoRecipientResolved`] when nothing was found, and a
/// pattern error if the trace matcher cannot be built.
pub fn resolve_recipients<M>(message: &M, hint: Option<&[String]>) -> Result<Vec<String>>
where
    M: MailMessage + ?Sized,
{
    let mut recipients = Vec::new();

    for name in RECIPIENT_HEADERS {
        let values = message.header_all(name);
        if values.first().is_some_and(|first| first.contains('@')) {
            recipients.extend(values.iter().flat_map(|value| decoded_fragments(value)));
        }
    }

    match hint {
        Some(hint) => recipients.extend(
            hint.iter()
                .map(|addr| clean_token(addr).to_string())
                .filter(|addr| !addr.is_empty()),
        ),
        None => {
            let trace = RegexBuilder::new(TRACE_RECIPIENT_PATTERN)
                .case_insensitive(true)
                .build()?;
            for value in message.header_all(TRACE_HEADER) {
                recipients.extend(
                    trace
                        .captures_iter(&value)
                        .map(|caps| clean_token(&caps[1]).to_string())
                        .filter(|addr| !addr.is_empty()),
                );
            }
        }
    }

    if recipients.is_empty() {
        return Err(Error::NoRecipientResolved);
    }
    Ok(recipients)
}

fn decoded_fragments(value: &str) -> Vec<String> {
    decode_encoded_words(value)
        .into_iter()
        .map(|word| clean_token(&word.text).to_string())
        .filter(|fragment| !fragment.is_empty())
        .collect()
}
