//! Message capabilities the anonymizer works against.
//!
//! The anonymizer never touches a parser type directly. Anything that can
//! look up and rewrite headers, visit leaf parts and serialize itself can be
//! anonymized; [`anonmail_mime::Message`] is the implementation used by the
//! command-line tool.

use crate::error::{Error, Result};
use anonmail_mime::split_header_block;

/// A message whose headers and leaf parts can be rewritten.
pub trait MailMessage {
    /// The leaf part type handed out by [`MailMessage::for_each_leaf_mut`].
    type Part: MailPart;

    /// Returns `true` if the message has neither headers nor body.
    fn is_empty(&self) -> bool;

    /// First value of a header, unfolded.
    fn header(&self, name: &str) -> Option<String>;

    /// Every value of a header, in message order.
    fn header_all(&self, name: &str) -> Vec<String>;

    /// Returns `true` if the header is present.
    fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Replaces the header with a single value, adding it when absent.
    fn set_header(&mut self, name: &str, value: &str);

    /// Rewrites every value of a header in place, returning how many changed.
    fn update_header(&mut self, name: &str, f: &mut dyn FnMut(&str) -> String) -> usize;

    /// Removes every value of a header.
    fn remove_header(&mut self, name: &str);

    /// Calls `f` on every leaf part, depth-first, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    fn for_each_leaf_mut(&mut self, f: &mut dyn FnMut(&mut Self::Part) -> Result<()>)
    -> Result<()>;

    /// Charset of the message as a whole, if any part declares one.
    fn charset(&self) -> Option<String>;

    /// Serialized message split into the raw header block and the rest.
    ///
    /// The header block is UTF-8. The rest starts at the blank line that
    /// ends the headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderBoundaryNotFound`] when there is no blank line.
    fn raw_sections(&self) -> Result<(Vec<u8>, Vec<u8>)>;
}

/// A leaf part whose payload can be replaced.
pub trait MailPart {
    /// Main content type, lower-cased (`text` for `text/plain`).
    fn main_type(&self) -> String;

    /// Content subtype, lower-cased (`plain` for `text/plain`).
    fn sub_type(&self) -> String;

    /// Returns `true` if the part holds child parts.
    fn is_multipart(&self) -> bool;

    /// Declared charset, lower-cased.
    fn charset(&self) -> Option<String>;

    /// Declared Content-Transfer-Encoding label, as written.
    fn transfer_encoding(&self) -> Option<String>;

    /// Payload bytes, still transfer-encoded.
    fn raw_payload(&self) -> Vec<u8>;

    /// Payload bytes with the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    fn decoded_payload(&self) -> Result<Vec<u8>>;

    /// Replaces the payload with already transfer-encoded bytes.
    fn set_payload(&mut self, payload: Vec<u8>);

    /// Line break used when the payload is re-encoded.
    fn line_ending(&self) -> &'static str;
}

impl MailMessage for anonmail_mime::Message {
    type Part = anonmail_mime::Part;

    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers().get(name)
    }

    fn header_all(&self, name: &str) -> Vec<String> {
        self.headers().get_all(name)
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers().contains(name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers_mut().set(name, value);
    }

    fn update_header(&mut self, name: &str, f: &mut dyn FnMut(&str) -> String) -> usize {
        self.headers_mut().update_all(name, f)
    }

    fn remove_header(&mut self, name: &str) {
        self.headers_mut().remove(name);
    }

    fn for_each_leaf_mut(
        &mut self,
        f: &mut dyn FnMut(&mut Self::Part) -> Result<()>,
    ) -> Result<()> {
        self.root_mut().for_each_leaf_mut(&mut |part| f(part))
    }

    fn charset(&self) -> Option<String> {
        Self::charset(self)
    }

    fn raw_sections(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let bytes = self.to_bytes();
        split_header_block(&bytes)
            .map(|(header, rest)| (header.to_vec(), rest.to_vec()))
            .ok_or(Error::HeaderBoundaryNotFound)
    }
}

impl MailPart for anonmail_mime::Part {
    fn main_type(&self) -> String {
        self.content_type().main_type
    }

    fn sub_type(&self) -> String {
        self.content_type().sub_type
    }

    fn is_multipart(&self) -> bool {
        Self::is_multipart(self)
    }

    fn charset(&self) -> Option<String> {
        Self::charset(self)
    }

    fn transfer_encoding(&self) -> Option<String> {
        self.headers.get("content-transfer-encoding")
    }

    fn raw_payload(&self) -> Vec<u8> {
        self.body().map(<[u8]>::to_vec).unwrap_or_default()
    }

    fn decoded_payload(&self) -> Result<Vec<u8>> {
        Ok(self.decode_body()?)
    }

    fn set_payload(&mut self, payload: Vec<u8>) {
        self.set_body(payload);
    }

    fn line_ending(&self) -> &'static str {
        Self::line_ending(self).as_str()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anonmail_mime::Message;

    const RAW: &[u8] = b"To: a@b.tld\r\nTo: c@d.tld\r\nContent-Type: text/plain; charset=ISO-8859-1\r\nContent-Transfer-Encoding: Base64\r\n\r\nSGVsbG8=\r\n";

    #[test]
    fn test_message_headers() {
        let mut message = Message::parse(RAW);
        assert!(!MailMessage::is_empty(&message));
        assert_eq!(message.header("to").as_deref(), Some("a@b.tld"));
        assert_eq!(message.header_all("To"), vec!["a@b.tld", "c@d.tld"]);

        let changed = message.update_header("to", &mut |v| v.to_uppercase());
        assert_eq!(changed, 2);
        assert_eq!(message.header_all("To"), vec!["A@B.TLD", "C@D.TLD"]);

        message.set_header("To", "x@y.tld");
        assert_eq!(message.header_all("To"), vec!["x@y.tld"]);

        message.remove_header("to");
        assert!(!message.has_header("To"));
    }

    #[test]
    fn test_part_accessors() {
        let mut message = Message::parse(RAW);
        let mut seen = 0;
        MailMessage::for_each_leaf_mut(&mut message, &mut |part: &mut anonmail_mime::Part| {
            seen += 1;
            assert_eq!(part.main_type(), "text");
            assert_eq!(part.sub_type(), "plain");
            assert_eq!(MailPart::charset(part).as_deref(), Some("iso-8859-1"));
            assert_eq!(MailPart::transfer_encoding(part).as_deref(), Some("Base64"));
            assert_eq!(part.raw_payload(), b"SGVsbG8=\r\n");
            assert_eq!(part.decoded_payload().unwrap(), b"Hello");
            assert_eq!(MailPart::line_ending(part), "\r\n");
            part.set_payload(b"SGk=\r\n".to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, 1);
        assert!(message.to_bytes().ends_with(b"\r\n\r\nSGk=\r\n"));
    }

    #[test]
    fn test_raw_sections() {
        let message = Message::parse(b"To: a@b.tld\n\nbody\n");
        let (header, rest) = message.raw_sections().unwrap();
        assert_eq!(header, b"To: a@b.tld\n");
        assert_eq!(rest, b"\nbody\n");

        let message = Message::parse(b"To: a@b.tld\n");
        assert!(matches!(
            message.raw_sections(),
            Err(Error::HeaderBoundaryNotFound)
        ));
    }
}
