//! Message anonymization.
//!
//! One run takes a parsed message and its recipient hint, derives the
//! tokens, rewrites text parts and headers, and returns the final bytes.
//! Nothing outlives the run: matchers are built for its token set and
//! dropped with it.

use crate::codec;
use crate::config::AnonymizerConfig;
use crate::error::{Error, Result};
use crate::header::{anonymize_decoded_headers, mask_custom_headers, strip_signatures};
use crate::mask::{Masked, Masker};
use crate::message::{MailMessage, MailPart};
use crate::recipients::resolve_recipients;
use crate::tokens::TokenSet;
use crate::url::UrlAnonymizer;
use anonmail_mime::charset::{self, DEFAULT_CHARSET};
use tracing::{debug, info, warn};

/// Counts describing what a run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Recipient fields found.
    pub recipients: usize,
    /// Tokens derived from them.
    pub tokens: usize,
    /// Text parts processed.
    pub parts: usize,
    /// Token matches masked in text parts.
    pub body_matches: usize,
    /// Token matches masked in headers, decoded and raw.
    pub header_matches: usize,
    /// Header fields masked wholesale.
    pub custom_headers: usize,
    /// URLs whose query was rewritten.
    pub urls: usize,
    /// Whether signature headers were removed.
    pub signatures_stripped: bool,
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anonymized {
    /// The rewritten message.
    pub bytes: Vec<u8>,
    /// What changed.
    pub report: Report,
}

/// Rewrites messages according to a configuration.
#[derive(Debug, Clone, Default)]
pub struct Anonymizer {
    config: AnonymizerConfig,
}

impl Anonymizer {
    /// Creates an anonymizer after validating its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: AnonymizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AnonymizerConfig {
        &self.config
    }

    /// Anonymizes a message in place and returns its final bytes.
    ///
    /// `hint` lists recipients known from outside the message, such as the
    /// envelope recipient. The message is left partially rewritten when an
    /// error is returned; callers should fall back to their own copy of the
    /// original.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyMessage`] if there is nothing to anonymize
    /// - [`Error::NoRecipientResolved`] if no recipient can be found
    /// - [`Error::UnsupportedTransferEncoding`] if a text part cannot be
    ///   encoded back
    /// - [`Error::HeaderBoundaryNotFound`] if the message has no body
    ///   separator
    pub fn anonymize<M>(&self, message: &mut M, hint: Option<&[String]>) -> Result<Anonymized>
    where
        M: MailMessage + ?Sized,
    {
        let result = self.run(message, hint);
        if let Err(e) = &result {
            warn!(error = %e, "anonymization aborted");
        }
        result
    }

    fn run<M>(&self, message: &mut M, hint: Option<&[String]>) -> Result<Anonymized>
    where
        M: MailMessage + ?Sized,
    {
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let recipients = resolve_recipients(message, hint)?;
        let tokens = TokenSet::from_recipients(&recipients);
        let masker = Masker::new(&tokens, self.config.mask_char)?;
        let urls = UrlAnonymizer::new(self.config.mask_char)?;
        let mut report = Report {
            recipients: recipients.len(),
            tokens: tokens.len(),
            ..Report::default()
        };
        debug!(
            recipients = report.recipients,
            tokens = report.tokens,
            "derived tokens"
        );

        message.for_each_leaf_mut(&mut |part: &mut M::Part| {
            Self::anonymize_part(part, &masker, &urls, &mut report)
        })?;

        report.custom_headers = mask_custom_headers(message, &self.config.custom_headers, &masker);
        report.header_matches +=
            anonymize_decoded_headers(message, &self.config.decoded_headers, &masker);

        if self.config.strip_dkim {
            report.signatures_stripped = strip_signatures(message);
        }
        if let Some(sender) = &self.config.sender {
            message.set_header("From", sender);
        }

        let bytes = Self::anonymize_header_block(message, &masker, &urls, &mut report)?;

        info!(
            parts = report.parts,
            body_matches = report.body_matches,
            header_matches = report.header_matches,
            urls = report.urls,
            "message anonymized"
        );
        Ok(Anonymized { bytes, report })
    }

    /// Masks one leaf part; non-text parts are skipped.
    fn anonymize_part<P>(
        part: &mut P,
        masker: &Masker,
        urls: &UrlAnonymizer,
        report: &mut Report,
    ) -> Result<()>
    where
        P: MailPart + ?Sized,
    {
        if part.is_multipart() || part.main_type() != "text" {
            return Ok(());
        }

        let original = codec::decode_part(part)?;
        let masked = masker.mask(&original);
        let sub_type = part.sub_type();
        let rewritten = match sub_type.as_str() {
            "plain" => urls.anonymize_text(&masked.text),
            "html" => urls.anonymize_html(&masked.text),
            _ => Masked::unchanged(masked.text),
        };

        // Always encode: an unusable transfer encoding fails the run even
        // when the text is unchanged.
        let payload = codec::encode_part(part, &rewritten.text)?;
        if rewritten.text != original {
            part.set_payload(payload);
        }

        report.parts += 1;
        report.body_matches += masked.count;
        report.urls += rewritten.count;
        debug!(
            sub_type = %sub_type,
            matches = masked.count,
            urls = rewritten.count,
            "anonymized text part"
        );
        Ok(())
    }

    /// Masks the serialized header block.
    ///
    /// This catches whatever the header-level passes missed, such as tokens
    /// in unlisted headers. The block is read as the UTF-8 it was written in
    /// and, when masked, written back in the message charset if that charset
    /// is ASCII-compatible, UTF-8 otherwise. The body bytes are spliced back
    /// untouched.
    fn anonymize_header_block<M>(
        message: &M,
        masker: &Masker,
        urls: &UrlAnonymizer,
        report: &mut Report,
    ) -> Result<Vec<u8>>
    where
        M: MailMessage + ?Sized,
    {
        let (header, rest) = message.raw_sections()?;
        let label = message
            .charset()
            .filter(|label| charset::is_ascii_compatible(label))
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());

        let text = String::from_utf8_lossy(&header).into_owned();
        let with_urls = urls.anonymize_text(&text);
        let masked = masker.mask(&with_urls.text);
        report.urls += with_urls.count;
        report.header_matches += masked.count;

        let mut bytes = if masked.text == text {
            header
        } else {
            charset::encode(&masked.text, &label)
        };
        bytes.extend_from_slice(&rest);
        Ok(bytes)
    }
}

/// Parses raw bytes and anonymizes them with `config`.
///
/// # Errors
///
/// Returns the errors of [`Anonymizer::new`] and [`Anonymizer::anonymize`].
pub fn anonymize_bytes(
    raw: &[u8],
    config: &AnonymizerConfig,
    hint: Option<&[String]>,
) -> Result<Anonymized> {
    let anonymizer = Anonymizer::new(config.clone())?;
    let mut message = anonmail_mime::Message::parse(raw);
    anonymizer.anonymize(&mut message, hint)
}
