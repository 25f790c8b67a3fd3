//! Anonymizer configuration.
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! mask_char = "x"
//! custom_headers = ["X-Mailer-RecptId"]
//! decoded_headers = ["To", "Cc", "Subject"]
//! strip_dkim = true
//! sender = "anonymous@example.org"
//! ```

use crate::error::{Error, Result};
use crate::mask::DEFAULT_MASK_CHAR;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to rewrite and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnonymizerConfig {
    /// Character written over masked word characters.
    pub mask_char: char,
    /// Headers masked wholesale, whatever their content.
    pub custom_headers: Vec<String>,
    /// Headers whose RFC 2047 fragments are token-masked.
    pub decoded_headers: Vec<String>,
    /// Remove DKIM and DomainKey signatures.
    pub strip_dkim: bool,
    /// Address written over the From header.
    pub sender: Option<String>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            mask_char: DEFAULT_MASK_CHAR,
            custom_headers: vec!["X-Mailer-RecptId".to_string()],
            decoded_headers: ["To", "Cc", "Subject"].map(String::from).to_vec(),
            strip_dkim: false,
            sender: None,
        }
    }
}

impl AnonymizerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML is malformed or invalid.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read configuration file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks the values make sense together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.mask_char.is_whitespace() || self.mask_char.is_control() {
            return Err(Error::Config(format!(
                "mask_char must be a visible character, got {:?}",
                self.mask_char
            )));
        }
        if let Some(sender) = self.sender.as_ref().filter(|s| !s.contains('@')) {
            return Err(Error::Config(format!(
                "sender must be an email address, got {sender:?}"
            )));
        }
        if let Some(name) = self
            .custom_headers
            .iter()
            .chain(&self.decoded_headers)
            .find(|name| name.is_empty() || name.contains(|c: char| c == ':' || c.is_whitespace()))
        {
            return Err(Error::Config(format!("invalid header name {name:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AnonymizerConfig::default();
        assert_eq!(config.mask_char, 'x');
        assert_eq!(config.custom_headers, vec!["X-Mailer-RecptId"]);
        assert_eq!(config.decoded_headers, vec!["To", "Cc", "Subject"]);
        assert!(!config.strip_dkim);
        assert!(config.sender.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnonymizerConfig::from_toml_str("strip_dkim = true\nmask_char = \"*\"\n").unwrap();
        assert!(config.strip_dkim);
        assert_eq!(config.mask_char, '*');
        assert_eq!(config.decoded_headers, vec!["To", "Cc", "Subject"]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = AnonymizerConfig::from_toml_str("mask = \"x\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation() {
        let invalid = [
            AnonymizerConfig {
                mask_char: ' ',
                ..Default::default()
            },
            AnonymizerConfig {
                mask_char: '\n',
                ..Default::default()
            },
            AnonymizerConfig {
                sender: Some("nobody".to_string()),
                ..Default::default()
            },
            AnonymizerConfig {
                custom_headers: vec!["X Bad".to_string()],
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{config:?}");
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sender = \"anon@example.org\"").unwrap();
        writeln!(file, "custom_headers = [\"X-Mailer-RecptId\", \"X-Customer\"]").unwrap();

        let config = AnonymizerConfig::load(file.path()).unwrap();
        assert_eq!(config.sender.as_deref(), Some("anon@example.org"));
        assert_eq!(config.custom_headers.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AnonymizerConfig::load("/nonexistent/anonmail.toml").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Failed to read")));
    }
}
