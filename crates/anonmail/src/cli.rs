//! Command-line arguments.

use anonmail_core::AnonymizerConfig;
use clap::Parser;
use std::path::PathBuf;

/// anonmail - strip recipient identity from email messages
#[derive(Parser, Debug)]
#[command(name = "anonmail")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Message to read (eml format); standard input when omitted
    #[arg(short, long)]
    pub infile: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "ANONMAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Envelope recipients, used instead of the Received headers
    #[arg(long = "orig-to", value_name = "ADDR", num_args = 1..)]
    pub orig_to: Option<Vec<String>>,

    /// Sender address written with --anonymize-sender
    #[arg(long = "from", value_name = "ADDR")]
    pub from_addr: Option<String>,

    /// Replace the From header with the --from address
    #[arg(short = 's', long, requires = "from_addr")]
    pub anonymize_sender: bool,

    /// Remove DKIM and DomainKey signatures
    #[arg(long)]
    pub no_dkim: bool,

    /// Directory receiving anonymized messages; standard output when omitted
    #[arg(long, value_name = "DIR")]
    pub dest_dir: Option<PathBuf>,

    /// Directory receiving the original of messages that failed
    #[arg(long, value_name = "DIR")]
    pub error_dir: Option<PathBuf>,

    /// Directory receiving a random sample of anonymized messages
    #[arg(long, value_name = "DIR")]
    pub sample_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ANONMAIL_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Applies the command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut AnonymizerConfig) {
        if self.no_dkim {
            config.strip_dkim = true;
        }
        if self.anonymize_sender {
            config.sender.clone_from(&self.from_addr);
        }
    }

    /// Whether any output directory was given.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.dest_dir.is_some() || self.error_dir.is_some() || self.sample_dir.is_some()
    }
}
