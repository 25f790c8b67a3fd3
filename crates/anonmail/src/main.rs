//! `anonmail` - anonymize one email message
//!
//! Reads a message from a file or standard input, masks everything that
//! identifies its recipients and hands the result to the configured sinks.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod sink;

use anonmail_core::{Anonymized, AnonymizerConfig, anonymize_bytes};
use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use sink::{FileSink, MailSink, StdoutSink};

/// One anonymized message in this many is also sampled.
const SAMPLE_ODDS: u32 = 11;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "anonmail failed");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout may carry the message.
fn init_tracing(level: Option<&str>) {
    let filter = level.map_or_else(
        || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anonmail=info,anonmail_core=info".into())
        },
        |level| format!("anonmail={level},anonmail_core={level}").into(),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

/// Returns whether the message was anonymized.
fn run(cli: &Cli) -> Result<bool> {
    let raw = read_input(cli)?;
    let (sinks, sampling) = build_sinks(cli);

    match anonymize(cli, &raw) {
        Ok(anonymized) => {
            info!(
                bytes = anonymized.bytes.len(),
                tokens = anonymized.report.tokens,
                "delivering anonymized message"
            );
            if sampling && rand::thread_rng().gen_range(0..SAMPLE_ODDS) == 0 {
                for sink in &sinks {
                    sink.send_sample(&anonymized.bytes)?;
                }
            }
            for sink in &sinks {
                sink.send_success(&anonymized.bytes)?;
            }
            Ok(true)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "message not anonymized");
            for sink in &sinks {
                sink.send_error(&raw)?;
            }
            Ok(false)
        }
    }
}

fn anonymize(cli: &Cli, raw: &[u8]) -> Result<Anonymized> {
    let mut config = match &cli.config {
        Some(path) => AnonymizerConfig::load(path)?,
        None => AnonymizerConfig::default(),
    };
    cli.apply(&mut config);
    Ok(anonymize_bytes(raw, &config, cli.orig_to.as_deref())?)
}

fn read_input(cli: &Cli) -> Result<Vec<u8>> {
    match &cli.infile {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut raw = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut raw)
                .context("Failed to read standard input")?;
            Ok(raw)
        }
    }
}

/// Standard output is used unless a destination directory was given.
fn build_sinks(cli: &Cli) -> (Vec<Box<dyn MailSink>>, bool) {
    let mut sinks: Vec<Box<dyn MailSink>> = Vec::new();
    if cli.dest_dir.is_none() {
        sinks.push(Box::new(StdoutSink));
    }
    let mut sampling = false;
    if cli.writes_files() {
        let files = FileSink::new(
            cli.dest_dir.clone(),
            cli.error_dir.clone(),
            cli.sample_dir.clone(),
        );
        sampling = files.samples();
        sinks.push(Box::new(files));
    }
    (sinks, sampling)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::Path;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("anonmail").chain(args.iter().copied())).unwrap()
    }

    fn only_file(dir: &Path) -> Vec<u8> {
        let files: Vec<_> = fs::read_dir(dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        fs::read(files[0].as_ref().unwrap().path()).unwrap()
    }

    #[test]
    fn test_run_writes_anonymized_message() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.eml");
        let dest = dir.path().join("dest");
        fs::write(&input, "To: jane@corp.tld\n\nHi Jane\n").unwrap();

        let cli = cli(&[
            "-i",
            input.to_str().unwrap(),
            "--dest-dir",
            dest.to_str().unwrap(),
        ]);
        assert!(run(&cli).unwrap());
        assert_eq!(only_file(&dest), b"To: xxxx@xxxx.xxx\n\nHi xxxx\n");
    }

    #[test]
    fn test_run_routes_failures_to_error_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.eml");
        let dest = dir.path().join("dest");
        let errors = dir.path().join("errors");
        let raw = "Subject: no recipient\n\nHi Jane\n";
        fs::write(&input, raw).unwrap();

        let cli = cli(&[
            "-i",
            input.to_str().unwrap(),
            "--dest-dir",
            dest.to_str().unwrap(),
            "--error-dir",
            errors.to_str().unwrap(),
        ]);
        assert!(!run(&cli).unwrap());
        assert_eq!(only_file(&errors), raw.as_bytes());
        assert!(!dest.exists());
    }

    #[test]
    fn test_run_applies_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.eml");
        let config = dir.path().join("anonmail.toml");
        let dest = dir.path().join("dest");
        fs::write(&input, "To: jane@corp.tld\n\nHi Jane\n").unwrap();
        fs::write(&config, "mask_char = \"*\"\n").unwrap();

        let cli = cli(&[
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "--dest-dir",
            dest.to_str().unwrap(),
        ]);
        assert!(run(&cli).unwrap());
        assert_eq!(only_file(&dest), b"To: ****@****.***\n\nHi ****\n");
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let cli = cli(&["-i", "/nonexistent/in.eml"]);
        assert!(run(&cli).is_err());
    }

    #[test]
    fn test_sinks_follow_directories() {
        let (sinks, sampling) = build_sinks(&cli(&[]));
        assert_eq!(sinks.len(), 1);
        assert!(!sampling);

        let (sinks, sampling) = build_sinks(&cli(&["--dest-dir", "/tmp/a", "--sample-dir", "/tmp/b"]));
        assert_eq!(sinks.len(), 1);
        assert!(sampling);

        let (sinks, _) = build_sinks(&cli(&["--error-dir", "/tmp/a"]));
        assert_eq!(sinks.len(), 2);
    }
}
