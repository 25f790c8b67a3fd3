//! Where finished messages go.
//!
//! A run hands every outcome to each configured sink: the anonymized
//! message on success, an occasional sample copy, and the untouched
//! original when anonymization failed.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for processed messages.
pub trait MailSink {
    /// Delivers an anonymized message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be written.
    fn send_success(&self, message: &[u8]) -> Result<()>;

    /// Delivers the original of a message that could not be anonymized.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be written.
    fn send_error(&self, original: &[u8]) -> Result<()>;

    /// Delivers a sampled copy of an anonymized message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be written.
    fn send_sample(&self, message: &[u8]) -> Result<()>;
}

/// Writes messages as `.eml` files, one directory per outcome.
///
/// Outcomes without a directory are skipped.
#[derive(Debug, Clone, Default)]
pub struct FileSink {
    dest_dir: Option<PathBuf>,
    error_dir: Option<PathBuf>,
    sample_dir: Option<PathBuf>,
}

impl FileSink {
    /// Creates a sink writing into the given directories.
    #[must_use]
    pub const fn new(
        dest_dir: Option<PathBuf>,
        error_dir: Option<PathBuf>,
        sample_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            dest_dir,
            error_dir,
            sample_dir,
        }
    }

    /// Whether sampled copies have somewhere to go.
    #[must_use]
    pub const fn samples(&self) -> bool {
        self.sample_dir.is_some()
    }

    fn write(dir: Option<&Path>, kind: &str, message: &[u8]) -> Result<()> {
        let Some(dir) = dir else {
            debug!(kind, "no directory configured, message skipped");
            return Ok(());
        };
        let path = write_eml(dir, message)?;
        debug!(kind, path = %path.display(), "message written");
        Ok(())
    }
}

impl MailSink for FileSink {
    fn send_success(&self, message: &[u8]) -> Result<()> {
        Self::write(self.dest_dir.as_deref(), "success", message)
    }

    fn send_error(&self, original: &[u8]) -> Result<()> {
        Self::write(self.error_dir.as_deref(), "error", original)
    }

    fn send_sample(&self, message: &[u8]) -> Result<()> {
        Self::write(self.sample_dir.as_deref(), "sample", message)
    }
}

/// Writes `message` to a new timestamped file in `dir`.
fn write_eml(dir: &Path, message: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S%.6f");
    let path = dir.join(format!("{stamp}-{:08x}.eml", rand::random::<u32>()));
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(message)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes anonymized messages to standard output.
///
/// Failures only get a one-line summary on standard error so the original
/// never leaks into the output stream. Samples are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl MailSink for StdoutSink {
    fn send_success(&self, message: &[u8]) -> Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(message)?;
        out.flush()?;
        Ok(())
    }

    fn send_error(&self, original: &[u8]) -> Result<()> {
        writeln!(
            io::stderr(),
            "anonmail: message of {} bytes could not be anonymized",
            original.len()
        )?;
        Ok(())
    }

    fn send_sample(&self, _message: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_file_sink_writes_each_outcome() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("dest");
        let error = root.path().join("error");
        let sample = root.path().join("sample");
        let sink = FileSink::new(Some(dest.clone()), Some(error.clone()), Some(sample.clone()));

        sink.send_success(b"anonymized").unwrap();
        sink.send_error(b"original").unwrap();
        sink.send_sample(b"sampled").unwrap();

        for (dir, content) in [
            (&dest, "anonymized"),
            (&error, "original"),
            (&sample, "sampled"),
        ] {
            let files = files_in(dir);
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].extension().unwrap(), "eml");
            assert_eq!(fs::read_to_string(&files[0]).unwrap(), content);
        }
    }

    #[test]
    fn test_file_sink_keeps_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(Some(dir.path().to_path_buf()), None, None);
        for _ in 0..5 {
            sink.send_success(b"m").unwrap();
        }
        assert_eq!(files_in(dir.path()).len(), 5);
    }

    #[test]
    fn test_file_sink_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(Some(dir.path().to_path_buf()), None, None);
        assert!(!sink.samples());
        sink.send_error(b"original").unwrap();
        sink.send_sample(b"sampled").unwrap();
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn test_file_sink_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let sink = FileSink::new(Some(blocker.join("dest")), None, None);
        assert!(sink.send_success(b"m").is_err());
    }
}
