//! Tracing setup (spec §6 Environment / file layout): a console layer
//! matching the teacher's `fmt().pretty()` style plus a size-rotated file
//! layer, since no crate in the stack provides rotation by size.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const MAX_ARCHIVES: u32 = 3;

/// A [`std::io::Write`] sink that rotates `path` once it crosses
/// [`ROTATE_AT_BYTES`], keeping up to [`MAX_ARCHIVES`] numbered archives
/// (`my-unicorn.log.1` is the newest archive, `.3` the oldest).
pub struct RotatingWriter {
    path: PathBuf,
    file: File,
    size: u64,
}

impl RotatingWriter {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self { path, file, size })
    }

    fn rotate(&mut self) -> io::Result<()> {
        for i in (1..MAX_ARCHIVES).rev() {
            let from = self.archive_path(i);
            let to = self.archive_path(i + 1);
            if from.exists() {
                fs::rename(&from, &to)?;
            }
        }
        fs::rename(&self.path, self.archive_path(1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.size = 0;
        Ok(())
    }

    fn archive_path(&self, n: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size >= ROTATE_AT_BYTES {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Wraps a [`RotatingWriter`] behind a mutex so it satisfies
/// `tracing_appender::non_blocking`'s `MakeWriter` bound across threads.
#[derive(Clone)]
struct SharedRotatingWriter(std::sync::Arc<Mutex<RotatingWriter>>);

impl SharedRotatingWriter {
    fn new(writer: RotatingWriter) -> Self {
        Self(std::sync::Arc::new(Mutex::new(writer)))
    }
}

impl io::Write for SharedRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log writer poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("log writer poisoned").flush()
    }
}

/// Initializes the global tracing subscriber: a pretty console layer honoring
/// `console_log_level`/`DEBUG`/`NO_COLOR`, and a file layer honoring
/// `log_level`, writing to `log_path` through a [`RotatingWriter`].
///
/// Returns the [`tracing_appender::non_blocking::WorkerGuard`] that must be
/// kept alive for the process lifetime, or log lines past the guard's drop
/// are lost.
pub fn init(log_path: &Path, log_level: &str, console_log_level: &str) -> io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let writer = SharedRotatingWriter::new(RotatingWriter::new(log_path)?);
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let console_filter = if std::env::var_os("DEBUG").is_some() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_log_level))
    };

    let ansi = std::env::var_os("NO_COLOR").is_none();

    let console_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(ansi)
        .with_writer(io::stderr)
        .with_filter(console_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new(log_level));

    tracing_subscriber::registry().with(console_layer).with(file_layer).init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rotates_once_threshold_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::new(&path).unwrap();
        writer.size = ROTATE_AT_BYTES;
        writer.write_all(b"overflow").unwrap();

        assert!(writer.archive_path(1).exists());
        assert!(path.exists());
    }

    #[test]
    fn keeps_at_most_configured_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut writer = RotatingWriter::new(&path).unwrap();

        for _ in 0..(MAX_ARCHIVES + 2) {
            writer.size = ROTATE_AT_BYTES;
            writer.write_all(b"x").unwrap();
        }

        assert!(writer.archive_path(MAX_ARCHIVES).exists());
        assert!(!writer.archive_path(MAX_ARCHIVES + 1).exists());
    }

    #[test]
    fn creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        RotatingWriter::new(&path).unwrap();
        assert!(path.exists());
    }
}
