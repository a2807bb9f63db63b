//! Tracing setup for the bridge process.
//!
//! Logs go to stderr by default. With a log file configured:
//! 1. Logs of earlier runs are shifted aside (`bridge.log` → `.1` → `.2` →
//!    `.3`, keep 3).
//! 2. A fresh file is opened behind a writer that flushes every line.
//! 3. A startup banner records version, pid, and log path.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "toolbridge=info,warn";

/// Rotated copies kept next to the active log file.
const KEEP_ROTATED: u32 = 3;

/// Where and how to write logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub file: Option<PathBuf>,
    pub json: bool,
}

/// Install the global tracing subscriber.
pub fn init_tracing(options: &LogOptions) -> anyhow::Result<()> {
    let (writer, rotated) = match &options.file {
        Some(path) => {
            let (file, rotated) = open_log_file(path)?;
            (BoxMakeWriter::new(file), rotated)
        }
        None => (BoxMakeWriter::new(std::io::stderr), 0),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(options.file.is_none())
        .with_target(true)
        .with_thread_ids(false);

    let installed = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        log_file = %options
            .file
            .as_deref()
            .map_or_else(|| "<stderr>".to_string(), |p| p.display().to_string()),
        rotated,
        "=== toolbridge starting ==="
    );
    Ok(())
}

/// Shift earlier runs aside, then open `path` for appending. Also returns
/// how many rotated files were moved.
fn open_log_file(path: &Path) -> anyhow::Result<(LineFlushedFile, usize)> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }

    let shifted = rotate_previous_logs(path, KEEP_ROTATED);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    Ok((LineFlushedFile::new(file), shifted))
}

/// `<active>.<generation>`, e.g. `bridge.log.2`.
fn rotated_path(active: &Path, generation: u32) -> PathBuf {
    let mut name = active.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

/// Keep the logs of the last `keep` bridge runs: the active file becomes
/// generation 1, older generations move up by one, and whatever would land
/// past `keep` is deleted. Missing generations are skipped.
///
/// Returns how many files were moved. Rotation never fails startup; a file
/// that cannot be moved is left where it is.
pub fn rotate_previous_logs(active: &Path, keep: u32) -> usize {
    if keep == 0 {
        return 0;
    }
    let _ = std::fs::remove_file(rotated_path(active, keep));

    let mut shifted = 0;
    for generation in (1..keep).rev() {
        if std::fs::rename(rotated_path(active, generation), rotated_path(active, generation + 1)).is_ok() {
            shifted += 1;
        }
    }
    if std::fs::rename(active, rotated_path(active, 1)).is_ok() {
        shifted += 1;
    }
    shifted
}

/// Log file handle that flushes every write.
///
/// The bridge is usually started by an MCP host and killed without warning
/// when the host exits, so buffered lines would be lost exactly when they
/// are needed to explain a failed tool call.
#[derive(Clone)]
pub struct LineFlushedFile {
    file: Arc<Mutex<File>>,
}

impl LineFlushedFile {
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> std::io::Result<T>) -> std::io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("bridge log file lock poisoned"))?;
        op(&mut file)
    }
}

impl Write for LineFlushedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_file(|file| {
            let written = file.write(buf)?;
            file.flush()?;
            Ok(written)
        })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> MakeWriter<'a> for LineFlushedFile {
    type Writer = LineFlushedFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
