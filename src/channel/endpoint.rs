//! Platform endpoints behind a channel name.
//!
//! On Windows the canonical name is a named pipe and is opened as-is. On
//! Unix the same name maps onto a Unix-domain socket under a socket
//! directory, so a target process (or a test double) can listen there.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use super::errors::ChannelError;
use super::naming::DEFAULT_CHANNEL_PREFIX;

/// Byte stream carrying one exchange.
pub trait ChannelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ChannelStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Delay between attempts to open a busy pipe.
#[cfg_attr(not(windows), allow(dead_code))]
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Map a channel name to the Unix socket path a target listens on.
///
/// Absolute paths are used verbatim. Otherwise the pipe prefix is
/// stripped, separators become `_`, and `.sock` is appended.
pub fn socket_path(socket_dir: &Path, channel: &str) -> PathBuf {
    if channel.starts_with('/') {
        return PathBuf::from(channel);
    }

    let stem = channel
        .strip_prefix(DEFAULT_CHANNEL_PREFIX)
        .unwrap_or(channel)
        .trim_start_matches(['\\', '/'])
        .replace(['\\', '/'], "_");

    socket_dir.join(format!("{stem}.sock"))
}

/// Whether an OS error means "nobody is there" rather than a failure
/// of a live peer.
fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable
    )
}

/// Open a stream to `channel`.
///
/// A missing endpoint fails at once with `Unavailable`. `deadline` only
/// bounds the busy-pipe retry on Windows.
#[cfg(unix)]
pub async fn connect(
    channel: &str,
    socket_dir: &Path,
    _deadline: Instant,
) -> Result<Box<dyn ChannelStream>, ChannelError> {
    let path = socket_path(socket_dir, channel);
    match tokio::net::UnixStream::connect(&path).await {
        Ok(stream) => Ok(Box::new(stream)),
        Err(e) if is_absent(&e) => Err(ChannelError::unavailable(
            channel,
            format!("no listener at {}: {e}", path.display()),
        )),
        Err(e) => Err(ChannelError::disconnected(
            channel,
            format!("failed to connect to {}: {e}", path.display()),
        )),
    }
}

/// Open a stream to `channel`.
///
/// A missing pipe fails at once with `Unavailable`. A busy pipe (all
/// server instances taken) is retried until `deadline`.
#[cfg(windows)]
pub async fn connect(
    channel: &str,
    _socket_dir: &Path,
    deadline: Instant,
) -> Result<Box<dyn ChannelStream>, ChannelError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    const ERROR_PIPE_BUSY: i32 = 231;

    loop {
        match ClientOptions::new().open(channel) {
            Ok(client) => return Ok(Box::new(client)),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                if Instant::now() + BUSY_RETRY_DELAY >= deadline {
                    return Err(ChannelError::Timeout {
                        channel: channel.to_string(),
                        method: "<connect>".to_string(),
                        timeout_ms: 0,
                    });
                }
                tokio::time::sleep(BUSY_RETRY_DELAY).await;
            }
            Err(e) if is_absent(&e) => {
                return Err(ChannelError::unavailable(channel, format!("pipe not found: {e}")))
            }
            Err(e) => {
                return Err(ChannelError::disconnected(
                    channel,
                    format!("failed to open pipe: {e}"),
                ))
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
