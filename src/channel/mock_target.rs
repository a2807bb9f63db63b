//! Scripted stand-in for a target process, used by tests.
//!
//! Listens on the Unix socket a channel name maps to, reads one request
//! per connection, and answers with whatever the responder returns.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

use super::codec::{self, DEFAULT_MAX_FRAME_BYTES};
use super::endpoint::socket_path;
use super::types::{ChannelRequest, ChannelResponse};

/// What the mock sends back for one request.
pub enum MockReply {
    /// Reply with a result after an optional delay.
    Result { delay: Duration, value: Value },
    /// Reply with a structured error.
    Error { code: i64, message: String },
    /// Write these bytes verbatim, then close.
    Raw(Vec<u8>),
    /// Close without replying.
    Close,
}

impl MockReply {
    pub fn result(value: Value) -> Self {
        Self::Result {
            delay: Duration::ZERO,
            value,
        }
    }

    pub fn delayed(delay: Duration, value: Value) -> Self {
        Self::Result { delay, value }
    }

    pub fn error(code: i64, message: &str) -> Self {
        Self::Error {
            code,
            message: message.to_string(),
        }
    }
}

type Responder = dyn Fn(&ChannelRequest) -> MockReply + Send + Sync;

/// A running mock target. Stops when dropped.
pub struct MockTarget {
    dir: TempDir,
    accept_task: JoinHandle<()>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl MockTarget {
    /// Start listening on `channel` inside a fresh temp directory.
    pub fn start<F>(channel: &str, responder: F) -> Self
    where
        F: Fn(&ChannelRequest) -> MockReply + Send + Sync + 'static,
    {
        let dir = TempDir::new().unwrap();
        let path = socket_path(dir.path(), channel);
        let listener = UnixListener::bind(&path).unwrap();

        let responder: Arc<Responder> = Arc::new(responder);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));

        let accept_task = {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            let served = served.clone();
            let channel = channel.to_string();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let responder = responder.clone();
                    let in_flight = in_flight.clone();
                    let max_in_flight = max_in_flight.clone();
                    let served = served.clone();
                    let channel = channel.clone();
                    tokio::spawn(async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);

                        let mut stream = BufReader::new(stream);
                        let request = match codec::read_frame(&mut stream, &channel, DEFAULT_MAX_FRAME_BYTES).await {
                            Ok(raw) => match codec::decode_request(&channel, &raw) {
                                Ok(request) => request,
                                Err(_) => {
                                    in_flight.fetch_sub(1, Ordering::SeqCst);
                                    return;
                                }
                            },
                            Err(_) => {
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                return;
                            }
                        };

                        let reply = responder(&request);
                        let bytes = match reply {
                            MockReply::Result { delay, value } => {
                                if !delay.is_zero() {
                                    tokio::time::sleep(delay).await;
                                }
                                codec::encode_response(
                                    &channel,
                                    &ChannelResponse::result(request.id.clone(), value),
                                )
                                .ok()
                            }
                            MockReply::Error { code, message } => codec::encode_response(
                                &channel,
                                &ChannelResponse::error(request.id.clone(), code, message),
                            )
                            .ok(),
                            MockReply::Raw(bytes) => Some(bytes),
                            MockReply::Close => None,
                        };

                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        served.fetch_add(1, Ordering::SeqCst);

                        if let Some(bytes) = bytes {
                            let _ = stream.get_mut().write_all(&bytes).await;
                            let _ = stream.get_mut().flush().await;
                        }
                        let _ = stream.get_mut().shutdown().await;
                    });
                }
            })
        };

        Self {
            dir,
            accept_task,
            in_flight,
            max_in_flight,
            served,
        }
    }

    /// Directory to hand to the client as its socket dir.
    pub fn socket_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Highest number of requests observed being processed at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Requests that received a reply (or a deliberate close).
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    /// Requests currently being processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for MockTarget {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
