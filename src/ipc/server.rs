//! IPC server
//!
//! Accepts concurrent client connections on a Unix domain socket. Every
//! connection is served by its own task; a slow or misbehaving client only
//! ever affects itself. Excess load is handled by rejection: a request over
//! the global per-second budget gets an immediate failure response instead of
//! being queued.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::ConfigStore;

use super::dispatch::Dispatcher;
use super::protocol::{Request, Response};

/// Global fixed-window request counter.
///
/// The budget is re-read from the config snapshot on every request, so a
/// reload changes the limit without restarting the server.
pub struct RateLimiter {
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Account one request against the budget; `false` means reject.
    pub fn allow(&mut self, max_per_sec: u32) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }

        if self.count < max_per_sec {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// The accept loop and its shutdown choreography.
pub struct IpcServer {
    store: Arc<ConfigStore>,
    dispatcher: Arc<Dispatcher>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IpcServer {
    pub fn new(
        store: Arc<ConfigStore>,
        dispatcher: Arc<Dispatcher>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            shutdown_rx,
        }
    }

    /// Bind the configured socket and serve until shutdown is signalled.
    ///
    /// Failing to bind is the one fatal startup error of the daemon. On
    /// shutdown the listener is closed first (new connections are refused),
    /// then in-flight connections drain before this returns.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        let socket_path = self.store.get().socket.path.clone();
        let path = Path::new(&socket_path);

        // A stale socket file from a previous run would make bind fail.
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("cannot remove stale socket {socket_path}"))?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("cannot bind IPC socket at {socket_path}"))?;

        info!("listening on {socket_path}");

        let limiter = Arc::new(Mutex::new(RateLimiter::new()));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            trace!("accepted connection");
                            connections.spawn(handle_connection(
                                stream,
                                Arc::clone(&self.store),
                                Arc::clone(&self.dispatcher),
                                Arc::clone(&limiter),
                                self.shutdown_rx.clone(),
                            ));
                        }
                        Err(e) => {
                            warn!("failed to accept connection: {e}");
                        }
                    }
                }

                // Reap finished connection tasks as we go.
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        error!("connection task failed: {e}");
                    }
                }

                _ = self.shutdown_rx.changed() => {
                    debug!("shutdown requested, closing listener");
                    break;
                }
            }
        }

        // Refuse new connections, let in-flight requests finish.
        drop(listener);
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                error!("connection task failed: {e}");
            }
        }

        if let Err(e) = std::fs::remove_file(path) {
            debug!("could not remove socket file {socket_path}: {e}");
        }

        info!("IPC server stopped");
        Ok(())
    }
}

/// Serve one connection: requests in, responses out, in order.
#[instrument(skip_all)]
async fn handle_connection(
    stream: UnixStream,
    store: Arc<ConfigStore>,
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<Mutex<RateLimiter>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let config = store.get();
        let read_timeout = Duration::from_millis(config.socket.timeout_ms);

        let line = tokio::select! {
            read = tokio::time::timeout(read_timeout, lines.next_line()) => {
                match read {
                    Ok(Ok(Some(line))) => line,
                    Ok(Ok(None)) => {
                        trace!("client closed connection");
                        break;
                    }
                    Ok(Err(e)) => {
                        trace!("connection read error: {e}");
                        break;
                    }
                    Err(_) => {
                        debug!("connection idle for {read_timeout:?}, closing");
                        break;
                    }
                }
            }

            _ = shutdown_rx.changed() => {
                trace!("closing connection for shutdown");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            // Malformed input costs a response, never the connection.
            Err(e) => Response::failure(format!("malformed request: {e}")),

            Ok(request) => {
                let allowed = {
                    let mut limiter = limiter.lock().expect("rate limiter lock poisoned");
                    limiter.allow(config.rate_limit.max_requests_per_sec)
                };

                if !allowed {
                    trace!("request over rate budget, rejecting");
                    Response::failure("rate limit exceeded")
                } else {
                    // A panicking handler is converted into a failure
                    // response; the connection and the server stay up.
                    match AssertUnwindSafe(dispatcher.dispatch(request))
                        .catch_unwind()
                        .await
                    {
                        Ok(response) => response,
                        Err(_) => {
                            error!("request handler panicked");
                            Response::failure("internal error")
                        }
                    }
                }
            }
        };

        let mut encoded = match serde_json::to_vec(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("failed to encode response: {e}");
                break;
            }
        };
        encoded.push(b'\n');

        if let Err(e) = writer.write_all(&encoded).await {
            trace!("failed to write response: {e}");
            break;
        }
    }
}
