//! Push-stream worker.
//!
//! One worker per viewport: it opens the SSE stream for the visible bounds,
//! applies every pushed record to the shared store and reconnects on a fixed
//! delay after the connection closes. The worker is cancelled when the
//! viewport changes; the caller spawns a fresh one for the new bounds.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use grid_sync::Bounds;
use reqwest_eventsource::{Event, ReadyState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::store::CellStore;
use crate::transport::HttpGridApi;

/// Delay before a session's stream reconnects.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// What to do with a stream error, given the state the source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Still negotiating; the source keeps trying on its own.
    Ignore,
    /// Tear down and reconnect after the worker's delay, reporting `status`.
    Reconnect(ConnectionStatus),
}

/// Sources opened by [`HttpGridApi::open_stream`] use `retry::Never`, which
/// closes the source on every error, so they only ever report `Closed` here
/// and every failure takes the reconnect path. `Connecting` is reachable only
/// with a retrying policy installed.
pub fn classify_error(state: ReadyState) -> ErrorDisposition {
    match state {
        ReadyState::Connecting => ErrorDisposition::Ignore,
        ReadyState::Closed => ErrorDisposition::Reconnect(ConnectionStatus::Disconnected),
        ReadyState::Open => ErrorDisposition::Reconnect(ConnectionStatus::Error),
    }
}

/// Running stream worker. Dropping the handle does not stop the worker; call
/// [`StreamHandle::shutdown`].
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Closes the connection and waits for the worker to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            warn!(target = "gridview.stream", error = %err, "stream worker ended abnormally");
        }
    }
}

/// Starts the worker for `bounds`. Connection changes are published on
/// `status`, which outlives the worker so one indicator can follow every
/// stream a session opens.
pub fn spawn_stream(
    api: HttpGridApi,
    bounds: Bounds,
    store: CellStore,
    status: Arc<watch::Sender<ConnectionStatus>>,
    reconnect_delay: Duration,
) -> StreamHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_stream(
        api,
        bounds,
        store,
        status,
        reconnect_delay,
        cancel.clone(),
    ));
    StreamHandle { cancel, task }
}

async fn run_stream(
    api: HttpGridApi,
    bounds: Bounds,
    store: CellStore,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    let url = api.stream_url(bounds);
    loop {
        status_tx.send_replace(ConnectionStatus::Connecting);
        match api.open_stream(bounds) {
            Ok(mut source) => {
                let status = loop {
                    let polled = tokio::select! {
                        _ = cancel.cancelled() => None,
                        next = source.next() => Some(next),
                    };
                    let Some(next) = polled else {
                        source.close();
                        debug!(target = "gridview.stream", %url, "stream closed");
                        return;
                    };
                    match next {
                        Some(Ok(Event::Open)) => {
                            info!(target = "gridview.stream", %url, "stream connected");
                            status_tx.send_replace(ConnectionStatus::Connected);
                        }
                        Some(Ok(Event::Message(message))) => {
                            store.apply_json(&message.data);
                        }
                        Some(Err(err)) => match classify_error(source.ready_state()) {
                            ErrorDisposition::Ignore => {
                                debug!(target = "gridview.stream", error = %err, "ignoring error while connecting");
                            }
                            ErrorDisposition::Reconnect(status) => {
                                warn!(target = "gridview.stream", %url, error = %err, "stream failed");
                                source.close();
                                break status;
                            }
                        },
                        None => break ConnectionStatus::Disconnected,
                    }
                };
                status_tx.send_replace(status);
            }
            Err(err) => {
                error!(target = "gridview.stream", %url, error = %err, "failed to open stream");
                status_tx.send_replace(ConnectionStatus::Error);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(reconnect_delay) => {
                info!(target = "gridview.stream", %url, "reconnecting stream");
            }
        }
    }
}
