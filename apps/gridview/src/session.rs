//! Live session: one viewport, its cell store and push stream, and the key
//! handling that turns input into navigation, mutations and overlays.

use std::sync::Arc;
use std::time::{Duration, Instant};

use grid_sync::viewport::OriginUpdate;
use grid_sync::{Bounds, CellRecord, GridCoordinate, Selection, TimingOverlay, Viewport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::controller::{Intent, Key, KeyContext, KeyController};
use crate::dispatcher::MutationDispatcher;
use crate::overlay;
use crate::pagination::{self, WalkOutcome};
use crate::store::CellStore;
use crate::stream::{self, ConnectionStatus, RECONNECT_DELAY, StreamHandle};
use crate::transport::{GridApi, HttpGridApi};

/// Label used when the service does not report its region.
pub const FALLBACK_REGION: &str = "local-development";

/// Results of background work started by the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Overlay(TimingOverlay),
    OverlayUnavailable { id: GridCoordinate, reason: String },
    Details(CellRecord),
    MutationFinished { action: &'static str, ok: bool },
    Notice(String),
}

/// Result of one key press: the intent it mapped to and the background task
/// it started, if any.
#[derive(Debug)]
pub struct KeyOutcome {
    pub intent: Intent,
    pub task: Option<JoinHandle<()>>,
}

/// Background refresh timer started by [`Session::run_refresh_loop`].
pub struct RefreshLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshLoop {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

pub struct Session {
    api: Arc<dyn GridApi>,
    stream_api: Option<HttpGridApi>,
    dispatcher: MutationDispatcher,
    config: SessionConfig,
    viewport: Viewport,
    store: CellStore,
    selection: Selection,
    controller: KeyController,
    hovered: Option<GridCoordinate>,
    stream: Option<StreamHandle>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Session {
    /// Session backed by the HTTP service, including the push stream.
    pub fn connect(
        http: HttpGridApi,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let api: Arc<dyn GridApi> = Arc::new(http.clone());
        Self::build(api, Some(http), config)
    }

    /// Session without a push stream; the store only changes through
    /// refreshes.
    pub fn detached(
        api: Arc<dyn GridApi>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::build(api, None, config)
    }

    fn build(
        api: Arc<dyn GridApi>,
        stream_api: Option<HttpGridApi>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let viewport = Viewport::default();
        let session = Self {
            dispatcher: MutationDispatcher::new(api.clone()),
            api,
            stream_api,
            config,
            store: CellStore::new(viewport.bounds()),
            viewport,
            selection: Selection::default(),
            controller: KeyController::new(),
            hovered: None,
            stream: None,
            status: Arc::new(watch::channel(ConnectionStatus::Disconnected).0),
            events,
        };
        (session, rx)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Push-stream state. Stays `Disconnected` for detached sessions.
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Follows the connection indicator across stream restarts.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Recomputes the extent for a render area of `width_px` x `height_px`
    /// and rebuilds the grid.
    pub async fn resize(&mut self, width_px: u32, height_px: u32) {
        let changed = self.viewport.resize(
            width_px,
            height_px,
            self.config.min_cell_px,
            self.config.gap_px,
        );
        let (rows, cols) = self.viewport.extent();
        debug!(target = "gridview.session", rows, cols, changed, "viewport resized");
        self.rebuild().await;
    }

    /// Resets every visible cell and reattaches the push stream to the
    /// current bounds. The previous stream is fully closed first.
    pub async fn rebuild(&mut self) {
        let bounds = self.viewport.bounds();
        self.store.rebuild(bounds);
        if let Some(previous) = self.stream.take() {
            previous.shutdown().await;
        }
        if let Some(http) = &self.stream_api {
            self.stream = Some(stream::spawn_stream(
                http.clone(),
                bounds,
                self.store.clone(),
                self.status.clone(),
                RECONNECT_DELAY,
            ));
        }
        info!(
            target = "gridview.session",
            top_left = %bounds.top_left,
            bottom_right = %bounds.bottom_right,
            "grid rebuilt"
        );
    }

    /// One snapshot walk over the visible bounds.
    pub async fn refresh(&self) -> WalkOutcome {
        pagination::walk_bounds(
            self.api.as_ref(),
            self.store.bounds(),
            self.config.max_cells_per_region,
            &self.store,
        )
        .await
    }

    /// Starts a walk on every tick of `interval`. A walk still in flight is
    /// not waited for.
    pub fn run_refresh_loop(&self, interval: Duration) -> RefreshLoop {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let api = self.api.clone();
        let store = self.store.clone();
        let max_cells = self.config.max_cells_per_region;
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let api = api.clone();
                        let store = store.clone();
                        tokio::spawn(async move {
                            let outcome =
                                pagination::walk_bounds(api.as_ref(), store.bounds(), max_cells, &store).await;
                            if !outcome.completed() {
                                debug!(target = "gridview.session", error = ?outcome.error, "refresh incomplete");
                            }
                        });
                    }
                }
            }
        });
        RefreshLoop { cancel, task }
    }

    /// Moves the origin and rebuilds when it actually changed.
    pub async fn set_origin(&mut self, update: OriginUpdate) -> bool {
        if !self.viewport.set_origin(update) {
            return false;
        }
        let (x, y) = self.viewport.origin();
        info!(target = "gridview.session", x, y, "origin moved");
        self.rebuild().await;
        true
    }

    /// Pointer moved over `at`. While the selection modifier is held, moving
    /// off the previous cell starts a drag there and later moves extend it.
    pub fn hover(&mut self, at: GridCoordinate) {
        let previous = self.hovered.replace(at);
        if !self.controller.is_selecting() {
            return;
        }
        if self.selection.is_active() {
            self.selection.extend(at);
        } else if let Some(from) = previous.filter(|from| *from != at) {
            self.selection.begin(from);
            self.selection.extend(at);
        }
    }

    /// Pointer released over `at`: the drag in progress stops following the
    /// pointer.
    pub fn release(&mut self, at: GridCoordinate) {
        self.hovered = Some(at);
        self.selection.finalize(at);
    }

    /// Deadline of the pending navigation buffer.
    pub fn command_deadline(&self) -> Option<Instant> {
        self.controller.buffer().deadline()
    }

    /// Drops a navigation buffer that has gone idle.
    pub fn expire_command(&mut self, now: Instant) -> bool {
        let expired = self.controller.buffer_mut().expire(now);
        if expired {
            debug!(target = "gridview.session", "command buffer timed out");
        }
        expired
    }

    pub fn pending_command(&self) -> &str {
        self.controller.buffer().as_str()
    }

    pub async fn handle_key(&mut self, key: Key) -> KeyOutcome {
        let ctx = KeyContext {
            hovered: self.hovered.map(|at| (at, self.store.cell(at))),
            selection: self.selection.rect(),
        };
        let intent = self.controller.handle(key, &ctx, Instant::now());
        let task = self.apply_intent(&intent).await;
        KeyOutcome { intent, task }
    }

    async fn apply_intent(&mut self, intent: &Intent) -> Option<JoinHandle<()>> {
        match intent {
            Intent::None | Intent::CommandPending(_) => None,
            Intent::CommandCancelled => {
                self.notice("command cancelled".to_string());
                None
            }
            Intent::CommandRejected { input, error } => {
                warn!(target = "gridview.session", %input, %error, "invalid command");
                self.notice(format!("invalid command '{input}': {error}"));
                None
            }
            Intent::Navigate(command) => {
                if self.set_origin(command.to_origin_update()).await {
                    Some(self.spawn_refresh())
                } else {
                    None
                }
            }
            Intent::Mutate {
                id,
                status,
                command,
                radius,
            } => {
                let dispatcher = self.dispatcher.clone();
                let events = self.events.clone();
                let (id, status, command, radius) = (id.to_string(), *status, *command, *radius);
                Some(tokio::spawn(async move {
                    let ok = dispatcher
                        .send_cell_update(&id, status, command, radius)
                        .await;
                    let _ = events.send(SessionEvent::MutationFinished {
                        action: command.path(),
                        ok,
                    });
                }))
            }
            Intent::FillSelection { rect, status } => {
                let visible = self.viewport.bounds();
                self.selection.clear();
                let Some(rect) = rect.intersect(visible) else {
                    self.notice("selection is outside the viewport".to_string());
                    return None;
                };
                let dispatcher = self.dispatcher.clone();
                let events = self.events.clone();
                let status = *status;
                Some(tokio::spawn(async move {
                    let ok = dispatcher.send_fill_rectangle(rect, status).await;
                    let _ = events.send(SessionEvent::MutationFinished {
                        action: "fill-rectangle",
                        ok,
                    });
                }))
            }
            Intent::ShowTiming(id) => Some(self.spawn_timing_overlay(*id)),
            Intent::ShowDetails(id) => {
                let api = self.api.clone();
                let events = self.events.clone();
                let id = *id;
                Some(tokio::spawn(async move {
                    match overlay::fetch_cell_details(api.as_ref(), &id.to_string()).await {
                        Ok(record) => {
                            let _ = events.send(SessionEvent::Details(record));
                        }
                        Err(err) => {
                            warn!(target = "gridview.session", %id, error = %err, "view row lookup failed");
                        }
                    }
                }))
            }
            // the selection itself starts on the first drag
            Intent::BeginSelection => None,
            Intent::EndSelection => {
                self.selection.clear();
                None
            }
        }
    }

    fn spawn_refresh(&self) -> JoinHandle<()> {
        let api = self.api.clone();
        let store = self.store.clone();
        let max_cells = self.config.max_cells_per_region;
        tokio::spawn(async move {
            pagination::walk_bounds(api.as_ref(), store.bounds(), max_cells, &store).await;
        })
    }

    fn spawn_timing_overlay(&self, id: GridCoordinate) -> JoinHandle<()> {
        let api = self.api.clone();
        let events = self.events.clone();
        let routes = self.config.route_override.clone();
        tokio::spawn(async move {
            let event = match overlay::fetch_timing_overlay(api.as_ref(), &routes, &id.to_string()).await {
                Ok(Some(overlay)) => SessionEvent::Overlay(overlay),
                Ok(None) => SessionEvent::OverlayUnavailable {
                    id,
                    reason: "no region returned timing data".to_string(),
                },
                Err(err) => SessionEvent::OverlayUnavailable {
                    id,
                    reason: err.to_string(),
                },
            };
            let _ = events.send(event);
        })
    }

    fn notice(&self, message: String) {
        let _ = self.events.send(SessionEvent::Notice(message));
    }

    pub fn summary(&self) -> String {
        self.store.counts().to_string()
    }

    pub async fn region_label(&self) -> String {
        match self.api.region_label().await {
            Ok(label) if !label.is_empty() => label,
            Ok(_) => FALLBACK_REGION.to_string(),
            Err(err) => {
                debug!(target = "gridview.session", error = %err, "region lookup failed");
                FALLBACK_REGION.to_string()
            }
        }
    }

    /// Visible cells inside the current selection.
    pub fn selected_ids(&self) -> Vec<GridCoordinate> {
        self.selection.ids_within(self.viewport.bounds())
    }

    pub fn visible_bounds(&self) -> Bounds {
        self.viewport.bounds()
    }

    /// Stops the push stream, if one is running.
    pub async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown().await;
        }
    }
}
