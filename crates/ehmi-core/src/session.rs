// ── Session ──
//
// Full lifecycle of one dashboard session: fetch the dashboard config with
// the client key, build the dashboard, restore the session token, load the
// initial states, then keep them flowing (WebSocket push or HTTP polling)
// through the newer-than filter onto a broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use ehmi_api::{
    EvaClient, ItemState, ReconnectConfig, StateStreamHandle, StreamEvent, TlsMode,
    TransportConfig,
};

use crate::config::{SessionConfig, StateTransport, TlsVerification};
use crate::dashboard::{Dashboard, WatchSet};
use crate::dispatch::ActionDispatcher;
use crate::error::CoreError;
use crate::freshness::FreshnessFilter;
use crate::model::{DashboardConfig, RemoteState};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── SessionEvent ─────────────────────────────────────────────────

/// Everything the panel needs to hear about after `connect()`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A state that passed the newer-than filter.
    State(Arc<RemoteState>),
    /// The session token was rejected. Fatal.
    LoginFailed(String),
    /// The server asked clients to reload their configuration.
    Reload,
    Connection(ConnectionState),
}

// ── Session ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Subscribe to
/// [`events()`](Self::events) *before* calling [`connect()`](Self::connect)
/// so the initial states are not missed.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    client: Arc<EvaClient>,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    /// Child token for the current connection -- cancelled on disconnect,
    /// replaced on reconnect.
    cancel_child: Mutex<CancellationToken>,
    watch_set: Mutex<WatchSet>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Create a session from configuration. Does NOT connect.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let client = EvaClient::new(config.url.clone(), &build_transport(&config))?
            .with_action_wait(config.action_wait);
        Ok(Self::with_client(config, client))
    }

    /// Create a session around an existing client.
    pub fn with_client(config: SessionConfig, client: EvaClient) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(SessionInner {
                config,
                client: Arc::new(client),
                connection_state,
                event_tx,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                watch_set: Mutex::new(WatchSet::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// An action dispatcher bound to this session's client.
    pub fn dispatcher(&self) -> ActionDispatcher {
        ActionDispatcher::new(self.inner.client.clone())
    }

    /// The watch set installed by the last successful `connect()`.
    pub async fn watch_set(&self) -> WatchSet {
        self.inner.watch_set.lock().await.clone()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Fetch the dashboard configuration and bring the session up.
    ///
    /// Returns the built dashboard. Any error here is fatal for the
    /// panel; a rejected token is additionally announced as
    /// [`SessionEvent::LoginFailed`].
    pub async fn connect(&self) -> Result<Dashboard, CoreError> {
        self.set_state(ConnectionState::Connecting);

        // Fresh child token for this connection (supports reconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        match self.establish(child).await {
            Ok(dashboard) => {
                self.set_state(ConnectionState::Connected);
                info!(url = %self.inner.config.url, "session connected");
                Ok(dashboard)
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    async fn establish(&self, cancel: CancellationToken) -> Result<Dashboard, CoreError> {
        let client = &self.inner.client;

        let reply = client
            .get_dashboard_config(&self.inner.config.client_key)
            .await?;
        let config = DashboardConfig::from_json(&reply.config)?;

        let mut installed = WatchSet::new();
        let dashboard = Dashboard::build(&config, self.dispatcher(), &mut |ws: WatchSet| {
            installed = ws;
        })?;

        if let Err(e) = client.login_with_token(&reply.token).await {
            let err = CoreError::from(e);
            self.login_failed(&err.to_string());
            return Err(err);
        }
        debug!("session token restored");

        *self.inner.watch_set.lock().await = installed.clone();

        if installed.is_empty() {
            debug!("nothing to watch, state stream not started");
        } else {
            let session = self.clone();
            let handle = tokio::spawn(state_task(session, installed, cancel));
            self.inner.task_handles.lock().await.push(handle);
        }

        Ok(dashboard)
    }

    /// Stop all background tasks.
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent -- allows reconnect).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    // ── Event helpers ────────────────────────────────────────────

    fn set_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state.clone());
        let _ = self.inner.event_tx.send(SessionEvent::Connection(state));
    }

    fn login_failed(&self, message: &str) {
        error!(%message, "login failed");
        let _ = self
            .inner
            .event_tx
            .send(SessionEvent::LoginFailed(message.to_owned()));
    }

    fn publish(&self, filter: &mut FreshnessFilter, state: &ItemState) {
        if filter.admit(state) {
            let _ = self
                .inner
                .event_tx
                .send(SessionEvent::State(Arc::new(RemoteState::from(state))));
        } else {
            trace!(oid = %state.oid, "stale state dropped");
        }
    }

    /// One `item.state` round for the whole watch set.
    ///
    /// Returns `false` when the session token was rejected.
    async fn load_states(&self, oids: &[String], filter: &mut FreshnessFilter) -> bool {
        match self.inner.client.item_state(oids).await {
            Ok(states) => {
                trace!(count = states.len(), "states loaded");
                for state in &states {
                    self.publish(filter, state);
                }
                true
            }
            Err(e) if e.is_auth_failure() => {
                self.set_state(ConnectionState::Failed);
                self.login_failed(&CoreError::from(e).to_string());
                false
            }
            Err(e) => {
                warn!(error = %e, "state load failed (will retry)");
                true
            }
        }
    }
}

fn build_transport(config: &SessionConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Initial load, then the configured transport until cancelled.
async fn state_task(session: Session, watch_set: WatchSet, cancel: CancellationToken) {
    let oids = watch_set.to_strings();
    let mut filter = FreshnessFilter::new();

    let loaded = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        ok = session.load_states(&oids, &mut filter) => ok,
    };
    if !loaded {
        return;
    }

    match session.inner.config.transport {
        StateTransport::WebSocket => websocket_task(&session, oids, &mut filter, &cancel).await,
        StateTransport::Poll { interval } => {
            poll_task(&session, &oids, interval, &mut filter, &cancel).await;
        }
    }
    debug!("state task exiting");
}

/// Push transport: forward the WebSocket state stream.
async fn websocket_task(
    session: &Session,
    oids: Vec<String>,
    filter: &mut FreshnessFilter,
    cancel: &CancellationToken,
) {
    let ws_url = match session.inner.client.ws_url() {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "cannot derive state stream URL");
            return;
        }
    };

    let handle = StateStreamHandle::connect(
        ws_url,
        oids,
        ReconnectConfig::default(),
        cancel.child_token(),
    );
    let mut rx = handle.subscribe();
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = rx.recv() => {
                match result {
                    Ok(StreamEvent::Connected) => {
                        attempt = 0;
                        session.set_state(ConnectionState::Connected);
                    }
                    Ok(StreamEvent::State(state)) => session.publish(filter, &state),
                    Ok(StreamEvent::Reload) => {
                        info!("server requested reload");
                        let _ = session.inner.event_tx.send(SessionEvent::Reload);
                    }
                    Ok(StreamEvent::AuthRejected(message)) => {
                        session.set_state(ConnectionState::Failed);
                        session.login_failed(&message);
                        break;
                    }
                    Ok(StreamEvent::Disconnected) => {
                        attempt = attempt.saturating_add(1);
                        session.set_state(ConnectionState::Reconnecting { attempt });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "state stream receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    handle.shutdown();
}

/// Poll transport: re-issue `item.state` on a fixed interval.
async fn poll_task(
    session: &Session,
    oids: &[String],
    interval: Duration,
    filter: &mut FreshnessFilter,
    cancel: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; the initial load already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !session.load_states(oids, filter).await {
                    break;
                }
            }
        }
    }
}
