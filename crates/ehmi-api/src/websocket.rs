//! WebSocket state stream with auto-reconnect.
//!
//! Connects to the HMI service's `/ws` endpoint, subscribes to a fixed set
//! of OIDs and streams parsed [`ItemState`]s through a
//! [`tokio::sync::broadcast`] channel. Handles reconnection with exponential
//! backoff + jitter automatically and re-subscribes after every reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use ehmi_api::websocket::{ReconnectConfig, StateStreamHandle, StreamEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = client.ws_url()?;
//! let oids = vec!["unit:pumps/p1".to_string()];
//!
//! let handle = StateStreamHandle::connect(ws_url, oids, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(StreamEvent::State(state)) = rx.recv().await {
//!     println!("{} = {}", state.oid, state.value);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::model::ItemState;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Interval between client keepalive pings.
const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Connections that lived at least this long reset the reconnect backoff.
const STABLE_AFTER: Duration = Duration::from_secs(5);

// ── StreamEvent ──────────────────────────────────────────────────────

/// Everything the state stream reports to subscribers.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The socket is up and the subscription was sent.
    Connected,
    /// One item state pushed by the server.
    State(Arc<ItemState>),
    /// The server asked clients to reload their UI.
    Reload,
    /// The server refused the session token. The stream stops.
    AuthRejected(String),
    /// The connection dropped; a reconnect is pending.
    Disconnected,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── StateStreamHandle ────────────────────────────────────────────────

/// Handle to a running state stream.
///
/// Drop all handles and call [`shutdown`](Self::shutdown) to tear down the
/// background task.
pub struct StateStreamHandle {
    event_rx: broadcast::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StateStreamHandle {
    /// Spawn the connect/subscribe/reconnect loop for `oids`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Must be called from within a tokio runtime.
    pub fn connect(
        ws_url: Url,
        oids: Vec<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, oids, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → subscribe → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    oids: Vec<String>,
    event_tx: broadcast::Sender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &oids, &event_tx, &cancel) => result,
        };

        // Only a connection that stayed up resets the backoff; a server
        // that accepts and closes at once must not be hammered.
        if started.elapsed() >= STABLE_AFTER {
            attempt = 0;
        }

        match result {
            Ok(()) if cancel.is_cancelled() => break,
            // Clean disconnect (server close frame or stream ended).
            Ok(()) => {
                tracing::info!(attempt, "state stream disconnected cleanly");
            }
            Err(Error::Authentication { message }) => {
                tracing::error!(%message, "state stream rejected the session token");
                let _ = event_tx.send(StreamEvent::AuthRejected(message));
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "state stream error");
            }
        }

        let _ = event_tx.send(StreamEvent::Disconnected);

        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::error!(
                    max_retries = max,
                    "state stream reconnection limit reached, giving up"
                );
                break;
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("state stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single WebSocket connection, subscribe, read until it drops.
async fn connect_and_read(
    url: &Url,
    oids: &[String],
    event_tx: &broadcast::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(host = url.host_str().unwrap_or(""), "Connecting to state stream");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(map_connect_error)?;

    let (mut write, mut read) = ws_stream.split();

    write
        .send(tungstenite::Message::text(subscribe_frame(oids)))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!(oids = oids.len(), "state stream connected and subscribed");
    let _ = event_tx.send(StreamEvent::Connected);

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            _ = ping.tick() => {
                write
                    .send(tungstenite::Message::text(r#"{"m":"ping"}"#))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// An HTTP 401/403 on the upgrade means the token is no good.
fn map_connect_error(err: tungstenite::Error) -> Error {
    if let tungstenite::Error::Http(ref resp) = err {
        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            return Error::Authentication {
                message: format!("state stream upgrade refused (HTTP {status})"),
            };
        }
    }
    Error::WebSocketConnect(err.to_string())
}

fn subscribe_frame(oids: &[String]) -> String {
    serde_json::json!({ "m": "subscribe.state", "p": oids }).to_string()
}

// ── Message parsing ──────────────────────────────────────────────────

/// Raw frame the server sends over the WebSocket: `{ "s": kind, "d": data }`.
#[derive(Debug, Deserialize)]
struct WsFrame {
    s: String,
    #[serde(default)]
    d: serde_json::Value,
}

/// Parse a WebSocket text frame and broadcast anything useful inside.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<StreamEvent>) {
    let frame: WsFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket frame");
            return;
        }
    };

    match frame.s.as_str() {
        "state" => {
            let items = match frame.d {
                serde_json::Value::Array(items) => items,
                single @ serde_json::Value::Object(_) => vec![single],
                _ => Vec::new(),
            };
            for item in items {
                match serde_json::from_value::<ItemState>(item) {
                    // Ignore send errors -- just means no active subscribers
                    Ok(state) => {
                        let _ = event_tx.send(StreamEvent::State(Arc::new(state)));
                    }
                    Err(e) => tracing::debug!(error = %e, "Skipping malformed state"),
                }
            }
        }
        "reload" => {
            let _ = event_tx.send(StreamEvent::Reload);
        }
        "pong" => tracing::trace!("WebSocket pong"),
        other => tracing::trace!(kind = other, "Ignoring WebSocket frame"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many panels.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn recv_state(rx: &mut broadcast::Receiver<StreamEvent>) -> Arc<ItemState> {
        match rx.try_recv().unwrap() {
            StreamEvent::State(state) => state,
            other => panic!("expected a state, got {other:?}"),
        }
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn subscribe_frame_lists_oids() {
        let frame = subscribe_frame(&["unit:a/b".into(), "lvar:x".into()]);
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["m"], "subscribe.state");
        assert_eq!(parsed["p"], serde_json::json!(["unit:a/b", "lvar:x"]));
    }

    #[test]
    fn parse_state_array() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "s": "state",
            "d": [
                { "oid": "unit:pumps/p1", "status": 1, "value": 1, "act": 0 },
                { "oid": "sensor:env/temp", "status": 1, "value": 21.5 }
            ]
        });
        parse_and_broadcast(&raw.to_string(), &tx);

        assert_eq!(recv_state(&mut rx).oid, "unit:pumps/p1");
        let second = recv_state(&mut rx);
        assert_eq!(second.oid, "sensor:env/temp");
        assert_eq!(second.value, serde_json::json!(21.5));
    }

    #[test]
    fn parse_single_state_object() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = serde_json::json!({
            "s": "state",
            "d": { "oid": "lvar:plant/busy", "status": 0, "value": "" }
        });
        parse_and_broadcast(&raw.to_string(), &tx);

        assert_eq!(recv_state(&mut rx).oid, "lvar:plant/busy");
    }

    #[test]
    fn parse_reload_frame() {
        let (tx, mut rx) = broadcast::channel(16);
        parse_and_broadcast(r#"{"s":"reload"}"#, &tx);
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Reload));
    }

    #[test]
    fn pong_and_malformed_frames_are_dropped() {
        let (tx, mut rx) = broadcast::channel::<StreamEvent>(16);

        parse_and_broadcast(r#"{"s":"pong"}"#, &tx);
        parse_and_broadcast("not json at all", &tx);
        parse_and_broadcast(r#"{"s":"state","d":[{"status":1}]}"#, &tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn immediate_clean_close_backs_off() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let server = tokio::spawn(async move {
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await {
                        let _ = ws.close(None).await;
                    }
                });
            }
        });

        let cancel = CancellationToken::new();
        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            max_retries: None,
        };
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        let handle = StateStreamHandle::connect(url, vec!["lvar:x".into()], reconnect, cancel);
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.shutdown();
        server.abort();

        // 0 + 50 + ~121 + ~244 ms: four connects fit in the window.
        let count = accepted.load(Ordering::SeqCst);
        assert!((2..=6).contains(&count), "{count} connections in 600ms");

        let mut disconnects = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StreamEvent::Disconnected) {
                disconnects += 1;
            }
        }
        assert!(disconnects >= 1);
    }
}
