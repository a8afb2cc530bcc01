// ── Core error types ──
//
// User-facing errors from ehmi-core. Consumers never see JSON-RPC codes
// or HTTP status lines directly: the `From<ehmi_api::Error>` impl turns
// transport-layer failures into domain-appropriate variants.

use ehmi_api::error::{RPC_ACCESS_DENIED, RPC_NOT_FOUND};
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to HMI service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("HMI service disconnected")]
    Disconnected,

    #[error("HMI service request timed out")]
    Timeout,

    // ── Dashboard errors ─────────────────────────────────────────────
    #[error("Button #{index}: action OID not specified")]
    MissingOid { index: usize },

    #[error("Invalid dashboard configuration: {message}")]
    InvalidDashboard { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Action on {oid} finished with status {status}")]
    ActionFailed { oid: String, status: String },

    #[error("Item not found: {message}")]
    NotFound { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// JSON-RPC error code or HTTP status.
        code: Option<i64>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error must end the session (as opposed to a failed
    /// individual action).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::AuthenticationFailed { .. }
                | Self::MissingOid { .. }
                | Self::InvalidDashboard { .. }
                | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ehmi_api::Error> for CoreError {
    fn from(err: ehmi_api::Error) -> Self {
        match err {
            ehmi_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ehmi_api::Error::NotLoggedIn => CoreError::AuthenticationFailed {
                message: "no session token -- call connect() first".into(),
            },
            ehmi_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: e.status().map(|s| i64::from(s.as_u16())),
                    }
                }
            }
            ehmi_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ehmi_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ehmi_api::Error::Rpc { code, message } if code == RPC_ACCESS_DENIED => {
                CoreError::AuthenticationFailed {
                    message: format!("{message} (code {code})"),
                }
            }
            ehmi_api::Error::Rpc { code, message } if code == RPC_NOT_FOUND => {
                CoreError::NotFound { message }
            }
            ehmi_api::Error::Rpc { code, message } => CoreError::Api {
                message,
                code: Some(code),
            },
            ehmi_api::Error::ActionFailed { oid, status } => {
                CoreError::ActionFailed { oid, status }
            }
            ehmi_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket: {reason}"),
            },
            ehmi_api::Error::WebSocketClosed { .. } => CoreError::Disconnected,
            ehmi_api::Error::Deserialization { message, .. } => {
                CoreError::Internal(format!("unexpected response: {message}"))
            }
        }
    }
}
