use thiserror::Error;

/// JSON-RPC code the HMI service uses for "access denied".
pub const RPC_ACCESS_DENIED: i64 = -32002;

/// JSON-RPC code the HMI service uses for "not found".
pub const RPC_NOT_FOUND: i64 = -32001;

/// Top-level error type for the `ehmi-api` crate.
///
/// Covers every failure mode of the HMI surface: token login, transport,
/// JSON-RPC errors, action acknowledgment and the WebSocket state stream.
/// `ehmi-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or token restore was rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// An operation that needs a session token was attempted before login.
    #[error("Not logged in -- no session token")]
    NotLoggedIn,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── JSON-RPC ────────────────────────────────────────────────────
    /// Structured error from the `{"error": {code, message}}` reply member.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    // ── Actions ─────────────────────────────────────────────────────
    /// The remote acknowledged the action with a non-completed status.
    #[error("Action on {oid} finished with status '{status}'")]
    ActionFailed { oid: String, status: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the token or key was rejected.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::NotLoggedIn => true,
            Self::Rpc { code, .. } => *code == RPC_ACCESS_DENIED,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the remote reported an unknown method or item.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Rpc { code, .. } => *code == RPC_NOT_FOUND,
            _ => false,
        }
    }

    /// Extract the JSON-RPC error code, if available.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}
