// ── Runtime session configuration ──
//
// These types describe *how* to reach an HMI service. They carry the
// client key and connection tuning, but never touch disk: the panel
// resolves a profile and hands a `SessionConfig` in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed plant servers).
    DangerAcceptInvalid,
}

/// How state notifications reach the session after the initial load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateTransport {
    /// Push over the `/ws` WebSocket with `subscribe.state`.
    #[default]
    WebSocket,
    /// Re-issue `item.state` for the whole watch set on a fixed interval.
    Poll { interval: Duration },
}

/// Configuration for one dashboard session.
///
/// Built by the panel, passed to `Session` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMI service root (e.g., `https://plant.local:7727`).
    pub url: Url,
    /// Client key sent to `ehmi.get_config`.
    pub client_key: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// How long action calls wait for completion on the server.
    pub action_wait: Duration,
    /// State notification source.
    pub transport: StateTransport,
}

impl SessionConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_ACTION_WAIT: Duration = Duration::from_secs(30);

    /// A config with default tuning for `url` and `client_key`.
    pub fn new(url: Url, client_key: SecretString) -> Self {
        Self {
            url,
            client_key,
            tls: TlsVerification::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            action_wait: Self::DEFAULT_ACTION_WAIT,
            transport: StateTransport::default(),
        }
    }
}
