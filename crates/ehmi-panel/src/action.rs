//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::fmt;
use std::sync::Arc;

use ehmi_core::{ConnectionState, Dashboard, RemoteState};

/// Every state change the app loop applies, whether it came from the
/// keyboard or the session bridge.
pub enum Action {
    Quit,

    // ── Session ──
    /// A freshly built dashboard. Replaces the current one (reload).
    DashboardReady(Box<Dashboard>),
    /// A state that passed the newer-than filter.
    StateReceived(Arc<RemoteState>),
    ConnectionChanged(ConnectionState),
    /// Unrecoverable error. The panel is replaced by the message.
    Fatal(String),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => write!(f, "Quit"),
            Self::DashboardReady(d) => write!(f, "DashboardReady({} controls)", d.len()),
            Self::StateReceived(s) => write!(f, "StateReceived({})", s.oid),
            Self::ConnectionChanged(s) => write!(f, "ConnectionChanged({s:?})"),
            Self::Fatal(msg) => write!(f, "Fatal({msg})"),
        }
    }
}
