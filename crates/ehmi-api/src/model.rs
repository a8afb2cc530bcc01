// Wire types for the HMI JSON-RPC methods and the state stream.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Instance event id: `[boot id, event counter]`.
///
/// Ordered lexicographically, so a state from a later boot always wins
/// over any state from an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ieid(pub u64, pub u64);

/// One item state as reported by `item.state` and the state stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    /// Full OID, e.g. `"unit:pumps/p1"`.
    pub oid: String,

    /// Item status register. `1` means "on" / "set" for most classes.
    #[serde(default)]
    pub status: i64,

    /// Item value; any JSON type the item class allows.
    #[serde(default)]
    pub value: serde_json::Value,

    /// Number of outstanding actions. Only units report it.
    #[serde(default)]
    pub act: Option<u64>,

    /// Instance event id, used to drop stale or duplicate states.
    #[serde(default)]
    pub ieid: Option<Ieid>,

    /// Set time (UNIX seconds).
    #[serde(default)]
    pub t: Option<f64>,
}

impl ItemState {
    /// Outstanding action count, `0` when the item class has none.
    pub fn act(&self) -> u64 {
        self.act.unwrap_or(0)
    }
}

/// Reply of `ehmi.get_config`.
///
/// The dashboard config stays raw JSON here; `ehmi-core` owns its schema.
#[derive(Debug)]
pub struct DashboardReply {
    pub config: serde_json::Value,
    pub token: SecretString,
}

#[derive(Deserialize)]
pub(crate) struct DashboardWire {
    pub config: serde_json::Value,
    pub token: String,
}

impl From<DashboardWire> for DashboardReply {
    fn from(wire: DashboardWire) -> Self {
        Self {
            config: wire.config,
            token: SecretString::from(wire.token),
        }
    }
}

/// Reply of `login`.
#[derive(Deserialize)]
pub(crate) struct LoginReply {
    pub token: String,
}

/// Lifecycle status of a remote action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Created,
    Accepted,
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    #[serde(other)]
    Unknown,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Accepted => "accepted",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }
}

/// Result record of `run`, `action` and `action.toggle` with `wait` set.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub uuid: Option<String>,
    pub status: ActionStatus,
    #[serde(default)]
    pub exitcode: Option<i64>,
    #[serde(default)]
    pub err: Option<String>,
}

// ── JSON-RPC envelope ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}
