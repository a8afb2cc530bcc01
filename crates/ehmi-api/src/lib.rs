// ehmi-api: Async Rust client for the EVA ICS v4 HMI API (JSON-RPC + WebSocket)

pub mod client;
pub mod error;
pub mod model;
pub mod transport;
pub mod websocket;

pub use client::EvaClient;
pub use error::Error;
pub use model::{ActionResult, ActionStatus, DashboardReply, Ieid, ItemState};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, StateStreamHandle, StreamEvent};
