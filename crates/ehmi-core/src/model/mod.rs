// ── Domain model ──
//
// Item identity, the dashboard definition served by the HMI service and
// the remote state snapshots the controls are projected from.

pub mod button;
pub mod oid;
pub mod state;

pub use button::{ButtonConfig, ButtonKind, Buttons, DEFAULT_INPUT_WIDTH, DashboardConfig};
pub use oid::{Oid, OidKind};
pub use state::{RemoteState, display_value};
