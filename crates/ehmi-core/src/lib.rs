//! Binding engine between `ehmi-api` and the terminal panel.
//!
//! This crate owns the dashboard model and the reactive plumbing that keeps
//! it in sync with an EVA ICS HMI service:
//!
//! - **[`Session`]** -- Lifecycle facade. [`connect()`](Session::connect)
//!   fetches the dashboard configuration with the client key, builds the
//!   [`Dashboard`], restores the session token, loads initial states and
//!   spawns the state stream (WebSocket push or HTTP polling). States pass a
//!   newer-than filter and are published as [`SessionEvent`]s.
//!
//! - **[`Dashboard`]** -- Owns every [`Control`] plus the OID routing table.
//!   [`notify()`](Dashboard::notify) projects a state onto the controls that
//!   watch it; [`press()`](Dashboard::press) / [`edit()`](Dashboard::edit)
//!   turn interaction into outbound actions.
//!
//! - **[`ActionDispatcher`]** -- Spawns run / toggle / set-value actions
//!   against any [`RemoteActions`] implementation (the live client, or a
//!   test double) so the UI loop never waits on an acknowledgment.
//!
//! - **Domain model** ([`model`]) -- [`Oid`], the served
//!   [`DashboardConfig`] and the [`RemoteState`] snapshots controls are
//!   projected from.

pub mod binding;
pub mod config;
pub mod control;
pub mod convert;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod freshness;
pub mod model;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use binding::{BindingTable, BusyRule, Role};
pub use config::{SessionConfig, StateTransport, TlsVerification};
pub use control::{Control, ControlId, ControlKind, Phase};
pub use dashboard::{Dashboard, WatchRegistry, WatchSet};
pub use dispatch::{ActionDispatcher, ActionRequest, ActionValue, RemoteActions};
pub use error::CoreError;
pub use freshness::FreshnessFilter;
pub use session::{ConnectionState, Session, SessionEvent};

pub use model::{ButtonConfig, ButtonKind, DashboardConfig, Oid, OidKind, RemoteState};
