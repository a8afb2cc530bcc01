// ── Action dispatch ──
//
// Outbound actions run in spawned tasks so the UI loop never awaits a
// remote acknowledgment. Failures are logged from the task and never
// retried; the control stays Pending until the next state notification.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use ehmi_api::EvaClient;

use crate::error::CoreError;
use crate::model::Oid;

/// Largest integer an IEEE double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ── ActionValue ─────────────────────────────────────────────────────

/// The value sent by a set-value action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionValue {
    Number(f64),
    Text(String),
}

impl ActionValue {
    /// Interpret field text: a numeric prefix wins (`Infinity` and
    /// overflow included), anything else is sent verbatim.
    pub fn parse(raw: &str) -> Self {
        match parse_float_prefix(raw) {
            Some(n) => Self::Number(n),
            None => Self::Text(raw.to_owned()),
        }
    }

    /// JSON encoding: integral numbers as integers, other numbers as
    /// floats, text as a string. Non-finite numbers have no JSON form
    /// and go out as `null`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::as_conversions,
        clippy::float_cmp
    )]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Value::from(*n as i64)
            }
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Longest-prefix float parse: leading whitespace is skipped, then an
/// optional sign, `Infinity`, or digits with an optional fraction and
/// exponent. Trailing garbage is ignored. `None` when no digits lead.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digit_at = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s.get(end..).is_some_and(|rest| rest.starts_with("Infinity")) {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = end;
    while digit_at(end) {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let mut frac_end = end + 1;
        while digit_at(frac_end) {
            frac_end += 1;
        }
        let frac_digits = frac_end - end - 1;
        if mantissa_digits + frac_digits > 0 {
            mantissa_digits += frac_digits;
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_start = exp_end;
        while digit_at(exp_end) {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    s.get(..end)?.parse().ok()
}

// ── ActionRequest ───────────────────────────────────────────────────

/// One outbound action, produced by a control interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Run(Oid),
    Toggle(Oid),
    SetValue { oid: Oid, value: ActionValue },
}

impl ActionRequest {
    pub fn oid(&self) -> &Oid {
        match self {
            Self::Run(oid) | Self::Toggle(oid) | Self::SetValue { oid, .. } => oid,
        }
    }

    /// Short name used in log events.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Toggle(_) => "toggle",
            Self::SetValue { .. } => "set_value",
        }
    }
}

// ── RemoteActions ───────────────────────────────────────────────────

/// The three action primitives the dashboard needs from the remote side.
pub trait RemoteActions: Send + Sync {
    /// Invoke a parameterless macro and wait for it.
    fn run<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>>;

    /// Flip a binary item and wait for it.
    fn toggle<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>>;

    /// Set an item's value and wait for it.
    fn set_value<'a>(&'a self, oid: &'a Oid, value: Value)
    -> BoxFuture<'a, Result<(), CoreError>>;
}

impl RemoteActions for EvaClient {
    fn run<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            self.run_lmacro(oid.as_str()).await?;
            Ok(())
        })
    }

    fn toggle<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            self.action_toggle(oid.as_str()).await?;
            Ok(())
        })
    }

    fn set_value<'a>(
        &'a self,
        oid: &'a Oid,
        value: Value,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        Box::pin(async move {
            self.action_exec(oid.as_str(), value).await?;
            Ok(())
        })
    }
}

// ── ActionDispatcher ────────────────────────────────────────────────

/// Spawns actions against a [`RemoteActions`] implementation.
///
/// Cheaply cloneable. Every call returns the task's `JoinHandle`; callers
/// are free to drop it.
#[derive(Clone)]
pub struct ActionDispatcher {
    remote: Arc<dyn RemoteActions>,
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher").finish_non_exhaustive()
    }
}

impl ActionDispatcher {
    pub fn new(remote: Arc<dyn RemoteActions>) -> Self {
        Self { remote }
    }

    pub fn run_macro(&self, oid: Oid) -> JoinHandle<()> {
        self.dispatch(ActionRequest::Run(oid))
    }

    pub fn toggle_binary(&self, oid: Oid) -> JoinHandle<()> {
        self.dispatch(ActionRequest::Toggle(oid))
    }

    pub fn set_value(&self, oid: Oid, raw: &str) -> JoinHandle<()> {
        self.dispatch(ActionRequest::SetValue {
            oid,
            value: ActionValue::parse(raw),
        })
    }

    /// Spawn `request` on the runtime. Must be called from within tokio.
    pub fn dispatch(&self, request: ActionRequest) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        debug!(oid = %request.oid(), action = request.verb(), "dispatching action");

        tokio::spawn(async move {
            let result = match &request {
                ActionRequest::Run(oid) => remote.run(oid).await,
                ActionRequest::Toggle(oid) => remote.toggle(oid).await,
                ActionRequest::SetValue { oid, value } => {
                    remote.set_value(oid, value.to_json()).await
                }
            };
            match result {
                Ok(()) => debug!(oid = %request.oid(), action = request.verb(), "action completed"),
                Err(e) => error!(
                    oid = %request.oid(),
                    action = request.verb(),
                    error = %e,
                    "action failed"
                ),
            }
        })
    }
}

// ── Test double ─────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// One call observed by [`RecordingRemote`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Run(Oid),
        Toggle(Oid),
        SetValue(Oid, Value),
    }

    /// Records every action instead of sending it.
    #[derive(Default)]
    pub(crate) struct RecordingRemote {
        pub(crate) calls: Mutex<Vec<Call>>,
        pub(crate) fail: bool,
    }

    impl RecordingRemote {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }

        fn record(&self, call: Call) -> Result<(), CoreError> {
            self.calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(call);
            if self.fail {
                Err(CoreError::ActionFailed {
                    oid: "test".into(),
                    status: "failed".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl RemoteActions for RecordingRemote {
        fn run<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
            Box::pin(async move { self.record(Call::Run(oid.clone())) })
        }

        fn toggle<'a>(&'a self, oid: &'a Oid) -> BoxFuture<'a, Result<(), CoreError>> {
            Box::pin(async move { self.record(Call::Toggle(oid.clone())) })
        }

        fn set_value<'a>(
            &'a self,
            oid: &'a Oid,
            value: Value,
        ) -> BoxFuture<'a, Result<(), CoreError>> {
            Box::pin(async move { self.record(Call::SetValue(oid.clone(), value)) })
        }
    }
}
