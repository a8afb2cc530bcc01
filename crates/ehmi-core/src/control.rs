// ── Controls ──
//
// A Control is the view model for one dashboard entry: the interactive
// element, its optional apply button and its label. Controls only change
// through user interaction (`press` / `edit`) or through the state
// binding (`on_primary` / `on_busy`).

use crate::binding::BusyRule;
use crate::dispatch::{ActionRequest, ActionValue};
use crate::error::CoreError;
use crate::model::{ButtonConfig, ButtonKind, Oid, RemoteState};

// ── Identity & kind ─────────────────────────────────────────────────

/// Position of a control within its dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub usize);

/// Resolved control kind. Decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Run button. Always visible and unwatched for `lmacro:` items.
    Macro,
    /// Binary switch.
    Toggle,
    /// Text field plus apply button.
    ValueInput { width: u16 },
}

impl ControlKind {
    /// `lmacro:` OIDs always run; otherwise the declared kind, defaulting
    /// to a toggle.
    pub fn resolve(config: &ButtonConfig, oid: &Oid) -> Self {
        if oid.is_macro() {
            return Self::Macro;
        }
        match config.kind {
            Some(ButtonKind::Run) => Self::Macro,
            Some(ButtonKind::Value) => Self::ValueInput {
                width: config.input_width(),
            },
            Some(ButtonKind::Toggle) | None => Self::Toggle,
        }
    }
}

/// Dispatch state of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// An action was sent; waiting for the next notification.
    Pending,
}

// ── Control ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    id: ControlId,
    oid: Oid,
    label: String,
    kind: ControlKind,
    busy: Option<Oid>,

    visible: bool,
    phase: Phase,
    blocked_by_primary: bool,
    blocked_by_busy: bool,

    /// Toggle position.
    checked: bool,
    /// Value field text.
    field: String,
    /// Field edited since the last apply.
    dirty: bool,
}

impl Control {
    /// Build the control for one configured entry.
    ///
    /// Fails when the entry has no OID; nothing is produced in that case.
    pub fn from_config(id: ControlId, config: &ButtonConfig) -> Result<Self, CoreError> {
        let oid = config
            .oid()
            .cloned()
            .ok_or(CoreError::MissingOid { index: id.0 })?;
        let kind = ControlKind::resolve(config, &oid);
        let label = match config.label.as_deref() {
            Some(label) if !label.is_empty() => label.replace('_', " "),
            _ => oid.to_string(),
        };

        Ok(Self {
            id,
            label,
            kind,
            busy: config.busy().cloned(),
            // `lmacro:` items have no state of their own to wait for.
            visible: oid.is_macro(),
            oid,
            phase: Phase::Idle,
            blocked_by_primary: false,
            blocked_by_busy: false,
            checked: false,
            field: String::new(),
            dirty: false,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn busy_oid(&self) -> Option<&Oid> {
        self.busy.as_ref()
    }

    /// The OID whose state drives this control, if any.
    pub fn primary_oid(&self) -> Option<&Oid> {
        (!self.oid.is_macro()).then_some(&self.oid)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_blocked_by_primary(&self) -> bool {
        self.blocked_by_primary
    }

    pub fn is_blocked_by_busy(&self) -> bool {
        self.blocked_by_busy
    }

    /// Rendered disabled: an action is pending or a source reports busy.
    pub fn is_disabled(&self) -> bool {
        self.phase == Phase::Pending || self.blocked_by_primary || self.blocked_by_busy
    }

    /// Whether interaction is accepted right now.
    pub fn is_interactive(&self) -> bool {
        self.visible && !self.is_disabled()
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── Interaction ──────────────────────────────────────────────────

    /// Activate the control: run, toggle or apply depending on its kind.
    ///
    /// Returns the action to dispatch, or `None` when the control ignores
    /// input right now.
    pub fn press(&mut self) -> Option<ActionRequest> {
        if !self.is_interactive() {
            return None;
        }
        match self.kind {
            ControlKind::Macro => Some(ActionRequest::Run(self.oid.clone())),
            ControlKind::Toggle => {
                // `checked` keeps its pre-press value until the remote
                // reports the new one.
                self.phase = Phase::Pending;
                Some(ActionRequest::Toggle(self.oid.clone()))
            }
            ControlKind::ValueInput { .. } => self.apply(),
        }
    }

    /// Apply the field text of a value control.
    pub fn apply(&mut self) -> Option<ActionRequest> {
        if !self.is_interactive() || !matches!(self.kind, ControlKind::ValueInput { .. }) {
            return None;
        }
        self.phase = Phase::Pending;
        self.dirty = false;
        Some(ActionRequest::SetValue {
            oid: self.oid.clone(),
            value: ActionValue::parse(&self.field),
        })
    }

    /// Replace the field text of a value control. Sends nothing.
    ///
    /// Returns `false` when the edit was ignored.
    pub fn edit(&mut self, text: impl Into<String>) -> bool {
        if !self.is_interactive() || !matches!(self.kind, ControlKind::ValueInput { .. }) {
            return false;
        }
        self.field = text.into();
        self.dirty = true;
        true
    }

    // ── State projection ─────────────────────────────────────────────

    /// Notification on the primary OID.
    pub(crate) fn on_primary(&mut self, state: &RemoteState) {
        self.visible = true;
        self.phase = Phase::Idle;
        self.blocked_by_primary = state.is_acting();
        match self.kind {
            ControlKind::Toggle => self.checked = state.value_is_one(),
            // Overwrites text being edited; the dirty mark stays.
            ControlKind::ValueInput { .. } => self.field = state.value_text(),
            ControlKind::Macro => {}
        }
    }

    /// Notification on the busy OID.
    pub(crate) fn on_busy(&mut self, rule: BusyRule, state: &RemoteState) {
        self.visible = true;
        self.phase = Phase::Idle;
        self.blocked_by_busy = rule.is_blocking(state);
    }
}
