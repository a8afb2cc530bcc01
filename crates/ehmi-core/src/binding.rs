// ── State binding ──
//
// Routes state notifications to the controls that watch the notified OID.
// A control subscribes through its primary OID (value, checked state and
// `act` blocking) and optionally a busy OID, whose class picks the rule
// that decides whether the control is blocked.

use std::collections::HashMap;

use crate::control::{Control, ControlId};
use crate::model::{Oid, OidKind, RemoteState};

// ── BusyRule ────────────────────────────────────────────────────────

/// How a busy source decides that its control is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyRule {
    /// `sensor:` items: the value loosely equals 1.
    SensorValue,
    /// `lvar:` items: the status register is 1.
    LvarStatus,
    /// Anything else: actions are outstanding.
    ActionCount,
}

impl BusyRule {
    pub fn for_oid(oid: &Oid) -> Self {
        match oid.kind() {
            OidKind::Sensor => Self::SensorValue,
            OidKind::Lvar => Self::LvarStatus,
            OidKind::Unit | OidKind::Lmacro | OidKind::Other => Self::ActionCount,
        }
    }

    pub fn is_blocking(self, state: &RemoteState) -> bool {
        match self {
            Self::SensorValue => state.value_loosely_one(),
            Self::LvarStatus => state.status == 1,
            Self::ActionCount => state.is_acting(),
        }
    }
}

// ── Subscriptions ───────────────────────────────────────────────────

/// What a subscription governs on its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Busy(BusyRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub control: ControlId,
    pub role: Role,
}

/// OID-to-control routing table, owned by one dashboard.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    routes: HashMap<Oid, Vec<Subscription>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `control` to the sources it needs.
    pub fn bind(&mut self, control: &Control) {
        if let Some(primary) = control.primary_oid() {
            self.add(primary.clone(), control.id(), Role::Primary);
        }
        if let Some(busy) = control.busy_oid() {
            self.add(busy.clone(), control.id(), Role::Busy(BusyRule::for_oid(busy)));
        }
    }

    fn add(&mut self, oid: Oid, control: ControlId, role: Role) {
        self.routes
            .entry(oid)
            .or_default()
            .push(Subscription { control, role });
    }

    pub fn subscriptions(&self, oid: &str) -> &[Subscription] {
        self.routes.get(oid).map(Vec::as_slice).unwrap_or_default()
    }

    /// Apply `state` to every subscribed control. Returns how many
    /// subscriptions fired.
    pub fn notify(&self, controls: &mut [Control], state: &RemoteState) -> usize {
        let subs = self.subscriptions(state.oid.as_str());
        for sub in subs {
            let Some(control) = controls.get_mut(sub.control.0) else {
                continue;
            };
            match sub.role {
                Role::Primary => control.on_primary(state),
                Role::Busy(rule) => control.on_busy(rule, state),
            }
        }
        subs.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::control::Phase;
    use crate::model::{ButtonConfig, ButtonKind};
    use serde_json::json;

    fn control(id: usize, oid: &str, busy: Option<&str>) -> Control {
        Control::from_config(
            ControlId(id),
            &ButtonConfig {
                oid: Some(Oid::from(oid)),
                busy: busy.map(Oid::from),
                kind: Some(ButtonKind::Toggle),
                ..ButtonConfig::default()
            },
        )
        .unwrap()
    }

    fn bound(controls: &[Control]) -> BindingTable {
        let mut table = BindingTable::new();
        for c in controls {
            table.bind(c);
        }
        table
    }

    #[test]
    fn busy_rule_by_class() {
        assert_eq!(BusyRule::for_oid(&Oid::from("sensor:env/door")), BusyRule::SensorValue);
        assert_eq!(BusyRule::for_oid(&Oid::from("lvar:plant/lock")), BusyRule::LvarStatus);
        assert_eq!(BusyRule::for_oid(&Oid::from("unit:pumps/p2")), BusyRule::ActionCount);
        assert_eq!(BusyRule::for_oid(&Oid::from("lmacro:ops/x")), BusyRule::ActionCount);
    }

    #[test]
    fn sensor_busy_is_independent_of_primary() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("sensor:env/door"))];
        let table = bound(&controls);

        table.notify(&mut controls, &RemoteState::new("sensor:env/door", 1, json!(1), 0));
        assert!(controls[0].is_visible());
        assert!(controls[0].is_disabled());

        // primary idle does not lift the busy block
        table.notify(&mut controls, &RemoteState::new("unit:pumps/p1", 1, json!(0), 0));
        assert!(controls[0].is_blocked_by_busy());
        assert!(controls[0].is_disabled());

        table.notify(&mut controls, &RemoteState::new("sensor:env/door", 1, json!(0), 0));
        assert!(!controls[0].is_disabled());
    }

    #[test]
    fn sensor_busy_accepts_string_one() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("sensor:env/door"))];
        let table = bound(&controls);
        table.notify(&mut controls, &RemoteState::new("sensor:env/door", 1, json!("1"), 0));
        assert!(controls[0].is_blocked_by_busy());
    }

    #[test]
    fn lvar_busy_follows_status() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("lvar:plant/lock"))];
        let table = bound(&controls);

        table.notify(&mut controls, &RemoteState::new("lvar:plant/lock", 1, json!(0), 0));
        assert!(controls[0].is_disabled());
        table.notify(&mut controls, &RemoteState::new("lvar:plant/lock", 0, json!(1), 0));
        assert!(!controls[0].is_disabled());
    }

    #[test]
    fn other_busy_follows_act() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("unit:pumps/p2"))];
        let table = bound(&controls);

        table.notify(&mut controls, &RemoteState::new("unit:pumps/p2", 1, json!(1), 1));
        assert!(controls[0].is_blocked_by_busy());
        assert!(!controls[0].is_blocked_by_primary());
        table.notify(&mut controls, &RemoteState::new("unit:pumps/p2", 1, json!(1), 0));
        assert!(!controls[0].is_disabled());
    }

    #[test]
    fn busy_notification_reveals_control() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("lvar:plant/lock"))];
        let table = bound(&controls);
        assert!(!controls[0].is_visible());
        table.notify(&mut controls, &RemoteState::new("lvar:plant/lock", 0, json!(0), 0));
        assert!(controls[0].is_visible());
    }

    #[test]
    fn busy_notification_releases_pending_toggle() {
        let mut controls = vec![control(0, "unit:pumps/p1", Some("lvar:plant/lock"))];
        let table = bound(&controls);
        table.notify(&mut controls, &RemoteState::new("unit:pumps/p1", 1, json!(0), 0));

        assert!(controls[0].press().is_some());
        assert_eq!(controls[0].phase(), Phase::Pending);
        assert!(controls[0].is_disabled());

        // the primary never answers; the busy source does
        table.notify(&mut controls, &RemoteState::new("lvar:plant/lock", 0, json!(0), 0));
        assert_eq!(controls[0].phase(), Phase::Idle);
        assert!(!controls[0].is_checked());
        assert!(controls[0].is_interactive());
    }

    #[test]
    fn busy_notification_releases_pending_value_control() {
        let mut controls = vec![
            Control::from_config(
                ControlId(0),
                &ButtonConfig {
                    oid: Some(Oid::from("lvar:plant/setpoint")),
                    busy: Some(Oid::from("unit:pumps/p2")),
                    kind: Some(ButtonKind::Value),
                    ..ButtonConfig::default()
                },
            )
            .unwrap(),
        ];
        let table = bound(&controls);
        table.notify(&mut controls, &RemoteState::new("lvar:plant/setpoint", 1, json!(5), 0));

        assert!(controls[0].edit("7"));
        assert!(controls[0].apply().is_some());
        assert_eq!(controls[0].phase(), Phase::Pending);

        // busy source reports a running action: no longer pending, still gated
        table.notify(&mut controls, &RemoteState::new("unit:pumps/p2", 1, json!(1), 1));
        assert_eq!(controls[0].phase(), Phase::Idle);
        assert!(controls[0].is_blocked_by_busy());
        assert!(controls[0].is_disabled());
        assert_eq!(controls[0].field(), "7");

        table.notify(&mut controls, &RemoteState::new("unit:pumps/p2", 1, json!(1), 0));
        assert!(controls[0].is_interactive());
    }

    #[test]
    fn shared_oid_fans_out() {
        let mut controls = vec![
            control(0, "unit:pumps/p1", None),
            control(1, "unit:pumps/p2", Some("unit:pumps/p1")),
        ];
        let table = bound(&controls);
        let fired =
            table.notify(&mut controls, &RemoteState::new("unit:pumps/p1", 1, json!(1), 1));
        assert_eq!(fired, 2);
        assert!(controls[0].is_checked());
        assert!(controls[0].is_blocked_by_primary());
        assert!(controls[1].is_blocked_by_busy());
        assert!(controls[1].is_visible());
        assert!(controls[1].is_disabled());
    }

    #[test]
    fn unknown_oid_is_ignored() {
        let mut controls = vec![control(0, "unit:pumps/p1", None)];
        let table = bound(&controls);
        assert_eq!(
            table.notify(&mut controls, &RemoteState::new("unit:other/x", 1, json!(1), 0)),
            0
        );
        assert!(!controls[0].is_visible());
    }
}
