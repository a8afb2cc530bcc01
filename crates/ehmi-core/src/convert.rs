// ── API-to-domain type conversions ──
//
// Bridges raw `ehmi_api` wire types into `ehmi_core::model` types. The
// wire `act` is optional (only units report it); the domain type
// defaults it to zero so the busy rules never see a missing count.

use ehmi_api::ItemState;

use crate::model::{Oid, RemoteState};

impl From<ItemState> for RemoteState {
    fn from(state: ItemState) -> Self {
        let act = state.act();
        Self {
            oid: Oid::from(state.oid),
            status: state.status,
            value: state.value,
            act,
        }
    }
}

impl From<&ItemState> for RemoteState {
    fn from(state: &ItemState) -> Self {
        Self {
            oid: Oid::from(state.oid.as_str()),
            status: state.status,
            value: state.value.clone(),
            act: state.act(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_act_becomes_zero() {
        let wire: ItemState = serde_json::from_value(json!({
            "oid": "lvar:plant/mode", "status": 1, "value": "auto"
        }))
        .unwrap();
        let state = RemoteState::from(&wire);
        assert_eq!(state.act, 0);
        assert_eq!(state.status, 1);
        assert_eq!(state.oid.as_str(), "lvar:plant/mode");
    }

    #[test]
    fn unit_fields_carry_over() {
        let wire: ItemState = serde_json::from_value(json!({
            "oid": "unit:pumps/p1", "status": 1, "value": 1, "act": 3, "ieid": [1, 2]
        }))
        .unwrap();
        let state = RemoteState::from(wire);
        assert_eq!(state.act, 3);
        assert!(state.value_is_one());
    }
}
