// ── Newer-than filter ──
//
// The initial `item.state` load and the push stream race each other, and
// a reconnect replays states the panel has already seen. Every state that
// carries an `ieid` must be strictly newer than the last one delivered for
// its OID; states without one always pass.

use std::collections::HashMap;

use ehmi_api::{Ieid, ItemState};

#[derive(Debug, Default)]
pub struct FreshnessFilter {
    last: HashMap<String, Ieid>,
}

impl FreshnessFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `state` and report whether it should be delivered.
    pub fn admit(&mut self, state: &ItemState) -> bool {
        let Some(ieid) = state.ieid else {
            return true;
        };
        match self.last.get_mut(&state.oid) {
            Some(last) if ieid <= *last => false,
            Some(last) => {
                *last = ieid;
                true
            }
            None => {
                self.last.insert(state.oid.clone(), ieid);
                true
            }
        }
    }
}
