// ── Dashboard ──
//
// Builds every control from the configuration, collects the OIDs they
// watch and hands that set to the subscription side exactly once. After
// construction the dashboard is the single owner of its controls and of
// the OID routing table; the UI loop drives it through `notify` and the
// interaction methods.

use indexmap::IndexSet;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::binding::BindingTable;
use crate::control::{Control, ControlId};
use crate::dispatch::{ActionDispatcher, ActionRequest};
use crate::error::CoreError;
use crate::model::{DashboardConfig, Oid, RemoteState};

// ── WatchSet ────────────────────────────────────────────────────────

/// Ordered, de-duplicated set of OIDs the dashboard needs states for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    oids: IndexSet<Oid>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the OID was already present.
    pub fn insert(&mut self, oid: Oid) -> bool {
        self.oids.insert(oid)
    }

    pub fn contains(&self, oid: &str) -> bool {
        self.oids.contains(oid)
    }

    pub fn len(&self) -> usize {
        self.oids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Oid> {
        self.oids.iter()
    }

    /// OIDs as plain strings, for the wire.
    pub fn to_strings(&self) -> Vec<String> {
        self.oids.iter().map(ToString::to_string).collect()
    }
}

impl<'a> IntoIterator for &'a WatchSet {
    type Item = &'a Oid;
    type IntoIter = indexmap::set::Iter<'a, Oid>;

    fn into_iter(self) -> Self::IntoIter {
        self.oids.iter()
    }
}

impl FromIterator<Oid> for WatchSet {
    fn from_iter<I: IntoIterator<Item = Oid>>(iter: I) -> Self {
        Self {
            oids: iter.into_iter().collect(),
        }
    }
}

/// Receives the complete watch set once the dashboard is built.
pub trait WatchRegistry {
    fn install(&mut self, watch_set: WatchSet);
}

impl<F: FnMut(WatchSet)> WatchRegistry for F {
    fn install(&mut self, watch_set: WatchSet) {
        self(watch_set);
    }
}

// ── Dashboard ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Dashboard {
    controls: Vec<Control>,
    bindings: BindingTable,
    watch_set: WatchSet,
    dispatcher: ActionDispatcher,
}

impl Dashboard {
    /// Build all controls, in configuration order, and install the watch
    /// set on `registry`.
    ///
    /// The first bad entry aborts construction; `registry` is then never
    /// called.
    pub fn build(
        config: &DashboardConfig,
        dispatcher: ActionDispatcher,
        registry: &mut impl WatchRegistry,
    ) -> Result<Self, CoreError> {
        let entries = config.buttons();
        let mut controls = Vec::with_capacity(entries.len());
        let mut bindings = BindingTable::new();
        let mut watch_set = WatchSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let control = Control::from_config(ControlId(index), entry)?;
            if let Some(primary) = control.primary_oid() {
                watch_set.insert(primary.clone());
            }
            if let Some(busy) = control.busy_oid() {
                watch_set.insert(busy.clone());
            }
            bindings.bind(&control);
            debug!(oid = %control.oid(), kind = ?control.kind(), "control created");
            controls.push(control);
        }

        registry.install(watch_set.clone());
        info!(
            controls = controls.len(),
            watched = watch_set.len(),
            "dashboard built"
        );

        Ok(Self {
            controls,
            bindings,
            watch_set,
            dispatcher,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(id.0)
    }

    /// Controls that are currently rendered, in order.
    pub fn visible(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter().filter(|c| c.is_visible())
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    // ── State ────────────────────────────────────────────────────────

    /// Project a state notification onto the controls watching its OID.
    ///
    /// Returns `true` if any control changed.
    pub fn notify(&mut self, state: &RemoteState) -> bool {
        self.bindings.notify(&mut self.controls, state) > 0
    }

    // ── Interaction ──────────────────────────────────────────────────

    /// Press a control (run, toggle or apply). `None` if it ignored input.
    pub fn press(&mut self, id: ControlId) -> Option<JoinHandle<()>> {
        let request = self.controls.get_mut(id.0)?.press()?;
        Some(self.dispatch(request))
    }

    /// Apply a value control's field text.
    pub fn apply(&mut self, id: ControlId) -> Option<JoinHandle<()>> {
        let request = self.controls.get_mut(id.0)?.apply()?;
        Some(self.dispatch(request))
    }

    /// Replace a value control's field text. Nothing is sent.
    pub fn edit(&mut self, id: ControlId, text: impl Into<String>) -> bool {
        self.controls
            .get_mut(id.0)
            .is_some_and(|control| control.edit(text))
    }

    fn dispatch(&self, request: ActionRequest) -> JoinHandle<()> {
        self.dispatcher.dispatch(request)
    }
}
