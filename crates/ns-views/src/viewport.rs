//! Viewport - mounts view adapters per layout plan and feeds them snapshots

use std::fmt::Write as _;
use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;
use ns_core::sync::ViewSyncSettings;
use ns_core::{ExplorerSnapshot, FieldId, IntentSender, LayoutPlan, ResultFormat, SnapshotSubscriber, SyncManager, ViewKind};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::chart::ChartAdapter;
use crate::map::{MapAdapter, MapConfig};
use crate::table::{ListAdapter, TableAdapter, TableConfig};
use crate::{ViewAdapter, ViewId};

/// Settings for the adapters the viewport creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub table: TableConfig,
    pub map: MapConfig,
    pub chart_group_fields: Vec<FieldId>,
    pub list_label_field: FieldId,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            map: MapConfig::default(),
            chart_group_fields: vec!["type".to_string(), "area".to_string(), "dataset".to_string()],
            list_label_field: "label".to_string(),
        }
    }
}

/// Manages the mounted views
pub struct Viewport {
    config: ViewportConfig,
    dispatcher: IntentSender,
    sync: Arc<SyncManager>,

    views: AHashMap<ViewId, Box<dyn ViewAdapter>>,
    /// Mounted view per slot, in layout order
    slots: IndexMap<ViewKind, ViewId>,

    layout: Option<LayoutPlan>,
    active_tab: ViewKind,
    revision: Option<u64>,
}

impl Viewport {
    pub fn new(dispatcher: IntentSender, sync: Arc<SyncManager>, config: ViewportConfig) -> Self {
        Self {
            config,
            dispatcher,
            sync,
            views: AHashMap::new(),
            slots: IndexMap::new(),
            layout: None,
            active_tab: ViewKind::default(),
            revision: None,
        }
    }

    /// Mount what the snapshot's layout and modes call for, then sync every
    /// mounted view that is not frozen.
    pub fn apply(&mut self, snapshot: &ExplorerSnapshot) {
        if self.revision == Some(snapshot.revision) {
            return;
        }
        self.revision = Some(snapshot.revision);

        let mounted = snapshot.layout.mounted();
        let stale: Vec<ViewKind> = self
            .slots
            .keys()
            .copied()
            .filter(|kind| !mounted.contains(kind) || !self.slot_matches(*kind, snapshot))
            .collect();
        for kind in stale {
            self.unmount(kind);
        }
        for kind in &mounted {
            if !self.slots.contains_key(kind) {
                let view = self.create_view(*kind, snapshot.query.result_format);
                self.mount(view);
            }
        }
        // keep slot order equal to layout order
        let rank = |kind: &ViewKind| mounted.iter().position(|k| k == kind).unwrap_or(usize::MAX);
        self.slots.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));

        if self.layout.as_ref() != Some(&snapshot.layout) {
            tracing::debug!("Viewport now {:?}", snapshot.layout);
        }
        self.layout = Some(snapshot.layout.clone());
        self.active_tab = snapshot.query.active_tab;

        for id in self.slots.values() {
            if !self.sync.should_sync(&id.to_string()) {
                continue;
            }
            if let Some(view) = self.views.get_mut(id) {
                view.sync(snapshot);
            }
        }
    }

    fn slot_matches(&self, kind: ViewKind, snapshot: &ExplorerSnapshot) -> bool {
        if kind != ViewKind::Table {
            return true;
        }
        let wants_list = snapshot.query.result_format == ResultFormat::Other;
        self.slots
            .get(&kind)
            .and_then(|id| self.views.get(id))
            .map(|view| view.as_any().is::<ListAdapter>() == wants_list)
            .unwrap_or(false)
    }

    fn create_view(&self, kind: ViewKind, format: ResultFormat) -> Box<dyn ViewAdapter> {
        let dispatcher = self.dispatcher.clone();
        match (kind, format) {
            (ViewKind::Table, ResultFormat::Table) => Box::new(TableAdapter::new(dispatcher, self.config.table.clone())),
            (ViewKind::Table, ResultFormat::Other) => {
                Box::new(ListAdapter::new(dispatcher, self.config.list_label_field.clone()))
            }
            (ViewKind::Map, _) => Box::new(MapAdapter::new(dispatcher, self.config.map.clone())),
            (ViewKind::Chart, _) => Box::new(ChartAdapter::new(dispatcher, self.config.chart_group_fields.clone())),
        }
    }

    fn mount(&mut self, view: Box<dyn ViewAdapter>) {
        let id = view.id();
        tracing::debug!("Mounting {} ({})", view.view_type(), id);
        self.sync.register_view(id.to_string(), ViewSyncSettings::default());
        self.slots.insert(view.kind(), id);
        self.views.insert(id, view);
    }

    fn unmount(&mut self, kind: ViewKind) {
        if let Some(id) = self.slots.shift_remove(&kind) {
            if let Some(view) = self.views.remove(&id) {
                tracing::debug!("Unmounting {} ({})", view.view_type(), id);
            }
            self.sync.unregister_view(&id.to_string());
        }
    }

    pub fn layout(&self) -> Option<&LayoutPlan> {
        self.layout.as_ref()
    }

    /// Kinds of the mounted views, in layout order
    pub fn mounted(&self) -> Vec<ViewKind> {
        self.slots.keys().copied().collect()
    }

    /// Views currently on screen
    pub fn visible(&self) -> Vec<&dyn ViewAdapter> {
        let Some(layout) = &self.layout else {
            return Vec::new();
        };
        layout
            .visible(self.active_tab)
            .into_iter()
            .filter_map(|kind| self.view(kind))
            .collect()
    }

    pub fn view(&self, kind: ViewKind) -> Option<&dyn ViewAdapter> {
        let id = self.slots.get(&kind)?;
        self.views.get(id).map(|view| view.as_ref())
    }

    fn downcast<T: 'static>(&self, kind: ViewKind) -> Option<&T> {
        self.view(kind)?.as_any().downcast_ref::<T>()
    }

    pub fn table(&self) -> Option<&TableAdapter> {
        self.downcast(ViewKind::Table)
    }

    pub fn list(&self) -> Option<&ListAdapter> {
        self.downcast(ViewKind::Table)
    }

    pub fn map(&self) -> Option<&MapAdapter> {
        self.downcast(ViewKind::Map)
    }

    pub fn chart(&self) -> Option<&ChartAdapter> {
        self.downcast(ViewKind::Chart)
    }

    /// Freeze or unfreeze the view in `kind`'s slot
    pub fn set_frozen(&self, kind: ViewKind, frozen: bool) {
        if let Some(id) = self.slots.get(&kind) {
            self.sync.set_frozen(&id.to_string(), frozen);
        }
    }

    /// Plain-text rendering of what is on screen
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        match &self.layout {
            Some(LayoutPlan::OneColumn { tabs }) => {
                let tabs: Vec<String> = tabs
                    .iter()
                    .map(|tab| {
                        if *tab == self.active_tab {
                            format!("[{tab:?}]")
                        } else {
                            format!("{tab:?}")
                        }
                    })
                    .collect();
                let _ = writeln!(out, "== one column: {} ==", tabs.join(" "));
            }
            Some(LayoutPlan::TwoColumn { table_width, .. }) => {
                let _ = writeln!(out, "== two columns: table {table_width}px | map + chart ==");
            }
            None => return out,
        }
        for view in self.visible() {
            out.push_str(&view.render_text());
        }
        out
    }
}

/// A viewport that can be subscribed to a [`SyncManager`]
pub struct SharedViewport {
    inner: Mutex<Viewport>,
}

impl SharedViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Mutex::new(viewport),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Viewport> {
        self.inner.lock()
    }
}

impl SnapshotSubscriber for SharedViewport {
    fn on_snapshot(&self, snapshot: &Arc<ExplorerSnapshot>) {
        self.inner.lock().apply(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshot_with;
    use ns_core::query::intent_channel;
    use ns_core::{compose_layout, Breakpoint, Intent, LayoutConfig, RawResult};

    fn viewport() -> (Viewport, ns_core::query::IntentReceiver) {
        let (tx, rx) = intent_channel();
        (Viewport::new(tx, Arc::new(SyncManager::new()), ViewportConfig::default()), rx)
    }

    #[test]
    fn test_mounts_all_views_in_layout_order() {
        let (mut viewport, _rx) = viewport();
        viewport.apply(&snapshot_with(vec![RawResult::new("1", "A")]));

        assert_eq!(viewport.mounted(), vec![ViewKind::Table, ViewKind::Map, ViewKind::Chart]);
        assert_eq!(viewport.table().map(|t| t.rows().len()), Some(1));
        assert!(viewport.map().is_some());
        assert!(viewport.chart().is_some());
    }

    #[test]
    fn test_one_column_shows_active_tab_but_syncs_all() {
        let (mut viewport, _rx) = viewport();
        let mut snapshot = snapshot_with(vec![RawResult::new("1", "A")]);
        snapshot.layout = compose_layout(Breakpoint::Medium, &LayoutConfig::default());
        snapshot.query.active_tab = ViewKind::Chart;
        viewport.apply(&snapshot);

        let visible: Vec<ViewKind> = viewport.visible().iter().map(|v| v.kind()).collect();
        assert_eq!(visible, vec![ViewKind::Chart]);
        // hidden tabs are still current
        assert_eq!(viewport.table().map(|t| t.rows().len()), Some(1));
        assert!(viewport.render_text().contains("[Chart]"));
    }

    #[test]
    fn test_result_format_swaps_table_slot() {
        let (mut viewport, _rx) = viewport();
        let mut snapshot = snapshot_with(Vec::new());
        viewport.apply(&snapshot);
        let map_id = viewport.map().map(|m| m.id());

        snapshot.revision += 1;
        snapshot.query.result_format = ResultFormat::Other;
        viewport.apply(&snapshot);

        assert!(viewport.table().is_none());
        assert!(viewport.list().is_some());
        assert_eq!(viewport.mounted(), vec![ViewKind::Table, ViewKind::Map, ViewKind::Chart]);
        assert_eq!(viewport.map().map(|m| m.id()), map_id);
    }

    #[test]
    fn test_frozen_view_keeps_old_rows() {
        let (mut viewport, _rx) = viewport();
        let mut snapshot = snapshot_with(vec![RawResult::new("1", "A")]);
        viewport.apply(&snapshot);
        viewport.set_frozen(ViewKind::Table, true);

        snapshot.revision += 1;
        snapshot.visible = Arc::from(Vec::new());
        viewport.apply(&snapshot);

        assert_eq!(viewport.table().map(|t| t.rows().len()), Some(1));
        assert_eq!(viewport.chart().map(|c| c.is_empty()), Some(true));
    }

    #[test]
    fn test_shared_viewport_receives_snapshots() {
        let (tx, mut rx) = intent_channel();
        let sync = Arc::new(SyncManager::new());
        let shared = Arc::new(SharedViewport::new(Viewport::new(tx, sync.clone(), ViewportConfig::default())));
        let subscriber: Arc<dyn SnapshotSubscriber> = shared.clone();
        sync.subscribe(Arc::downgrade(&subscriber));

        sync.publish(Arc::new(snapshot_with(Vec::new())));

        assert_eq!(shared.lock().mounted().len(), 3);
        // the freshly mounted map asks for its first geometry
        assert!(matches!(rx.try_next(), Some(Intent::GetGeoJson { .. })));
    }
}
