//! The orchestration core: single owner of query state and every channel

mod snapshot;

pub use snapshot::ExplorerSnapshot;

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ExplorerConfig;
use crate::error::{ErrorNotice, ExplorerError};
use crate::events::events::{
    ChannelFailed, GeometryReady, LayoutChanged, QueryChanged, ResultsApplied, StaleResponseDiscarded,
};
use crate::events::EventBus;
use crate::fetch::{Channel, FetchCoordinator, FetchUpdate, RequestId};
use crate::geometry::{GeometryCache, GeometryView};
use crate::layout::{compose_layout, Breakpoint, LayoutPlan};
use crate::query::{intent_channel, Intent, IntentReceiver, IntentSender, QueryState, SortSpec};
use crate::selectors::Selectors;
use crate::services::Services;
use crate::sync::SyncManager;

/// Owns the query state, the selectors, the fetch channels, the geometry
/// cache and the layout plan.
///
/// Everything is mutated through `&mut self` on one task. Views read
/// [`ExplorerSnapshot`]s and talk back through an [`IntentSender`].
pub struct Explorer {
    config: ExplorerConfig,
    query: QueryState,
    selectors: Selectors,
    fetch: FetchCoordinator,
    geometry: GeometryCache,
    breakpoint: Breakpoint,
    layout: LayoutPlan,

    intents: IntentReceiver,
    dispatcher: IntentSender,

    event_bus: Arc<EventBus>,
    sync: Arc<SyncManager>,

    revision: u64,
    snapshot: Arc<ExplorerSnapshot>,
    disposed: bool,
}

impl Explorer {
    /// Create the explorer. Must be called from within a tokio runtime.
    pub fn create(config: ExplorerConfig, services: Services, clock: Arc<dyn Clock>) -> Result<Self, ExplorerError> {
        config.validate()?;

        let fetch = FetchCoordinator::new(&config, services, clock)?;
        let query = QueryState::with_datasets(config.initial_datasets.iter().cloned());
        let mut selectors = Selectors::new(config.selectors.clone());
        let geometry = GeometryCache::new();
        let breakpoint = Breakpoint::default();
        let layout = compose_layout(breakpoint, &config.layout);
        let (dispatcher, intents) = intent_channel();

        let snapshot = Arc::new(ExplorerSnapshot {
            revision: 0,
            query: query.clone(),
            raw_count: 0,
            visible: selectors.visible(&query),
            values: selectors.values(&query),
            facets: selectors.facets(),
            suggestions: Arc::from(Vec::new()),
            geometry: GeometryView::of(&geometry),
            channels: Channel::ALL.map(|channel| fetch.state(channel)),
            notices: Vec::new(),
            breakpoint,
            layout: layout.clone(),
            coordinates: config.coordinates.clone(),
        });

        let sync = Arc::new(SyncManager::new());
        sync.publish(snapshot.clone());

        tracing::info!(
            "Explorer created with {} initial datasets",
            query.dataset_toggles.len()
        );

        Ok(Self {
            config,
            query,
            selectors,
            fetch,
            geometry,
            breakpoint,
            layout,
            intents,
            dispatcher,
            event_bus: Arc::new(EventBus::new()),
            sync,
            revision: 0,
            snapshot,
            disposed: false,
        })
    }

    /// Cancel every channel, abort every task and drop all derived state
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.fetch.shutdown();
        self.intents.close();
        self.selectors.clear_raw();
        self.geometry.clear();
        self.disposed = true;
        self.commit();
        self.event_bus.clear();
        tracing::info!("Explorer disposed at revision {}", self.revision);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Handle for views to send intents through
    pub fn dispatcher(&self) -> IntentSender {
        self.dispatcher.clone()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> Arc<ExplorerSnapshot> {
        self.snapshot.clone()
    }

    /// Current error notices, one per failed channel at most
    pub fn errors(&self) -> Vec<ErrorNotice> {
        self.fetch.errors()
    }

    /// Selector recompute counters
    pub fn selector_stats(&self) -> crate::selectors::SelectorStats {
        self.selectors.stats()
    }

    /// Apply one intent and commit a new snapshot
    pub fn dispatch(&mut self, intent: Intent) -> Result<(), ExplorerError> {
        if self.disposed {
            return Err(ExplorerError::Disposed);
        }
        let name = intent.name();
        tracing::debug!("Dispatching {}", name);

        match intent {
            Intent::UpdateQuery(text) => {
                self.query.text = text;
                self.request_suggestions();
            }
            Intent::ToggleDataset(id) => {
                let active = self.query.toggle_dataset(id.clone());
                tracing::debug!("Dataset {} is now {}", id, if active { "on" } else { "off" });
                self.fetch.cancel(Channel::Results);
                self.fetch.trigger_results(self.query.search_params());
            }
            Intent::SortResults { field, direction } => {
                self.query.sort = Some(SortSpec { field, direction });
            }
            Intent::UpdateResultsFilter(update) => self.query.results_filter.apply(update),
            Intent::FetchResults => {
                self.fetch.trigger_results(self.query.search_params());
            }
            Intent::ClearResults => {
                self.fetch.clear(Channel::Results);
                self.selectors.clear_raw();
            }
            Intent::FetchSuggestions => self.request_suggestions(),
            Intent::ClearSuggestions => self.fetch.clear(Channel::Suggestions),
            Intent::GetGeoJson { key } => {
                self.geometry.request(key);
                self.fetch.trigger_geometry(key, self.query.geometry_params());
            }
            Intent::OpenAnalysisView => self.query.analysis_view = true,
            Intent::CloseAnalysisView => self.query.analysis_view = false,
            Intent::UpdateResultFormat(format) => self.query.result_format = format,
            Intent::SetGroupBy(field) => self.query.group_by = field,
            Intent::SetHeatMap(enabled) => self.query.heat_map = enabled,
            Intent::SelectTab(kind) => self.query.active_tab = kind,
        }

        self.commit();
        self.event_bus.publish(QueryChanged {
            intent: name,
            revision: self.revision,
        });
        Ok(())
    }

    fn request_suggestions(&mut self) {
        let text = self.query.text.trim();
        if text.is_empty() {
            self.fetch.clear(Channel::Suggestions);
        } else {
            let text = text.to_string();
            self.fetch.trigger_suggestions(text);
        }
    }

    /// Apply every intent queued by views. Returns how many were applied.
    pub fn process_intents(&mut self) -> Result<usize, ExplorerError> {
        let mut applied = 0;
        while let Some(intent) = self.intents.try_next() {
            self.dispatch(intent)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Issue a deferred suggestion trigger whose quiet window has passed
    pub fn poll_deferred(&mut self) -> Option<RequestId> {
        if self.disposed {
            return None;
        }
        let request_id = self.fetch.poll_deferred()?;
        self.commit();
        Some(request_id)
    }

    /// When a deferred suggestion trigger becomes due
    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.fetch.next_deadline()
    }

    /// Wait for the next fetch response and apply it.
    ///
    /// Returns `None` once no request is outstanding.
    pub async fn next_update(&mut self) -> Option<FetchUpdate> {
        if self.disposed {
            return None;
        }
        let response = self.fetch.recv().await?;
        Some(self.apply_response(response))
    }

    /// Apply every response that has already arrived, without waiting
    pub fn drain_updates(&mut self) -> Vec<FetchUpdate> {
        let mut updates = Vec::new();
        if self.disposed {
            return updates;
        }
        while let Some(response) = self.fetch.try_recv() {
            updates.push(self.apply_response(response));
        }
        updates
    }

    fn apply_response(&mut self, response: crate::fetch::FetchResponse) -> FetchUpdate {
        let update = self.fetch.apply(response);

        match &update {
            FetchUpdate::Discarded { channel, request_id } => {
                self.event_bus.publish(StaleResponseDiscarded {
                    channel: *channel,
                    request_id: *request_id,
                });
                return update;
            }
            FetchUpdate::Results(raw) => {
                self.selectors.set_raw(raw.clone());
            }
            FetchUpdate::Suggestions(_) => {}
            FetchUpdate::Geometry { key, payload } => {
                self.geometry.store(*key, payload.clone());
            }
            FetchUpdate::GeometryFailed { key, notice } => {
                self.geometry.record_failure(*key, notice.clone());
            }
            FetchUpdate::Failed(_) => {}
        }

        self.commit();

        match &update {
            FetchUpdate::Results(raw) => {
                tracing::info!(
                    "Applied {} results, {} visible",
                    raw.len(),
                    self.snapshot.visible.len()
                );
                self.event_bus.publish(ResultsApplied {
                    request_id: self.fetch.state(Channel::Results).request_id,
                    raw_count: raw.len(),
                    visible_count: self.snapshot.visible.len(),
                });
            }
            FetchUpdate::Geometry { key, .. } => {
                self.event_bus.publish(GeometryReady { key: *key });
            }
            FetchUpdate::Failed(notice) | FetchUpdate::GeometryFailed { notice, .. } => {
                self.event_bus.publish(ChannelFailed { notice: notice.clone() });
            }
            _ => {}
        }
        update
    }

    /// Feed a new breakpoint. Returns whether the layout plan changed.
    ///
    /// Never triggers a fetch.
    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> bool {
        if self.disposed || breakpoint == self.breakpoint {
            return false;
        }
        self.breakpoint = breakpoint;
        let plan = compose_layout(breakpoint, &self.config.layout);
        let changed = plan != self.layout;
        self.layout = plan;
        self.commit();

        if changed {
            tracing::info!(
                "Layout switched to {} at breakpoint {}",
                if self.layout.is_two_column() { "two columns" } else { "one column" },
                breakpoint
            );
            self.event_bus.publish(LayoutChanged {
                breakpoint,
                plan: self.layout.clone(),
            });
        }
        changed
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.breakpoint
    }

    /// Rebuild the snapshot from the current state and publish it
    fn commit(&mut self) {
        self.revision += 1;

        let visible = self.selectors.visible(&self.query);
        let values = self.selectors.values(&self.query);
        let facets = self.selectors.facets();

        let snapshot = Arc::new(ExplorerSnapshot {
            revision: self.revision,
            query: self.query.clone(),
            raw_count: self.selectors.raw().len(),
            visible,
            values,
            facets,
            suggestions: self.fetch.suggestions().unwrap_or_else(|| Arc::from(Vec::new())),
            geometry: GeometryView::of(&self.geometry),
            channels: Channel::ALL.map(|channel| self.fetch.state(channel)),
            notices: self.fetch.errors(),
            breakpoint: self.breakpoint,
            layout: self.layout.clone(),
            coordinates: self.config.coordinates.clone(),
        });

        self.snapshot = snapshot.clone();
        self.sync.publish(snapshot);
    }
}

impl Drop for Explorer {
    fn drop(&mut self) {
        if !self.disposed {
            self.fetch.shutdown();
        }
    }
}
