use std::sync::Arc;

use crate::config::CoordinateFields;
use crate::error::ErrorNotice;
use crate::fetch::{Channel, FetchState};
use crate::geometry::{GeometryKey, GeometryLookup, GeometryView};
use crate::layout::{Breakpoint, LayoutPlan};
use crate::query::QueryState;
use crate::record::{RawResult, Suggestion};
use crate::selectors::{Facets, VisibleValues};

/// One consistent, immutable view of everything the adapters render.
///
/// A snapshot is built in one step after each state change, so the query,
/// the derived results and the geometry it carries always belong together.
#[derive(Debug, Clone)]
pub struct ExplorerSnapshot {
    /// Increases with every committed change
    pub revision: u64,
    pub query: QueryState,
    pub raw_count: usize,
    pub visible: Arc<[RawResult]>,
    pub values: Arc<VisibleValues>,
    pub facets: Arc<Facets>,
    pub suggestions: Arc<[Suggestion]>,
    pub geometry: GeometryView,
    pub channels: [FetchState; 3],
    pub notices: Vec<ErrorNotice>,
    pub breakpoint: Breakpoint,
    pub layout: LayoutPlan,
    pub coordinates: CoordinateFields,
}

impl ExplorerSnapshot {
    pub fn channel(&self, channel: Channel) -> FetchState {
        self.channels[channel.index()]
    }

    pub fn notice(&self, channel: Channel) -> Option<&ErrorNotice> {
        self.notices.iter().find(|notice| notice.channel == channel)
    }

    /// No visible results; views render an explicit empty state
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Geometry for the key a view last requested
    pub fn geometry_for(&self, key: GeometryKey) -> GeometryLookup {
        self.geometry.lookup(key)
    }
}
