//! Core of the place-name explorer
//!
//! This crate owns the query state and keeps the table, map and chart views
//! consistent: it derives the visible results, coordinates the three
//! asynchronous fetch channels, caches versioned geometry and picks the
//! layout for the current breakpoint.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod geometry;
pub mod layout;
pub mod query;
pub mod record;
pub mod selectors;
pub mod services;
pub mod state;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ExplorerConfig;
pub use error::{ErrorNotice, ExplorerError, FetchError};
pub use fetch::{Channel, FetchState, FetchStatus, FetchUpdate, RequestId};
pub use geometry::{GeometryCache, GeometryKey, GeometryLookup, GeometryStatus};
pub use layout::{compose_layout, Breakpoint, LayoutConfig, LayoutPlan};
pub use query::{FilterUpdate, Intent, IntentSender, QueryState, ResultFormat, SortDirection, SortSpec, ViewKind};
pub use record::{DatasetId, FieldId, FieldValue, RawResult, ResultId, Suggestion};
pub use selectors::{Aggregation, GroupKey, VisibleValues};
pub use services::{GeometryService, SearchService, Services, SuggestionService};
pub use state::{Explorer, ExplorerSnapshot};
pub use sync::{SnapshotSubscriber, SyncManager};
