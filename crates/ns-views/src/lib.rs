//! View adapters for the place-name explorer
//!
//! Headless table, map and chart adapters plus the [`Viewport`] that mounts
//! them according to the explorer's layout plan.

pub mod chart;
pub mod map;
pub mod table;
mod view_adapter;
mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use chart::{ChartAdapter, Slice};
pub use map::{Cluster, HeatPoint, MapAdapter, MapConfig, MapMode};
pub use table::{FilterOption, ListAdapter, TableAdapter, TableConfig};
pub use view_adapter::{ViewAdapter, ViewId};
pub use viewport::{SharedViewport, Viewport, ViewportConfig};
