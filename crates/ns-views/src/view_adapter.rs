//! View adapter abstraction - base trait for the table, map and chart views

use std::any::Any;

use ns_core::{ExplorerSnapshot, ViewKind};
use uuid::Uuid;

/// Unique identifier for a mounted view
pub type ViewId = Uuid;

/// Base trait for every view fed by the explorer.
///
/// Adapters only read snapshots. User actions go out through the
/// [`IntentSender`](ns_core::IntentSender) handed to them at construction.
pub trait ViewAdapter: Send + Sync {
    /// Get the unique ID of this view
    fn id(&self) -> ViewId;

    /// Which slot of the layout this view fills
    fn kind(&self) -> ViewKind;

    /// Type name shown in logs and text output
    fn view_type(&self) -> &str;

    /// Take in the latest snapshot
    fn sync(&mut self, snapshot: &ExplorerSnapshot);

    /// Plain-text rendering of the current state
    fn render_text(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}
