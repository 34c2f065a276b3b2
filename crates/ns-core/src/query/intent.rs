//! Intents: the only legal way to change query state or start a fetch

use tokio::sync::mpsc;

use super::{FilterUpdate, ResultFormat, SortDirection, ViewKind};
use crate::geometry::GeometryKey;
use crate::record::{DatasetId, FieldId};

/// A named, parameterized request coming from a view or the host
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Change the free-text query and ask for suggestions
    UpdateQuery(String),
    /// Flip a dataset on or off and refetch results
    ToggleDataset(DatasetId),
    /// Sort locally; never refetches
    SortResults { field: FieldId, direction: SortDirection },
    /// Change the local results filter
    UpdateResultsFilter(FilterUpdate),
    FetchResults,
    ClearResults,
    FetchSuggestions,
    ClearSuggestions,
    /// Request geometry tagged with `key`
    GetGeoJson { key: GeometryKey },
    OpenAnalysisView,
    CloseAnalysisView,
    /// Switch the adapter mounted in the table slot
    UpdateResultFormat(ResultFormat),
    /// Change the grouping field of the statistics view
    SetGroupBy(Option<FieldId>),
    /// Switch the map between clustered and heat-map rendering
    SetHeatMap(bool),
    /// Pick the visible tab in one-column layouts
    SelectTab(ViewKind),
}

impl Intent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Intent::UpdateQuery(_) => "updateQuery",
            Intent::ToggleDataset(_) => "toggleDataset",
            Intent::SortResults { .. } => "sortResults",
            Intent::UpdateResultsFilter(_) => "updateResultsFilter",
            Intent::FetchResults => "fetchResults",
            Intent::ClearResults => "clearResults",
            Intent::FetchSuggestions => "fetchSuggestions",
            Intent::ClearSuggestions => "clearSuggestions",
            Intent::GetGeoJson { .. } => "getGeoJSON",
            Intent::OpenAnalysisView => "openAnalysisView",
            Intent::CloseAnalysisView => "closeAnalysisView",
            Intent::UpdateResultFormat(_) => "updateResultFormat",
            Intent::SetGroupBy(_) => "setGroupBy",
            Intent::SetHeatMap(_) => "setHeatMap",
            Intent::SelectTab(_) => "selectTab",
        }
    }
}

/// Cloneable dispatch handle handed to view adapters
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::UnboundedSender<Intent>,
}

/// Owner side of the intent queue
#[derive(Debug)]
pub struct IntentReceiver {
    rx: mpsc::UnboundedReceiver<Intent>,
}

/// Create a connected sender/receiver pair
pub fn intent_channel() -> (IntentSender, IntentReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IntentSender { tx }, IntentReceiver { rx })
}

impl IntentSender {
    /// Queue an intent for the owner. Returns false once the owner is gone.
    pub fn dispatch(&self, intent: Intent) -> bool {
        match self.tx.send(intent) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("Dropping intent {} after dispose", err.0.name());
                false
            }
        }
    }
}

impl IntentReceiver {
    /// Pop the next queued intent without waiting
    pub fn try_next(&mut self) -> Option<Intent> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn close(&mut self) {
        self.rx.close();
    }
}
