//! Query/filter state: the canonical description of what the user wants to see

mod intent;

pub use intent::{intent_channel, Intent, IntentReceiver, IntentSender};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::record::{DatasetId, FieldId};
use crate::selectors::GroupKey;

/// Sort direction for the results table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Active sort column and direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: FieldId,
    pub direction: SortDirection,
}

/// How the result list is presented in the table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResultFormat {
    #[default]
    Table,
    Other,
}

/// The three views fed by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewKind {
    #[default]
    Table,
    Map,
    Chart,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Table, ViewKind::Map, ViewKind::Chart];
}

/// Per-field allowed values selected in the table's filter menus.
///
/// A field with a non-empty set keeps only results whose [`GroupKey`] is in
/// the set, so the `Unknown` facet selects missing and blank values. Fields
/// without an entry do not restrict anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultsFilter {
    allowed: BTreeMap<FieldId, BTreeSet<GroupKey>>,
}

impl ResultsFilter {
    pub fn is_empty(&self) -> bool {
        self.allowed.values().all(BTreeSet::is_empty)
    }

    /// Iterate over the restricting fields
    pub fn constraints(&self) -> impl Iterator<Item = (&FieldId, &BTreeSet<GroupKey>)> {
        self.allowed.iter().filter(|(_, values)| !values.is_empty())
    }

    pub fn allowed(&self, field: &str) -> Option<&BTreeSet<GroupKey>> {
        self.allowed.get(field).filter(|values| !values.is_empty())
    }

    /// Apply a filter update coming from a view
    pub fn apply(&mut self, update: FilterUpdate) {
        match update {
            FilterUpdate::Toggle { field, value } => {
                let values = self.allowed.entry(field.clone()).or_default();
                if !values.remove(&value) {
                    values.insert(value);
                }
                if values.is_empty() {
                    self.allowed.remove(&field);
                }
            }
            FilterUpdate::ClearField(field) => {
                self.allowed.remove(&field);
            }
            FilterUpdate::ClearAll => self.allowed.clear(),
        }
    }
}

/// Change to the local results filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterUpdate {
    /// Flip membership of `value` in the allowed set of `field`
    Toggle { field: FieldId, value: GroupKey },
    ClearField(FieldId),
    ClearAll,
}

/// Canonical query state, owned by the orchestration core.
///
/// Views never write to it; every change goes through an [`Intent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryState {
    pub text: String,
    pub dataset_toggles: BTreeSet<DatasetId>,
    pub group_by: Option<FieldId>,
    pub sort: Option<SortSpec>,
    pub results_filter: ResultsFilter,
    pub result_format: ResultFormat,
    pub analysis_view: bool,
    pub heat_map: bool,
    /// Tab shown when the layout collapses to one column
    pub active_tab: ViewKind,
}

impl QueryState {
    /// Initial state with the given datasets switched on
    pub fn with_datasets<I, S>(datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DatasetId>,
    {
        Self {
            dataset_toggles: datasets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Flip a dataset toggle, returning whether it is now active
    pub(crate) fn toggle_dataset(&mut self, id: DatasetId) -> bool {
        if self.dataset_toggles.remove(&id) {
            false
        } else {
            self.dataset_toggles.insert(id);
            true
        }
    }

    /// Parameters sent to the search service
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            text: self.text.trim().to_string(),
            datasets: self.dataset_toggles.iter().cloned().collect(),
        }
    }

    /// Parameters sent to the geometry service
    pub fn geometry_params(&self) -> GeometryParams {
        GeometryParams {
            datasets: self.dataset_toggles.iter().cloned().collect(),
            analysis_view: self.analysis_view,
        }
    }
}

/// Search request derived from the query state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub text: String,
    pub datasets: Vec<DatasetId>,
}

/// Geometry request derived from the query state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryParams {
    pub datasets: Vec<DatasetId>,
    pub analysis_view: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_toggle_round_trips_to_empty() {
        let mut filter = ResultsFilter::default();
        filter.apply(FilterUpdate::Toggle { field: "type".into(), value: "Kirkko".into() });
        assert_eq!(filter.allowed("type").map(|s| s.len()), Some(1));

        filter.apply(FilterUpdate::Toggle { field: "type".into(), value: "Kirkko".into() });
        assert!(filter.is_empty());
        assert!(filter.allowed("type").is_none());
    }

    #[test]
    fn test_toggle_dataset() {
        let mut state = QueryState::with_datasets(["A"]);
        assert!(!state.toggle_dataset("A".into()));
        assert!(state.toggle_dataset("B".into()));
        assert_eq!(state.search_params().datasets, vec!["B".to_string()]);
    }
}
