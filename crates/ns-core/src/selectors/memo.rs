//! Memoized selectors

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{derive_facets, derive_visible_results, derive_visible_values, Aggregation, Facets, VisibleValues};
use crate::config::SelectorConfig;
use crate::query::{QueryState, ResultsFilter, SortSpec};
use crate::record::{DatasetId, FieldId, RawResult};

/// The parts of the query state the visible results depend on
#[derive(Debug, Clone, PartialEq)]
struct VisibleKey {
    raw_revision: u64,
    text: String,
    datasets: BTreeSet<DatasetId>,
    filter: ResultsFilter,
    sort: Option<SortSpec>,
}

impl VisibleKey {
    fn new(raw_revision: u64, query: &QueryState) -> Self {
        Self {
            raw_revision,
            text: query.text.trim().to_lowercase(),
            datasets: query.dataset_toggles.clone(),
            filter: query.results_filter.clone(),
            sort: query.sort.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ValuesKey {
    visible_revision: u64,
    group_by: Option<FieldId>,
    aggregation: Aggregation,
}

/// How often each derivation actually ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorStats {
    pub visible_recomputes: usize,
    pub values_recomputes: usize,
    pub facet_recomputes: usize,
}

/// Holds the raw result set and caches every derivation on its inputs.
///
/// Map mode, analysis view, result format, tab and layout changes are not
/// part of any key, so they never cause a re-filter or re-sort.
pub struct Selectors {
    config: SelectorConfig,

    raw: Arc<[RawResult]>,
    raw_revision: u64,

    visible_key: Option<VisibleKey>,
    visible: Arc<[RawResult]>,
    visible_revision: u64,

    values_key: Option<ValuesKey>,
    values: Arc<VisibleValues>,

    facets_revision: Option<u64>,
    facets: Arc<Facets>,

    stats: SelectorStats,
}

impl Selectors {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            raw: Arc::from(Vec::new()),
            raw_revision: 0,
            visible_key: None,
            visible: Arc::from(Vec::new()),
            visible_revision: 0,
            values_key: None,
            values: Arc::new(VisibleValues::new()),
            facets_revision: None,
            facets: Arc::new(Facets::new()),
            stats: SelectorStats::default(),
        }
    }

    /// Replace the raw result set
    pub fn set_raw(&mut self, raw: impl Into<Arc<[RawResult]>>) {
        self.raw = raw.into();
        self.raw_revision += 1;
    }

    /// Drop the raw result set
    pub fn clear_raw(&mut self) {
        self.set_raw(Vec::<RawResult>::new());
    }

    pub fn raw(&self) -> Arc<[RawResult]> {
        self.raw.clone()
    }

    pub fn raw_revision(&self) -> u64 {
        self.raw_revision
    }

    pub fn stats(&self) -> SelectorStats {
        self.stats
    }

    /// Visible results for `query`, recomputed only when an input changed
    pub fn visible(&mut self, query: &QueryState) -> Arc<[RawResult]> {
        let key = VisibleKey::new(self.raw_revision, query);
        if self.visible_key.as_ref() != Some(&key) {
            let visible = derive_visible_results(&self.raw, query, &self.config.search_fields);
            tracing::debug!(
                "Recomputed visible results: {} of {} raw (revision {})",
                visible.len(),
                self.raw.len(),
                self.raw_revision
            );
            self.visible = Arc::from(visible);
            self.visible_revision += 1;
            self.visible_key = Some(key);
            self.stats.visible_recomputes += 1;
        }
        self.visible.clone()
    }

    /// Grouped values for the statistics view
    pub fn values(&mut self, query: &QueryState) -> Arc<VisibleValues> {
        let visible = self.visible(query);
        let key = ValuesKey {
            visible_revision: self.visible_revision,
            group_by: query.group_by.clone(),
            aggregation: self.config.aggregation.clone(),
        };
        if self.values_key.as_ref() != Some(&key) {
            self.values = Arc::new(derive_visible_values(
                &visible,
                query.group_by.as_deref(),
                &self.config.aggregation,
            ));
            self.values_key = Some(key);
            self.stats.values_recomputes += 1;
        }
        self.values.clone()
    }

    /// Filter-menu options, derived from the raw set so that choosing a value
    /// does not hide the alternatives
    pub fn facets(&mut self) -> Arc<Facets> {
        if self.facets_revision != Some(self.raw_revision) {
            self.facets = Arc::new(derive_facets(&self.raw, &self.config.facet_fields));
            self.facets_revision = Some(self.raw_revision);
            self.stats.facet_recomputes += 1;
        }
        self.facets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ResultFormat, SortDirection, ViewKind};

    fn selectors_with(raw: Vec<RawResult>) -> Selectors {
        let mut selectors = Selectors::new(SelectorConfig::default());
        selectors.set_raw(raw);
        selectors
    }

    fn sample() -> Vec<RawResult> {
        vec![
            RawResult::new("1", "A").with("label", "Kirkko").with("type", "church"),
            RawResult::new("2", "B").with("label", "Järvi").with("type", "lake"),
        ]
    }

    #[test]
    fn test_view_mode_toggles_do_not_recompute() {
        let mut selectors = selectors_with(sample());
        let mut query = QueryState::default();
        query.group_by = Some("type".into());

        selectors.values(&query);
        let before = selectors.stats();

        query.heat_map = true;
        query.analysis_view = true;
        query.result_format = ResultFormat::Other;
        query.active_tab = ViewKind::Chart;
        selectors.visible(&query);
        selectors.values(&query);

        assert_eq!(selectors.stats(), before);
    }

    #[test]
    fn test_group_by_change_only_regroups() {
        let mut selectors = selectors_with(sample());
        let mut query = QueryState::default();
        selectors.values(&query);

        query.group_by = Some("dataset".into());
        let values = selectors.values(&query);

        assert_eq!(values.len(), 2);
        assert_eq!(selectors.stats().visible_recomputes, 1);
        assert_eq!(selectors.stats().values_recomputes, 2);
    }

    #[test]
    fn test_sort_and_new_raw_recompute() {
        let mut selectors = selectors_with(sample());
        let mut query = QueryState::default();
        selectors.visible(&query);

        query.sort = Some(SortSpec { field: "label".into(), direction: SortDirection::Asc });
        let sorted = selectors.visible(&query);
        assert_eq!(sorted[0].id, "2");

        selectors.set_raw(sample());
        selectors.visible(&query);
        assert_eq!(selectors.stats().visible_recomputes, 3);
    }

    #[test]
    fn test_facets_follow_raw_revision() {
        let mut selectors = selectors_with(sample());
        selectors.facets();
        selectors.facets();
        assert_eq!(selectors.stats().facet_recomputes, 1);

        selectors.clear_raw();
        assert!(selectors.facets().values().all(|counts| counts.is_empty()));
        assert_eq!(selectors.stats().facet_recomputes, 2);
    }
}
