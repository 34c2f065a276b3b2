//! Selector engine: pure derivations of what the views display
//!
//! Nothing in here performs I/O or touches shared state. [`Selectors`] wraps
//! the functions with memoization so they can be called after every state
//! change without recomputing for unrelated toggles.

mod memo;

pub use memo::{SelectorStats, Selectors};

use std::cmp::Ordering;
use std::fmt;

use ahash::AHashSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::query::{QueryState, SortDirection, SortSpec};
use crate::record::{FieldId, FieldValue, RawResult};

/// Key of one bucket in the statistics view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKey {
    Value(String),
    /// Reserved bucket for results without a value in the grouping field
    Unknown,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Value(v) => f.write_str(v),
            GroupKey::Unknown => f.write_str("Unknown"),
        }
    }
}

impl GroupKey {
    /// Bucket of a field value; missing and blank values share `Unknown`
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Missing => GroupKey::Unknown,
            FieldValue::Text(s) if s.trim().is_empty() => GroupKey::Unknown,
            other => GroupKey::Value(other.to_string()),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey::Value(value.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        GroupKey::Value(value)
    }
}

/// Aggregated measure per group, in first-seen order
pub type VisibleValues = IndexMap<GroupKey, f64>;

/// Distinct values with counts for each filterable field
pub type Facets = IndexMap<FieldId, IndexMap<GroupKey, usize>>;

/// Aggregate function applied per group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Aggregation {
    /// Number of results in the group
    #[default]
    Count,
    /// Sum of a numeric field; non-numeric values count as zero
    Sum(FieldId),
    /// Number of distinct values of a field within the group
    Distinct(FieldId),
}

/// Free-text constraint: case-insensitive substring over the searchable fields.
///
/// An empty `search_fields` list means every text field is searchable.
fn matches_text(result: &RawResult, needle: &str, search_fields: &[FieldId]) -> bool {
    let contains = |value: &FieldValue| match value {
        FieldValue::Text(s) => s.to_lowercase().contains(needle),
        _ => false,
    };
    if search_fields.is_empty() {
        result.fields.values().any(contains)
    } else {
        search_fields.iter().any(|field| contains(&result.value(field)))
    }
}

/// Filtered and sorted projection of the raw result set.
///
/// The predicate is the conjunction of the dataset toggles, the free-text
/// constraint and the per-field results filter; each one passes everything
/// through when it is empty. Sorting is stable: equal keys keep fetch order in
/// both directions.
pub fn derive_visible_results(
    raw: &[RawResult],
    query: &QueryState,
    search_fields: &[FieldId],
) -> Vec<RawResult> {
    let needle = query.text.trim().to_lowercase();
    let filter = &query.results_filter;

    let mut visible: Vec<RawResult> = raw
        .iter()
        .filter(|r| query.dataset_toggles.is_empty() || query.dataset_toggles.contains(&r.dataset))
        .filter(|r| needle.is_empty() || matches_text(r, &needle, search_fields))
        .filter(|r| {
            filter
                .constraints()
                .all(|(field, allowed)| allowed.contains(&GroupKey::of(&r.value(field))))
        })
        .cloned()
        .collect();

    if let Some(sort) = &query.sort {
        sort_results(&mut visible, sort);
    }
    visible
}

/// Stable sort on `sort.field`; descending reverses the comparator, not the ties
pub fn sort_results(results: &mut [RawResult], sort: &SortSpec) {
    results.sort_by(|a, b| {
        let ordering = compare_field(a, b, &sort.field);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => match (a.value(&sort.field), b.value(&sort.field)) {
                // keep missing values at the end in both directions
                (FieldValue::Missing, _) | (_, FieldValue::Missing) => ordering,
                _ => ordering.reverse(),
            },
        }
    });
}

fn compare_field(a: &RawResult, b: &RawResult, field: &str) -> Ordering {
    a.value(field).sort_cmp(&b.value(field))
}

/// Aggregate visible results per group.
///
/// Returns an empty mapping when there is no grouping field. Every result
/// lands in exactly one bucket, so with [`Aggregation::Count`] the values sum
/// to `visible.len()`.
pub fn derive_visible_values(
    visible: &[RawResult],
    group_by: Option<&str>,
    aggregation: &Aggregation,
) -> VisibleValues {
    let Some(group_by) = group_by else {
        return VisibleValues::new();
    };

    let mut values = VisibleValues::new();
    let mut distinct: IndexMap<GroupKey, AHashSet<String>> = IndexMap::new();

    for result in visible {
        let key = GroupKey::of(&result.value(group_by));
        match aggregation {
            Aggregation::Count => *values.entry(key).or_insert(0.0) += 1.0,
            Aggregation::Sum(field) => {
                let measure = result.value(field).as_number().unwrap_or(0.0);
                *values.entry(key).or_insert(0.0) += measure;
            }
            Aggregation::Distinct(field) => {
                let seen = distinct.entry(key.clone()).or_default();
                let value = result.value(field);
                if !value.is_missing() {
                    seen.insert(value.to_string());
                }
                values.insert(key, seen.len() as f64);
            }
        }
    }
    values
}

/// Distinct values and their counts for each of `fields`, used by filter menus
pub fn derive_facets(results: &[RawResult], fields: &[FieldId]) -> Facets {
    fields
        .iter()
        .map(|field| {
            let mut counts: IndexMap<GroupKey, usize> = IndexMap::new();
            for result in results {
                *counts.entry(GroupKey::of(&result.value(field))).or_insert(0) += 1;
            }
            counts.sort_by(|ka, va, kb, vb| vb.cmp(va).then_with(|| ka.cmp(kb)));
            (field.clone(), counts)
        })
        .collect()
}
