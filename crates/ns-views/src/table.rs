//! Table and list views of the visible results

use std::any::Any;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;
use ns_core::selectors::Facets;
use ns_core::{
    Channel, ExplorerSnapshot, FieldId, FilterUpdate, GroupKey, Intent, IntentSender, RawResult, ResultFormat, SortDirection,
    SortSpec, ViewKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ViewAdapter, ViewId};

/// Configuration for table views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub columns: Vec<FieldId>,
    pub max_rows_displayed: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                "label".to_string(),
                "type".to_string(),
                "area".to_string(),
                "dataset".to_string(),
            ],
            max_rows_displayed: 50,
        }
    }
}

/// One entry of a column's filter menu
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOption {
    pub key: GroupKey,
    /// Label shown in the menu
    pub value: String,
    pub count: usize,
    pub selected: bool,
}

/// Sortable, filterable table of the visible results
pub struct TableAdapter {
    id: ViewId,
    title: String,
    pub config: TableConfig,
    dispatcher: IntentSender,

    rows: Arc<[RawResult]>,
    raw_count: usize,
    sort: Option<SortSpec>,
    filter_options: IndexMap<FieldId, Vec<FilterOption>>,
    loading: bool,
    notice: Option<String>,
}

impl TableAdapter {
    /// Create a new table view
    pub fn new(dispatcher: IntentSender, config: TableConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: "Results".to_string(),
            config,
            dispatcher,
            rows: Arc::from(Vec::new()),
            raw_count: 0,
            sort: None,
            filter_options: IndexMap::new(),
            loading: false,
            notice: None,
        }
    }

    pub fn rows(&self) -> &[RawResult] {
        &self.rows
    }

    /// No rows to show; rendered as an explicit empty state
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Direction arrow to show on a column header
    pub fn sort_indicator(&self, field: &str) -> Option<SortDirection> {
        self.sort
            .as_ref()
            .filter(|sort| sort.field == field)
            .map(|sort| sort.direction)
    }

    pub fn filter_options(&self, field: &str) -> &[FilterOption] {
        self.filter_options.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cell strings of the displayed rows
    pub fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(self.config.max_rows_displayed)
            .map(|row| {
                self.config
                    .columns
                    .iter()
                    .map(|column| row.value(column).to_string())
                    .collect()
            })
            .collect()
    }

    /// Header click: ascending first, then flip
    pub fn click_header(&self, field: &str) {
        let direction = match self.sort_indicator(field) {
            Some(direction) => direction.flipped(),
            None => SortDirection::Asc,
        };
        self.dispatcher.dispatch(Intent::SortResults {
            field: field.to_string(),
            direction,
        });
    }

    pub fn toggle_filter(&self, field: &str, key: GroupKey) {
        self.dispatcher.dispatch(Intent::UpdateResultsFilter(FilterUpdate::Toggle {
            field: field.to_string(),
            value: key,
        }));
    }

    pub fn clear_filters(&self) {
        self.dispatcher.dispatch(Intent::UpdateResultsFilter(FilterUpdate::ClearAll));
    }

    pub fn toggle_dataset(&self, dataset: &str) {
        self.dispatcher.dispatch(Intent::ToggleDataset(dataset.to_string()));
    }

    pub fn set_format(&self, format: ResultFormat) {
        self.dispatcher.dispatch(Intent::UpdateResultFormat(format));
    }

    fn build_filter_options(facets: &Facets, snapshot: &ExplorerSnapshot) -> IndexMap<FieldId, Vec<FilterOption>> {
        facets
            .iter()
            .map(|(field, counts)| {
                let allowed = snapshot.query.results_filter.allowed(field);
                let options = counts
                    .iter()
                    .map(|(key, count)| FilterOption {
                        key: key.clone(),
                        value: key.to_string(),
                        count: *count,
                        selected: allowed.is_some_and(|set| set.contains(key)),
                    })
                    .collect();
                (field.clone(), options)
            })
            .collect()
    }
}

impl ViewAdapter for TableAdapter {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Table
    }

    fn view_type(&self) -> &str {
        "TableView"
    }

    fn sync(&mut self, snapshot: &ExplorerSnapshot) {
        self.rows = snapshot.visible.clone();
        self.raw_count = snapshot.raw_count;
        self.sort = snapshot.query.sort.clone();
        self.filter_options = Self::build_filter_options(&snapshot.facets, snapshot);
        self.loading = snapshot.channel(Channel::Results).is_in_flight();
        self.notice = snapshot.notice(Channel::Results).map(|notice| notice.message());
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({} of {})", self.title, self.rows.len(), self.raw_count);
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "  ! {notice}");
        }
        if self.loading {
            let _ = writeln!(out, "  loading...");
        }
        if self.is_empty() {
            let _ = writeln!(out, "  No results");
            return out;
        }

        let header: Vec<String> = self
            .config
            .columns
            .iter()
            .map(|column| match self.sort_indicator(column) {
                Some(SortDirection::Asc) => format!("{column} ^"),
                Some(SortDirection::Desc) => format!("{column} v"),
                None => column.clone(),
            })
            .collect();
        let _ = writeln!(out, "  {}", header.join(" | "));
        for row in self.cells() {
            let _ = writeln!(out, "  {}", row.join(" | "));
        }
        if self.rows.len() > self.config.max_rows_displayed {
            let _ = writeln!(out, "  ... {} more", self.rows.len() - self.config.max_rows_displayed);
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

}

/// Compact label list mounted in the table slot for [`ResultFormat::Other`]
pub struct ListAdapter {
    id: ViewId,
    label_field: FieldId,
    dispatcher: IntentSender,
    labels: Vec<String>,
}

impl ListAdapter {
    pub fn new(dispatcher: IntentSender, label_field: FieldId) -> Self {
        Self {
            id: Uuid::new_v4(),
            label_field,
            dispatcher,
            labels: Vec::new(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Switch back to the table
    pub fn show_table(&self) {
        self.dispatcher.dispatch(Intent::UpdateResultFormat(ResultFormat::Table));
    }
}

impl ViewAdapter for ListAdapter {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Table
    }

    fn view_type(&self) -> &str {
        "ListView"
    }

    fn sync(&mut self, snapshot: &ExplorerSnapshot) {
        self.labels = snapshot
            .visible
            .iter()
            .map(|result| match result.value(&self.label_field).as_text() {
                Some(label) => label.to_string(),
                None => result.id.clone(),
            })
            .collect();
    }

    fn render_text(&self) -> String {
        if self.labels.is_empty() {
            return "Result list\n  No results\n".to_string();
        }
        let mut out = format!("Result list ({})\n", self.labels.len());
        for label in &self.labels {
            let _ = writeln!(out, "  - {label}");
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

}
