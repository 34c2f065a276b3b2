//! Statistics view: pie chart of the grouped visible values

use std::any::Any;
use std::fmt::Write as _;

use ns_core::{ExplorerSnapshot, FieldId, GroupKey, Intent, IntentSender, ViewKind};
use uuid::Uuid;

use crate::{ViewAdapter, ViewId};

/// One slice of the pie
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub key: GroupKey,
    pub value: f64,
    /// Share of the total, in `0.0..=1.0`
    pub fraction: f64,
}

pub struct ChartAdapter {
    id: ViewId,
    dispatcher: IntentSender,
    /// Fields offered in the group-by picker
    pub group_fields: Vec<FieldId>,
    group_by: Option<FieldId>,
    slices: Vec<Slice>,
}

impl ChartAdapter {
    pub fn new(dispatcher: IntentSender, group_fields: Vec<FieldId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            dispatcher,
            group_fields,
            group_by: None,
            slices: Vec::new(),
        }
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    /// Nothing to draw: no grouping field or no visible results
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn select_group_by(&self, field: Option<&str>) {
        self.dispatcher.dispatch(Intent::SetGroupBy(field.map(str::to_string)));
    }
}

impl ViewAdapter for ChartAdapter {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Chart
    }

    fn view_type(&self) -> &str {
        "PieChartView"
    }

    fn sync(&mut self, snapshot: &ExplorerSnapshot) {
        self.group_by = snapshot.query.group_by.clone();

        let total: f64 = snapshot.values.values().sum();
        self.slices = snapshot
            .values
            .iter()
            .map(|(key, value)| Slice {
                key: key.clone(),
                value: *value,
                fraction: if total > 0.0 { value / total } else { 0.0 },
            })
            .collect();
    }

    fn render_text(&self) -> String {
        let Some(group_by) = &self.group_by else {
            return "Statistics\n  pick a field to group by\n".to_string();
        };
        let mut out = format!("Statistics by {group_by}\n");
        if self.slices.is_empty() {
            let _ = writeln!(out, "  No results");
        }
        for slice in &self.slices {
            let _ = writeln!(out, "  {:<24} {:>8} {:>5.1}%", slice.key.to_string(), slice.value, slice.fraction * 100.0);
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshot_with;
    use ns_core::query::intent_channel;
    use ns_core::VisibleValues;
    use std::sync::Arc;

    #[test]
    fn test_slices_with_fractions() {
        let (tx, _rx) = intent_channel();
        let mut chart = ChartAdapter::new(tx, vec!["type".into()]);

        let mut snapshot = snapshot_with(Vec::new());
        snapshot.query.group_by = Some("type".into());
        let mut values = VisibleValues::new();
        values.insert(GroupKey::Value("church".into()), 3.0);
        values.insert(GroupKey::Unknown, 1.0);
        snapshot.values = Arc::new(values);
        chart.sync(&snapshot);

        assert_eq!(chart.slices().len(), 2);
        assert_eq!(chart.slices()[0].fraction, 0.75);
        assert_eq!(chart.slices()[1].key, GroupKey::Unknown);
        let total: f64 = chart.slices().iter().map(|s| s.fraction).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_without_group_by() {
        let (tx, mut rx) = intent_channel();
        let mut chart = ChartAdapter::new(tx, vec!["type".into()]);
        chart.sync(&snapshot_with(Vec::new()));

        assert!(chart.is_empty());
        assert!(chart.render_text().contains("group by"));

        chart.select_group_by(Some("type"));
        assert_eq!(rx.try_next(), Some(Intent::SetGroupBy(Some("type".into()))));
    }
}
