//! Result records as returned by the search backend

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Backend-assigned identity of a result
pub type ResultId = String;

/// Identifier of a dataset (data source) a result belongs to
pub type DatasetId = String;

/// Name of a field on a result record
pub type FieldId = String;

/// A single field value on a result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Parse a raw cell, treating empty cells as missing and numeric cells as numbers
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FieldValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => FieldValue::Number(n),
            _ => FieldValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Compare two values for sorting.
    ///
    /// A total order: numbers first, compared numerically, then text compared
    /// lexicographically, then missing values.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.total_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (a, b) => a.sort_rank().cmp(&b.sort_rank()),
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            FieldValue::Number(_) => 0,
            FieldValue::Text(_) => 1,
            FieldValue::Missing => 2,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Missing => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

static MISSING: FieldValue = FieldValue::Missing;

/// One record of the raw result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub id: ResultId,
    pub dataset: DatasetId,
    #[serde(default)]
    pub fields: IndexMap<FieldId, FieldValue>,
}

impl RawResult {
    pub fn new(id: impl Into<ResultId>, dataset: impl Into<DatasetId>) -> Self {
        Self {
            id: id.into(),
            dataset: dataset.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, field: impl Into<FieldId>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Value of `field`, or `Missing` when the record does not carry it.
    ///
    /// `dataset` and `id` are addressable as pseudo-fields so that they can be
    /// sorted and grouped on like any other column.
    pub fn value(&self, field: &str) -> FieldValue {
        match field {
            "id" if !self.fields.contains_key("id") => FieldValue::Text(self.id.clone()),
            "dataset" if !self.fields.contains_key("dataset") => FieldValue::Text(self.dataset.clone()),
            _ => self.fields.get(field).unwrap_or(&MISSING).clone(),
        }
    }

    /// Borrowing lookup for regular fields
    pub fn field(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&MISSING)
    }

    /// Latitude/longitude pair when both coordinates are present
    pub fn coordinates(&self, lat_field: &str, lon_field: &str) -> Option<(f64, f64)> {
        let lat = self.field(lat_field).as_number()?;
        let lon = self.field(lon_field).as_number()?;
        Some((lat, lon))
    }
}

/// Entry returned by the suggestion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    #[serde(default)]
    pub count: Option<usize>,
}

impl Suggestion {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: None,
        }
    }
}
