//! Explorer configuration
//!
//! Every field has a default so a partial TOML file is enough. Durations are
//! written in humantime form (`"250ms"`, `"10s"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutConfig;
use crate::record::{DatasetId, FieldId};
use crate::selectors::Aggregation;
use crate::ExplorerError;

/// Top-level configuration for an [`Explorer`](crate::Explorer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub suggestions: ChannelConfig,
    pub results: ChannelConfig,
    pub geometry: ChannelConfig,

    /// Quiet window applied to suggestion triggers
    pub debounce: DebounceConfig,

    /// Abort the transport task of a superseded or cancelled request
    pub abort_superseded: bool,

    pub selectors: SelectorConfig,
    pub layout: LayoutConfig,
    pub coordinates: CoordinateFields,

    /// Datasets switched on at creation
    pub initial_datasets: Vec<DatasetId>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            suggestions: ChannelConfig {
                timeout: Some(Duration::from_secs(5)),
            },
            results: ChannelConfig::default(),
            geometry: ChannelConfig::default(),
            debounce: DebounceConfig::default(),
            abort_superseded: false,
            selectors: SelectorConfig::default(),
            layout: LayoutConfig::default(),
            coordinates: CoordinateFields::default(),
            initial_datasets: Vec::new(),
        }
    }
}

impl ExplorerConfig {
    /// Reject settings the coordinator cannot honour
    pub fn validate(&self) -> Result<(), ExplorerError> {
        for (name, channel) in [
            ("suggestions", &self.suggestions),
            ("results", &self.results),
            ("geometry", &self.geometry),
        ] {
            if channel.timeout == Some(Duration::ZERO) {
                return Err(ExplorerError::Config(format!("{name} timeout must be non-zero")));
            }
        }
        if self.layout.table_width == 0 {
            return Err(ExplorerError::Config("layout.table_width must be non-zero".into()));
        }
        Ok(())
    }
}

/// Per-channel settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// A request that takes longer fails with a timeout
    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// How suggestion triggers inside the quiet window are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Drop triggers arriving within the window of the last issued one
    #[default]
    Discard,
    /// Keep the latest dropped trigger and issue it once the window has passed
    Trailing,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    #[serde(with = "humantime_req")]
    pub quiet_window: Duration,
    pub mode: DebounceMode,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_window: Duration::from_millis(250),
            mode: DebounceMode::Discard,
        }
    }
}

/// Selector engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Text fields the free-text constraint looks at; empty means every text field
    pub search_fields: Vec<FieldId>,
    pub aggregation: Aggregation,
    /// Fields offered in the table's filter menus
    pub facet_fields: Vec<FieldId>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            search_fields: vec!["label".to_string()],
            aggregation: Aggregation::Count,
            facet_fields: vec!["type".to_string(), "area".to_string(), "dataset".to_string()],
        }
    }
}

/// Names of the coordinate fields on result records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateFields {
    pub lat: FieldId,
    pub lon: FieldId,
}

impl Default for CoordinateFields {
    fn default() -> Self {
        Self {
            lat: "lat".to_string(),
            lon: "long".to_string(),
        }
    }
}

mod humantime_req {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
