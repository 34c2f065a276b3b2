use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use geojson::{feature, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use ns_core::config::CoordinateFields;
use ns_core::query::{GeometryParams, SearchParams};
use ns_core::{FieldId, FieldValue, GeometryKey, GeometryService, RawResult, SearchService, Suggestion, SuggestionService};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Settings for [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBackendConfig {
    /// Text fields matched by a search; empty means every text field
    pub search_fields: Vec<FieldId>,
    /// Field whose values are offered as suggestions
    pub suggestion_field: FieldId,
    pub suggestion_limit: usize,
    pub coordinates: CoordinateFields,
    /// Artificial delay added to every call, in milliseconds
    pub latency_ms: Option<u64>,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            search_fields: vec!["label".to_string()],
            suggestion_field: "label".to_string(),
            suggestion_limit: 10,
            coordinates: CoordinateFields::default(),
            latency_ms: None,
        }
    }
}

/// Search, suggestion and geometry services over an in-memory place table
pub struct MemoryBackend {
    config: MemoryBackendConfig,
    places: Arc<RwLock<Vec<RawResult>>>,
}

impl MemoryBackend {
    /// Create a new backend over `places`
    pub fn new(places: Vec<RawResult>, config: MemoryBackendConfig) -> Self {
        Self {
            config,
            places: Arc::new(RwLock::new(places)),
        }
    }

    pub fn len(&self) -> usize {
        self.places.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.read().is_empty()
    }

    /// Distinct dataset ids, in table order
    pub fn datasets(&self) -> Vec<String> {
        let mut datasets: Vec<String> = Vec::new();
        for place in self.places.read().iter() {
            if !datasets.contains(&place.dataset) {
                datasets.push(place.dataset.clone());
            }
        }
        datasets
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.config.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn in_datasets(place: &RawResult, datasets: &[String]) -> bool {
        datasets.is_empty() || datasets.contains(&place.dataset)
    }

    fn matches(&self, place: &RawResult, needle: &str) -> bool {
        let contains = |value: &FieldValue| value.as_text().is_some_and(|s| s.to_lowercase().contains(needle));
        if self.config.search_fields.is_empty() {
            place.fields.values().any(contains)
        } else {
            self.config.search_fields.iter().any(|field| contains(place.field(field)))
        }
    }

    fn feature(&self, place: &RawResult, detailed: bool) -> Option<Feature> {
        let (lat, lon) = place.coordinates(&self.config.coordinates.lat, &self.config.coordinates.lon)?;

        let mut properties = JsonObject::new();
        properties.insert("dataset".to_string(), place.dataset.clone().into());
        if detailed {
            for (name, value) in &place.fields {
                if let Ok(json) = serde_json::to_value(value) {
                    properties.insert(name.clone(), json);
                }
            }
        } else if let Some(label) = place.field("label").as_text() {
            properties.insert("label".to_string(), label.into());
        }

        Some(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
            id: Some(feature::Id::String(place.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        })
    }
}

#[async_trait]
impl SearchService for MemoryBackend {
    async fn search(&self, params: &SearchParams) -> anyhow::Result<Vec<RawResult>> {
        self.simulate_latency().await;
        let needle = params.text.trim().to_lowercase();

        let results: Vec<RawResult> = self
            .places
            .read()
            .iter()
            .filter(|place| Self::in_datasets(place, &params.datasets))
            .filter(|place| needle.is_empty() || self.matches(place, &needle))
            .cloned()
            .collect();

        tracing::debug!("Search {:?} matched {} places", params.text, results.len());
        Ok(results)
    }
}

#[async_trait]
impl SuggestionService for MemoryBackend {
    async fn suggest(&self, text: &str) -> anyhow::Result<Vec<Suggestion>> {
        self.simulate_latency().await;
        let prefix = text.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut counts: AHashMap<String, usize> = AHashMap::new();
        for place in self.places.read().iter() {
            if let Some(label) = place.field(&self.config.suggestion_field).as_text() {
                if label.to_lowercase().starts_with(&prefix) {
                    *counts.entry(label.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut suggestions: Vec<Suggestion> = counts
            .into_iter()
            .map(|(label, count)| Suggestion {
                label,
                count: Some(count),
            })
            .collect();
        suggestions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        suggestions.truncate(self.config.suggestion_limit);
        Ok(suggestions)
    }
}

#[async_trait]
impl GeometryService for MemoryBackend {
    async fn geometry(&self, key: GeometryKey, params: &GeometryParams) -> anyhow::Result<GeoJson> {
        self.simulate_latency().await;

        let features: Vec<Feature> = self
            .places
            .read()
            .iter()
            .filter(|place| Self::in_datasets(place, &params.datasets))
            .filter_map(|place| self.feature(place, params.analysis_view))
            .collect();

        tracing::debug!("Built geometry {} with {} features", key, features.len());

        let mut foreign_members = JsonObject::new();
        foreign_members.insert("key".to_string(), key.0.into());

        Ok(GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        let places = vec![
            RawResult::new("1", "A")
                .with("label", "Tuomiokirkko")
                .with("type", "church")
                .with("lat", 60.45)
                .with("long", 22.27),
            RawResult::new("2", "A").with("label", "Näsijärvi").with("type", "lake"),
            RawResult::new("3", "B")
                .with("label", "Tuomiokirkko")
                .with("lat", 61.5)
                .with("long", 23.76),
            RawResult::new("4", "B").with("label", "Tuorila"),
        ];
        MemoryBackend::new(places, MemoryBackendConfig::default())
    }

    #[tokio::test]
    async fn test_search_by_text_and_dataset() {
        let backend = backend();
        let params = SearchParams {
            text: "kirkko".into(),
            datasets: vec!["A".into()],
        };
        let results = backend.search(&params).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");

        let params = SearchParams {
            text: String::new(),
            datasets: Vec::new(),
        };
        assert_eq!(backend.search(&params).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_suggestions_ranked_by_count() {
        let backend = backend();
        let suggestions = backend.suggest("tuo").await.unwrap();
        let labels: Vec<_> = suggestions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Tuomiokirkko", "Tuorila"]);
        assert_eq!(suggestions[0].count, Some(2));

        assert!(backend.suggest("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geometry_points_for_selected_datasets() {
        let backend = backend();
        let params = GeometryParams {
            datasets: vec!["B".into()],
            analysis_view: false,
        };
        let payload = backend.geometry(GeometryKey(7), &params).await.unwrap();

        let GeoJson::FeatureCollection(collection) = payload else {
            panic!("expected a feature collection");
        };
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.id, Some(feature::Id::String("3".into())));
        assert_eq!(
            collection.foreign_members.as_ref().and_then(|m| m.get("key")).and_then(|v| v.as_u64()),
            Some(7)
        );
    }

    #[test]
    fn test_datasets_in_table_order() {
        assert_eq!(backend().datasets(), vec!["A".to_string(), "B".to_string()]);
    }
}
