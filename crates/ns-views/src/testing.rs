//! Snapshot builders for adapter tests

use std::sync::Arc;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use ns_core::config::CoordinateFields;
use ns_core::geometry::{GeometryCacheEntry, GeometryView};
use ns_core::selectors::Facets;
use ns_core::{
    compose_layout, Breakpoint, ExplorerSnapshot, FetchState, GeometryKey, GeometryStatus, LayoutConfig, QueryState,
    RawResult, VisibleValues,
};

/// Snapshot whose visible set is `visible`, with an empty query
pub(crate) fn snapshot_with(visible: Vec<RawResult>) -> ExplorerSnapshot {
    ExplorerSnapshot {
        revision: 1,
        query: QueryState::default(),
        raw_count: visible.len(),
        visible: Arc::from(visible),
        values: Arc::new(VisibleValues::new()),
        facets: Arc::new(Facets::new()),
        suggestions: Arc::from(Vec::new()),
        geometry: GeometryView {
            entry: GeometryCacheEntry {
                key: GeometryKey::default(),
                payload: None,
                status: GeometryStatus::Pending,
            },
            requested: None,
            failure: None,
        },
        channels: [FetchState::default(); 3],
        notices: Vec::new(),
        breakpoint: Breakpoint::ExtraLarge,
        layout: compose_layout(Breakpoint::ExtraLarge, &LayoutConfig::default()),
        coordinates: CoordinateFields::default(),
    }
}

/// Feature collection with `n` points
pub(crate) fn feature_collection(n: usize) -> GeoJson {
    let features = (0..n)
        .map(|i| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![22.0 + i as f64, 60.0]))),
            id: None,
            properties: None,
            foreign_members: None,
        })
        .collect();
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
