//! Map view: clustered markers or a heat map over result coordinates

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use geojson::GeoJson;
use indexmap::IndexMap;
use ns_core::{
    DatasetId, ExplorerSnapshot, FieldId, GeometryKey, GeometryLookup, GeometryStatus, Intent, IntentSender, RawResult,
    ViewKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ViewAdapter, ViewId};

/// Configuration for map views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Grid cell size for marker clustering, in degrees
    pub cluster_cell_degrees: f64,
    /// Numeric field used as heat weight; every point weighs 1 without it
    pub weight_field: Option<FieldId>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            cluster_cell_degrees: 0.5,
            weight_field: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    Clustered,
    Heat,
}

/// Markers merged into one grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub lat: f64,
    pub lon: f64,
    pub ids: Vec<String>,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

/// Inputs the geometry depends on; a change asks for a new key
#[derive(Debug, Clone, PartialEq)]
struct GeometryInputs {
    datasets: BTreeSet<DatasetId>,
    analysis_view: bool,
}

/// Map adapter.
///
/// Keeps its own geometry key and bumps it whenever the dataset selection or
/// the analysis view flag changes. Geometry is only drawn when the cache holds
/// a ready entry for that exact key; while the new key is pending, the last
/// drawn payload stays on screen.
pub struct MapAdapter {
    id: ViewId,
    pub config: MapConfig,
    dispatcher: IntentSender,

    mode: MapMode,
    geometry_key: GeometryKey,
    geometry_inputs: Option<GeometryInputs>,
    geometry_status: GeometryStatus,
    shown_geometry: Option<(GeometryKey, Arc<GeoJson>)>,
    notice: Option<String>,

    clusters: Vec<Cluster>,
    heat_points: Vec<HeatPoint>,
    located: usize,
    total: usize,
}

impl MapAdapter {
    pub fn new(dispatcher: IntentSender, config: MapConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            dispatcher,
            mode: MapMode::Clustered,
            geometry_key: GeometryKey::default(),
            geometry_inputs: None,
            geometry_status: GeometryStatus::Pending,
            shown_geometry: None,
            notice: None,
            clusters: Vec::new(),
            heat_points: Vec::new(),
            located: 0,
            total: 0,
        }
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Key of the geometry this view currently wants
    pub fn geometry_key(&self) -> GeometryKey {
        self.geometry_key
    }

    pub fn geometry_status(&self) -> GeometryStatus {
        self.geometry_status
    }

    /// Geometry currently drawn, with the key it was fetched for
    pub fn shown_geometry(&self) -> Option<(GeometryKey, &Arc<GeoJson>)> {
        self.shown_geometry.as_ref().map(|(key, payload)| (*key, payload))
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn heat_points(&self) -> &[HeatPoint] {
        &self.heat_points
    }

    pub fn set_heat_map(&self, enabled: bool) {
        self.dispatcher.dispatch(Intent::SetHeatMap(enabled));
    }

    pub fn set_analysis_view(&self, open: bool) {
        self.dispatcher.dispatch(if open {
            Intent::OpenAnalysisView
        } else {
            Intent::CloseAnalysisView
        });
    }

    fn track_geometry_inputs(&mut self, snapshot: &ExplorerSnapshot) {
        let inputs = GeometryInputs {
            datasets: snapshot.query.dataset_toggles.clone(),
            analysis_view: snapshot.query.analysis_view,
        };
        if self.geometry_inputs.as_ref() == Some(&inputs) {
            return;
        }
        self.geometry_inputs = Some(inputs);
        self.geometry_key = self.geometry_key.next();
        tracing::debug!("Map requesting geometry key {}", self.geometry_key);
        self.dispatcher.dispatch(Intent::GetGeoJson { key: self.geometry_key });
    }

    fn update_geometry(&mut self, snapshot: &ExplorerSnapshot) {
        match snapshot.geometry_for(self.geometry_key) {
            GeometryLookup::Ready(payload) => {
                self.shown_geometry = Some((self.geometry_key, payload));
                self.geometry_status = GeometryStatus::Ready;
                self.notice = None;
            }
            GeometryLookup::Pending => self.geometry_status = GeometryStatus::Pending,
            GeometryLookup::Failed(message) => {
                self.geometry_status = GeometryStatus::Failed;
                self.notice = Some(message);
            }
        }
    }

    fn cluster(&self, located: &[(&RawResult, (f64, f64))]) -> Vec<Cluster> {
        let cell = self.config.cluster_cell_degrees.max(f64::EPSILON);
        let mut cells: IndexMap<(i64, i64), (f64, f64, Vec<String>)> = IndexMap::new();
        for (result, (lat, lon)) in located {
            let key = ((lat / cell).floor() as i64, (lon / cell).floor() as i64);
            let entry = cells.entry(key).or_insert((0.0, 0.0, Vec::new()));
            entry.0 += lat;
            entry.1 += lon;
            entry.2.push(result.id.clone());
        }
        cells
            .into_values()
            .map(|(lat_sum, lon_sum, ids)| {
                let n = ids.len() as f64;
                Cluster {
                    lat: lat_sum / n,
                    lon: lon_sum / n,
                    ids,
                }
            })
            .collect()
    }

    fn heat(&self, located: &[(&RawResult, (f64, f64))]) -> Vec<HeatPoint> {
        located
            .iter()
            .map(|(result, (lat, lon))| HeatPoint {
                lat: *lat,
                lon: *lon,
                weight: self
                    .config
                    .weight_field
                    .as_ref()
                    .and_then(|field| result.field(field).as_number())
                    .unwrap_or(1.0),
            })
            .collect()
    }
}

impl ViewAdapter for MapAdapter {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Map
    }

    fn view_type(&self) -> &str {
        match self.mode {
            MapMode::Clustered => "ClusterMapView",
            MapMode::Heat => "HeatMapView",
        }
    }

    fn sync(&mut self, snapshot: &ExplorerSnapshot) {
        self.track_geometry_inputs(snapshot);
        self.update_geometry(snapshot);

        self.mode = if snapshot.query.heat_map { MapMode::Heat } else { MapMode::Clustered };

        let coordinates = &snapshot.coordinates;
        let located: Vec<(&RawResult, (f64, f64))> = snapshot
            .visible
            .iter()
            .filter_map(|result| Some((result, result.coordinates(&coordinates.lat, &coordinates.lon)?)))
            .collect();
        self.located = located.len();
        self.total = snapshot.visible.len();

        match self.mode {
            MapMode::Clustered => {
                self.clusters = self.cluster(&located);
                self.heat_points.clear();
            }
            MapMode::Heat => {
                self.heat_points = self.heat(&located);
                self.clusters.clear();
            }
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Map [{}] {} of {} results located, geometry key {} {:?}",
            match self.mode {
                MapMode::Clustered => "clusters",
                MapMode::Heat => "heat",
            },
            self.located,
            self.total,
            self.geometry_key,
            self.geometry_status
        );
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "  ! {notice}");
        }
        if let Some((key, GeoJson::FeatureCollection(collection))) =
            self.shown_geometry.as_ref().map(|(key, payload)| (key, payload.as_ref()))
        {
            let _ = writeln!(out, "  drawing {} features from key {}", collection.features.len(), key);
        }
        match self.mode {
            MapMode::Clustered => {
                for cluster in &self.clusters {
                    let _ = writeln!(out, "  ({:.3}, {:.3}) x{}", cluster.lat, cluster.lon, cluster.count());
                }
            }
            MapMode::Heat => {
                let total: f64 = self.heat_points.iter().map(|p| p.weight).sum();
                let _ = writeln!(out, "  {} heat points, total weight {}", self.heat_points.len(), total);
            }
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
    use crate::testing::{feature_collection, snapshot_with};
    use ns_core::geometry::GeometryCacheEntry;
    use ns_core::query::intent_channel;

    fn located_results() -> Vec<RawResult> {
        vec![
            RawResult::new("1", "A").with("lat", 60.10).with("long", 22.10),
            RawResult::new("2", "A").with("lat", 60.20).with("long", 22.20),
            RawResult::new("3", "A").with("lat", 65.00).with("long", 25.50),
            RawResult::new("4", "A").with("label", "nowhere"),
        ]
    }

    fn ready(snapshot: &mut ExplorerSnapshot, key: GeometryKey) {
        snapshot.geometry.entry = GeometryCacheEntry {
            key,
            payload: Some(Arc::new(feature_collection(1))),
            status: GeometryStatus::Ready,
        };
    }

    #[test]
    fn test_requests_geometry_when_inputs_change() {
        let (tx, mut rx) = intent_channel();
        let mut map = MapAdapter::new(tx, MapConfig::default());

        let mut snapshot = snapshot_with(Vec::new());
        map.sync(&snapshot);
        assert_eq!(rx.try_next(), Some(Intent::GetGeoJson { key: GeometryKey(1) }));

        // unrelated change: no new request
        snapshot.query.heat_map = true;
        map.sync(&snapshot);
        assert_eq!(rx.try_next(), None);

        snapshot.query.analysis_view = true;
        map.sync(&snapshot);
        assert_eq!(rx.try_next(), Some(Intent::GetGeoJson { key: GeometryKey(2) }));

        snapshot.query.dataset_toggles.insert("B".into());
        map.sync(&snapshot);
        assert_eq!(rx.try_next(), Some(Intent::GetGeoJson { key: GeometryKey(3) }));
    }

    #[test]
    fn test_retains_last_geometry_while_pending() {
        let (tx, _rx) = intent_channel();
        let mut map = MapAdapter::new(tx, MapConfig::default());

        let mut snapshot = snapshot_with(Vec::new());
        ready(&mut snapshot, GeometryKey(1));
        map.sync(&snapshot);
        assert_eq!(map.geometry_status(), GeometryStatus::Ready);
        assert_eq!(map.shown_geometry().map(|(key, _)| key), Some(GeometryKey(1)));

        // datasets change; the cache still holds key 1
        snapshot.query.dataset_toggles.insert("B".into());
        map.sync(&snapshot);
        assert_eq!(map.geometry_key(), GeometryKey(2));
        assert_eq!(map.geometry_status(), GeometryStatus::Pending);
        assert_eq!(map.shown_geometry().map(|(key, _)| key), Some(GeometryKey(1)));

        ready(&mut snapshot, GeometryKey(2));
        map.sync(&snapshot);
        assert_eq!(map.shown_geometry().map(|(key, _)| key), Some(GeometryKey(2)));
    }

    #[test]
    fn test_never_draws_geometry_of_another_key() {
        let (tx, _rx) = intent_channel();
        let mut map = MapAdapter::new(tx, MapConfig::default());

        let mut snapshot = snapshot_with(Vec::new());
        ready(&mut snapshot, GeometryKey(5));
        map.sync(&snapshot);

        assert_eq!(map.geometry_key(), GeometryKey(1));
        assert!(map.shown_geometry().is_none());
    }

    #[test]
    fn test_clusters_and_heat_points() {
        let (tx, _rx) = intent_channel();
        let mut map = MapAdapter::new(tx, MapConfig::default());

        let mut snapshot = snapshot_with(located_results());
        map.sync(&snapshot);
        assert_eq!(map.mode(), MapMode::Clustered);
        let counts: Vec<usize> = map.clusters().iter().map(Cluster::count).collect();
        assert_eq!(counts, vec![2, 1]);

        snapshot.query.heat_map = true;
        map.sync(&snapshot);
        assert_eq!(map.mode(), MapMode::Heat);
        assert_eq!(map.heat_points().len(), 3);
        assert!(map.clusters().is_empty());
        assert_eq!(map.view_type(), "HeatMapView");
    }

    #[test]
    fn test_mode_buttons_dispatch() {
        let (tx, mut rx) = intent_channel();
        let map = MapAdapter::new(tx, MapConfig::default());
        map.set_heat_map(true);
        map.set_analysis_view(false);
        assert_eq!(rx.try_next(), Some(Intent::SetHeatMap(true)));
        assert_eq!(rx.try_next(), Some(Intent::CloseAnalysisView));
    }
}
