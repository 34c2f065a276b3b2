//! Contracts of the backend services consumed by the core

use std::sync::Arc;

use async_trait::async_trait;
use geojson::GeoJson;

use crate::geometry::GeometryKey;
use crate::query::{GeometryParams, SearchParams};
use crate::record::{RawResult, Suggestion};

/// Search backend. Must be idempotent from the client's point of view.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, params: &SearchParams) -> anyhow::Result<Vec<RawResult>>;
}

/// Autocomplete backend
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, text: &str) -> anyhow::Result<Vec<Suggestion>>;
}

/// Geospatial payload backend
#[async_trait]
pub trait GeometryService: Send + Sync {
    async fn geometry(&self, key: GeometryKey, params: &GeometryParams) -> anyhow::Result<GeoJson>;
}

/// The three services the fetch coordinator talks to
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchService>,
    pub suggestions: Arc<dyn SuggestionService>,
    pub geometry: Arc<dyn GeometryService>,
}

impl Services {
    /// Use one backend object for all three contracts
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SearchService + SuggestionService + GeometryService + 'static,
    {
        Self {
            search: backend.clone(),
            suggestions: backend.clone(),
            geometry: backend,
        }
    }
}
