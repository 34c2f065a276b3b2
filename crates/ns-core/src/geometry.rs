//! Versioned cache of the latest geospatial payload
//!
//! The map asks for geometry with the key it believes is current. A payload is
//! only handed out when that key matches the cached entry, so geometry from a
//! previous dataset selection can never be drawn while a newer fetch is
//! outstanding.

use std::fmt;
use std::sync::Arc;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};

use crate::error::ErrorNotice;

/// Monotonic tag attached to each geometry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GeometryKey(pub u64);

impl GeometryKey {
    pub fn next(self) -> Self {
        GeometryKey(self.0 + 1)
    }
}

impl fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryStatus {
    Pending,
    Ready,
    Failed,
}

/// The cache's current entry.
///
/// A failure never evicts a ready payload: the entry only turns `Failed` when
/// there was nothing ready to keep. The failed key and its message are always
/// available through [`GeometryView::failure`] and `lookup`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryCacheEntry {
    pub key: GeometryKey,
    pub payload: Option<Arc<GeoJson>>,
    pub status: GeometryStatus,
}

impl GeometryCacheEntry {
    fn empty() -> Self {
        Self {
            key: GeometryKey::default(),
            payload: None,
            status: GeometryStatus::Pending,
        }
    }
}

/// Answer to a view asking for the geometry of a given key
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryLookup {
    Ready(Arc<GeoJson>),
    Pending,
    Failed(String),
}

impl GeometryLookup {
    pub fn payload(&self) -> Option<&Arc<GeoJson>> {
        match self {
            GeometryLookup::Ready(payload) => Some(payload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeometryCache {
    entry: GeometryCacheEntry,
    /// Newest key a request was made for
    requested: Option<GeometryKey>,
    failure: Option<(GeometryKey, ErrorNotice)>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self {
            entry: GeometryCacheEntry::empty(),
            requested: None,
            failure: None,
        }
    }

    /// Note that geometry for `key` has been requested
    pub fn request(&mut self, key: GeometryKey) {
        if let Some(previous) = self.requested {
            if key < previous {
                tracing::warn!("Geometry key {} requested after newer key {}", key, previous);
            }
        }
        self.requested = Some(key);
    }

    pub fn current_entry(&self) -> &GeometryCacheEntry {
        &self.entry
    }

    /// Replace the entry with a freshly fetched payload
    pub(crate) fn store(&mut self, key: GeometryKey, payload: Arc<GeoJson>) {
        self.entry = GeometryCacheEntry {
            key,
            payload: Some(payload),
            status: GeometryStatus::Ready,
        };
        if matches!(&self.failure, Some((failed, _)) if *failed == key) {
            self.failure = None;
        }
    }

    /// Record a failed fetch; a ready entry stays in place
    pub(crate) fn record_failure(&mut self, key: GeometryKey, notice: ErrorNotice) {
        if self.entry.payload.is_none() {
            self.entry = GeometryCacheEntry {
                key,
                payload: None,
                status: GeometryStatus::Failed,
            };
        }
        self.failure = Some((key, notice));
    }

    /// Status of the geometry for `key`, as seen by a view
    pub fn status_of(&self, key: GeometryKey) -> GeometryStatus {
        match self.lookup(key) {
            GeometryLookup::Ready(_) => GeometryStatus::Ready,
            GeometryLookup::Pending => GeometryStatus::Pending,
            GeometryLookup::Failed(_) => GeometryStatus::Failed,
        }
    }

    /// Payload for `key` if and only if the cache holds a ready entry for it
    pub fn lookup(&self, key: GeometryKey) -> GeometryLookup {
        let lookup = GeometryView::of(self).lookup(key);
        if lookup == GeometryLookup::Pending && self.requested.map_or(true, |requested| key > requested) {
            tracing::debug!("Geometry key {} was never requested; reporting pending", key);
        }
        lookup
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot-friendly copy of what a view needs to decide what to draw
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryView {
    pub entry: GeometryCacheEntry,
    pub requested: Option<GeometryKey>,
    pub failure: Option<(GeometryKey, String)>,
}

impl GeometryView {
    pub(crate) fn of(cache: &GeometryCache) -> Self {
        Self {
            entry: cache.entry.clone(),
            requested: cache.requested,
            failure: cache.failure.as_ref().map(|(key, notice)| (*key, notice.message())),
        }
    }

    /// Serve the payload only for a ready entry with a matching key
    pub fn lookup(&self, key: GeometryKey) -> GeometryLookup {
        if self.entry.key == key && self.entry.status == GeometryStatus::Ready {
            if let Some(payload) = &self.entry.payload {
                return GeometryLookup::Ready(payload.clone());
            }
        }
        match &self.failure {
            Some((failed, message)) if *failed == key => GeometryLookup::Failed(message.clone()),
            _ => GeometryLookup::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::Channel;
    use geojson::FeatureCollection;

    fn payload() -> Arc<GeoJson> {
        Arc::new(GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        }))
    }

    #[test]
    fn test_payload_only_for_matching_key() {
        let mut cache = GeometryCache::new();
        cache.request(GeometryKey(2));
        cache.store(GeometryKey(2), payload());

        assert!(matches!(cache.lookup(GeometryKey(2)), GeometryLookup::Ready(_)));
        assert_eq!(cache.lookup(GeometryKey(1)), GeometryLookup::Pending);

        cache.request(GeometryKey(3));
        assert_eq!(cache.lookup(GeometryKey(3)), GeometryLookup::Pending);
        assert_eq!(cache.current_entry().key, GeometryKey(2));
    }

    #[test]
    fn test_unknown_key_is_pending() {
        let cache = GeometryCache::new();
        assert_eq!(cache.lookup(GeometryKey(0)), GeometryLookup::Pending);
        assert_eq!(cache.status_of(GeometryKey(42)), GeometryStatus::Pending);
    }

    #[test]
    fn test_failure_keeps_ready_entry() {
        let mut cache = GeometryCache::new();
        cache.store(GeometryKey(1), payload());
        cache.request(GeometryKey(2));
        cache.record_failure(
            GeometryKey(2),
            ErrorNotice::new(Channel::Geometry, FetchError::Network("boom".into())),
        );

        assert!(matches!(cache.lookup(GeometryKey(2)), GeometryLookup::Failed(_)));
        assert!(matches!(cache.lookup(GeometryKey(1)), GeometryLookup::Ready(_)));
        assert_eq!(cache.current_entry().status, GeometryStatus::Ready);

        let view = GeometryView::of(&cache);
        assert_eq!(view.lookup(GeometryKey(2)), cache.lookup(GeometryKey(2)));
        assert_eq!(view.lookup(GeometryKey(1)), cache.lookup(GeometryKey(1)));
    }

    #[test]
    fn test_failure_without_ready_entry_marks_entry_failed() {
        let mut cache = GeometryCache::new();
        cache.request(GeometryKey(1));
        cache.record_failure(
            GeometryKey(1),
            ErrorNotice::new(Channel::Geometry, FetchError::Timeout(std::time::Duration::from_secs(1))),
        );

        assert_eq!(cache.current_entry().key, GeometryKey(1));
        assert_eq!(cache.current_entry().status, GeometryStatus::Failed);
        assert!(cache.current_entry().payload.is_none());
        assert_eq!(cache.status_of(GeometryKey(1)), GeometryStatus::Failed);

        // a later success replaces the failed entry wholesale
        cache.request(GeometryKey(2));
        cache.store(GeometryKey(2), payload());
        assert_eq!(cache.current_entry().status, GeometryStatus::Ready);
        assert_eq!(cache.status_of(GeometryKey(1)), GeometryStatus::Failed);
    }
}
