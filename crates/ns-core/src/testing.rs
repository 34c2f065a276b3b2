//! Scripted backend for deterministic race tests
//!
//! Every service call parks until the test answers it, so tests decide the
//! exact order in which responses arrive.

use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use geojson::{FeatureCollection, GeoJson};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::geometry::GeometryKey;
use crate::query::{GeometryParams, SearchParams};
use crate::record::{RawResult, Suggestion};
use crate::services::{GeometryService, SearchService, SuggestionService};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallKind {
    Search(SearchParams),
    Suggest(String),
    Geometry(GeometryKey),
}

enum Reply {
    Results(Vec<RawResult>),
    Suggestions(Vec<Suggestion>),
    Geometry(GeoJson),
    Failure(String),
}

/// A service call waiting for its answer
pub(crate) struct PendingCall {
    pub kind: CallKind,
    reply: oneshot::Sender<Reply>,
}

impl PendingCall {
    pub fn respond_results(self, results: Vec<RawResult>) {
        let _ = self.reply.send(Reply::Results(results));
    }

    pub fn respond_suggestions(self, suggestions: Vec<Suggestion>) {
        let _ = self.reply.send(Reply::Suggestions(suggestions));
    }

    pub fn respond_geometry(self, payload: GeoJson) {
        let _ = self.reply.send(Reply::Geometry(payload));
    }

    pub fn fail(self, message: &str) {
        let _ = self.reply.send(Reply::Failure(message.to_string()));
    }
}

pub(crate) struct ScriptedBackend {
    calls: Mutex<VecDeque<PendingCall>>,
    notify: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Wait for the next call a spawned task makes
    pub async fn next_call(&self) -> PendingCall {
        loop {
            if let Some(call) = self.calls.lock().pop_front() {
                return call;
            }
            self.notify.notified().await;
        }
    }

    /// Number of calls made but not yet picked up
    pub fn queued(&self) -> usize {
        self.calls.lock().len()
    }

    async fn call(&self, kind: CallKind) -> anyhow::Result<Reply> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().push_back(PendingCall { kind, reply: tx });
        self.notify.notify_one();
        match rx.await.map_err(|_| anyhow!("call abandoned by test"))? {
            Reply::Failure(message) => Err(anyhow!(message)),
            reply => Ok(reply),
        }
    }
}

/// An empty feature collection
pub(crate) fn empty_geometry() -> GeoJson {
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    })
}

#[async_trait]
impl SearchService for ScriptedBackend {
    async fn search(&self, params: &SearchParams) -> anyhow::Result<Vec<RawResult>> {
        match self.call(CallKind::Search(params.clone())).await? {
            Reply::Results(results) => Ok(results),
            _ => Err(anyhow!("scripted reply does not match a search call")),
        }
    }
}

#[async_trait]
impl SuggestionService for ScriptedBackend {
    async fn suggest(&self, text: &str) -> anyhow::Result<Vec<Suggestion>> {
        match self.call(CallKind::Suggest(text.to_string())).await? {
            Reply::Suggestions(suggestions) => Ok(suggestions),
            _ => Err(anyhow!("scripted reply does not match a suggestion call")),
        }
    }
}

#[async_trait]
impl GeometryService for ScriptedBackend {
    async fn geometry(&self, key: GeometryKey, _params: &GeometryParams) -> anyhow::Result<GeoJson> {
        match self.call(CallKind::Geometry(key)).await? {
            Reply::Geometry(payload) => Ok(payload),
            _ => Err(anyhow!("scripted reply does not match a geometry call")),
        }
    }
}
