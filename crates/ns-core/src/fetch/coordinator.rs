//! Spawns service calls and routes their responses back to the owner

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use geojson::GeoJson;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Admission, Channel, Debouncer, FetchChannel, FetchState, RequestId, Resolution};
use crate::clock::Clock;
use crate::config::ExplorerConfig;
use crate::error::{ErrorNotice, ExplorerError, FetchError};
use crate::geometry::GeometryKey;
use crate::query::{GeometryParams, SearchParams};
use crate::record::{RawResult, Suggestion};
use crate::services::Services;

/// A completed (or abandoned) service call, tagged with its generation
#[derive(Debug)]
pub enum FetchResponse {
    Suggestions {
        request_id: RequestId,
        outcome: Result<Vec<Suggestion>, FetchError>,
    },
    Results {
        request_id: RequestId,
        outcome: Result<Vec<RawResult>, FetchError>,
    },
    Geometry {
        request_id: RequestId,
        key: GeometryKey,
        outcome: Result<GeoJson, FetchError>,
    },
}

impl FetchResponse {
    pub fn channel(&self) -> Channel {
        match self {
            FetchResponse::Suggestions { .. } => Channel::Suggestions,
            FetchResponse::Results { .. } => Channel::Results,
            FetchResponse::Geometry { .. } => Channel::Geometry,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            FetchResponse::Suggestions { request_id, .. }
            | FetchResponse::Results { request_id, .. }
            | FetchResponse::Geometry { request_id, .. } => *request_id,
        }
    }
}

/// What applying a response changed
#[derive(Debug, Clone)]
pub enum FetchUpdate {
    Suggestions(Arc<[Suggestion]>),
    Results(Arc<[RawResult]>),
    Geometry { key: GeometryKey, payload: Arc<GeoJson> },
    Failed(ErrorNotice),
    GeometryFailed { key: GeometryKey, notice: ErrorNotice },
    /// The response was stale and changed nothing
    Discarded { channel: Channel, request_id: RequestId },
}

/// Guarantees exactly one response per spawned task, even when the task is
/// aborted or panics before the service answers.
struct Responder<T> {
    tx: mpsc::UnboundedSender<FetchResponse>,
    wrap: Box<dyn Fn(Result<T, FetchError>) -> FetchResponse + Send>,
    sent: bool,
}

impl<T> Responder<T> {
    fn send(mut self, outcome: Result<T, FetchError>) {
        self.sent = true;
        // the owner may already be gone
        let _ = self.tx.send((self.wrap)(outcome));
    }
}

impl<T> Drop for Responder<T> {
    fn drop(&mut self) {
        if !self.sent {
            let _ = self.tx.send((self.wrap)(Err(FetchError::Dropped)));
        }
    }
}

/// Owns the three fetch channels and the tasks serving them.
///
/// All state changes happen on the owner's side in [`FetchCoordinator::apply`];
/// spawned tasks only ever send a [`FetchResponse`] back.
pub struct FetchCoordinator {
    services: Services,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    timeouts: [Option<Duration>; 3],
    abort_superseded: bool,

    suggestions: FetchChannel<Arc<[Suggestion]>>,
    results: FetchChannel<Arc<[RawResult]>>,
    geometry: FetchChannel<GeometryKey>,
    debouncer: Debouncer<String>,

    tasks: [Option<JoinHandle<()>>; 3],
    tx: mpsc::UnboundedSender<FetchResponse>,
    rx: mpsc::UnboundedReceiver<FetchResponse>,
    /// Spawned tasks whose response has not been received yet
    outstanding: usize,
}

impl FetchCoordinator {
    /// Create a coordinator bound to the current tokio runtime
    pub fn new(config: &ExplorerConfig, services: Services, clock: Arc<dyn Clock>) -> Result<Self, ExplorerError> {
        let runtime = Handle::try_current().map_err(|_| ExplorerError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            services,
            runtime,
            clock,
            timeouts: [config.suggestions.timeout, config.results.timeout, config.geometry.timeout],
            abort_superseded: config.abort_superseded,
            suggestions: FetchChannel::new(Channel::Suggestions),
            results: FetchChannel::new(Channel::Results),
            geometry: FetchChannel::new(Channel::Geometry),
            debouncer: Debouncer::new(config.debounce.clone()),
            tasks: [None, None, None],
            tx,
            rx,
            outstanding: 0,
        })
    }

    /// Ask for suggestions for `text`, subject to the debounce window.
    ///
    /// Returns the request id when a request was actually issued.
    pub fn trigger_suggestions(&mut self, text: String) -> Option<RequestId> {
        match self.debouncer.admit(text, self.clock.now()) {
            Admission::Issue(text) => Some(self.issue_suggestions(text)),
            Admission::Discard => {
                tracing::debug!("Suggestion trigger discarded inside quiet window");
                None
            }
            Admission::Defer => {
                tracing::debug!("Suggestion trigger deferred until quiet window passes");
                None
            }
        }
    }

    /// Issue a deferred suggestion trigger whose window has passed
    pub fn poll_deferred(&mut self) -> Option<RequestId> {
        let text = self.debouncer.take_due(self.clock.now())?;
        Some(self.issue_suggestions(text))
    }

    /// When a deferred suggestion trigger becomes due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    fn issue_suggestions(&mut self, text: String) -> RequestId {
        let request_id = self.suggestions.begin();
        tracing::debug!("Fetching suggestions {} for {:?}", request_id, text);

        let service = self.services.suggestions.clone();
        self.spawn(
            Channel::Suggestions,
            async move { service.suggest(&text).await },
            move |outcome| FetchResponse::Suggestions { request_id, outcome },
        );
        request_id
    }

    /// Start a results fetch; any older results request becomes stale
    pub fn trigger_results(&mut self, params: SearchParams) -> RequestId {
        let request_id = self.results.begin();
        tracing::debug!("Fetching results {} for {:?} in {:?}", request_id, params.text, params.datasets);

        let service = self.services.search.clone();
        self.spawn(
            Channel::Results,
            async move { service.search(&params).await },
            move |outcome| FetchResponse::Results { request_id, outcome },
        );
        request_id
    }

    /// Start a geometry fetch tagged with `key`
    pub fn trigger_geometry(&mut self, key: GeometryKey, params: GeometryParams) -> RequestId {
        let request_id = self.geometry.begin();
        tracing::debug!("Fetching geometry {} for key {}", request_id, key);

        let service = self.services.geometry.clone();
        self.spawn(
            Channel::Geometry,
            async move { service.geometry(key, &params).await },
            move |outcome| FetchResponse::Geometry { request_id, key, outcome },
        );
        request_id
    }

    fn spawn<T, Fut, W>(&mut self, channel: Channel, call: Fut, wrap: W)
    where
        T: Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        W: Fn(Result<T, FetchError>) -> FetchResponse + Send + 'static,
    {
        if let Some(previous) = self.tasks[channel.index()].take() {
            if self.abort_superseded && !previous.is_finished() {
                tracing::debug!("Aborting superseded {} task", channel);
                previous.abort();
            }
        }

        let timeout = self.timeouts[channel.index()];
        let responder = Responder {
            tx: self.tx.clone(),
            wrap: Box::new(wrap),
            sent: false,
        };

        self.outstanding += 1;
        let handle = self.runtime.spawn(async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result.map_err(FetchError::from),
                    Err(_) => Err(FetchError::Timeout(limit)),
                },
                None => call.await.map_err(FetchError::from),
            };
            responder.send(outcome);
        });
        self.tasks[channel.index()] = Some(handle);
    }

    /// Mark the channel's in-flight request cancelled. Returns whether one was in flight.
    pub fn cancel(&mut self, channel: Channel) -> bool {
        let cancelled = match channel {
            Channel::Suggestions => {
                self.debouncer.reset();
                self.suggestions.cancel()
            }
            Channel::Results => self.results.cancel(),
            Channel::Geometry => self.geometry.cancel(),
        };
        if cancelled {
            tracing::debug!("Cancelled in-flight {} request", channel);
            self.abort_task(channel, self.abort_superseded);
        }
        cancelled
    }

    /// Reset the channel to idle with no data and no error
    pub fn clear(&mut self, channel: Channel) {
        match channel {
            Channel::Suggestions => {
                self.debouncer.reset();
                self.suggestions.clear();
            }
            Channel::Results => self.results.clear(),
            Channel::Geometry => self.geometry.clear(),
        }
        self.abort_task(channel, self.abort_superseded);
    }

    fn abort_task(&mut self, channel: Channel, abort: bool) {
        if let Some(handle) = self.tasks[channel.index()].take() {
            if abort {
                handle.abort();
            }
        }
    }

    /// Wait for the next response. `None` when nothing is outstanding.
    pub async fn recv(&mut self) -> Option<FetchResponse> {
        if self.outstanding == 0 {
            return None;
        }
        let response = self.rx.recv().await?;
        self.outstanding -= 1;
        Some(response)
    }

    /// Take an already delivered response without waiting
    pub fn try_recv(&mut self) -> Option<FetchResponse> {
        let response = self.rx.try_recv().ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(response)
    }

    /// Number of spawned requests still to report back
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Apply a response under the generation rule
    pub fn apply(&mut self, response: FetchResponse) -> FetchUpdate {
        let channel = response.channel();
        let request_id = response.request_id();

        let update = match response {
            FetchResponse::Suggestions { request_id, outcome } => {
                let outcome = outcome.map(Arc::<[Suggestion]>::from);
                match self.suggestions.resolve(request_id, outcome) {
                    Resolution::Applied => self.suggestions.data().cloned().map(FetchUpdate::Suggestions),
                    Resolution::Failed(notice) => Some(FetchUpdate::Failed(notice)),
                    Resolution::Stale => None,
                }
            }
            FetchResponse::Results { request_id, outcome } => {
                let outcome = outcome.map(Arc::<[RawResult]>::from);
                match self.results.resolve(request_id, outcome) {
                    Resolution::Applied => self.results.data().cloned().map(FetchUpdate::Results),
                    Resolution::Failed(notice) => Some(FetchUpdate::Failed(notice)),
                    Resolution::Stale => None,
                }
            }
            FetchResponse::Geometry { request_id, key, outcome } => match outcome {
                Ok(payload) => match self.geometry.resolve(request_id, Ok(key)) {
                    Resolution::Applied => Some(FetchUpdate::Geometry {
                        key,
                        payload: Arc::new(payload),
                    }),
                    _ => None,
                },
                Err(error) => match self.geometry.resolve(request_id, Err(error)) {
                    Resolution::Failed(notice) => Some(FetchUpdate::GeometryFailed { key, notice }),
                    _ => None,
                },
            },
        };

        match update {
            Some(FetchUpdate::Failed(ref notice)) | Some(FetchUpdate::GeometryFailed { ref notice, .. }) => {
                tracing::warn!("{}", notice.message());
            }
            Some(_) => tracing::debug!("Applied {} response {}", channel, request_id),
            None => tracing::debug!("Discarded stale {} response {}", channel, request_id),
        }

        update.unwrap_or(FetchUpdate::Discarded { channel, request_id })
    }

    pub fn state(&self, channel: Channel) -> FetchState {
        match channel {
            Channel::Suggestions => self.suggestions.state(),
            Channel::Results => self.results.state(),
            Channel::Geometry => self.geometry.state(),
        }
    }

    pub fn error(&self, channel: Channel) -> Option<&ErrorNotice> {
        match channel {
            Channel::Suggestions => self.suggestions.error(),
            Channel::Results => self.results.error(),
            Channel::Geometry => self.geometry.error(),
        }
    }

    /// Every channel's current error, in channel order
    pub fn errors(&self) -> Vec<ErrorNotice> {
        Channel::ALL
            .into_iter()
            .filter_map(|channel| self.error(channel).cloned())
            .collect()
    }

    /// Last applied suggestions
    pub fn suggestions(&self) -> Option<Arc<[Suggestion]>> {
        self.suggestions.data().cloned()
    }

    /// Last applied raw results
    pub fn results(&self) -> Option<Arc<[RawResult]>> {
        self.results.data().cloned()
    }

    /// Key of the last applied geometry response
    pub fn geometry_key(&self) -> Option<GeometryKey> {
        self.geometry.data().copied()
    }

    /// Cancel everything, abort every task and stop receiving
    pub fn shutdown(&mut self) {
        for channel in Channel::ALL {
            match channel {
                Channel::Suggestions => self.suggestions.cancel(),
                Channel::Results => self.results.cancel(),
                Channel::Geometry => self.geometry.cancel(),
            };
            self.abort_task(channel, true);
        }
        self.debouncer.reset();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        self.outstanding = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DebounceMode;
    use crate::fetch::FetchStatus;
    use crate::testing::ScriptedBackend;

    fn coordinator(backend: &Arc<ScriptedBackend>, config: ExplorerConfig) -> FetchCoordinator {
        FetchCoordinator::new(&config, Services::from_backend(backend.clone()), Arc::new(ManualClock::new()))
            .expect("runtime")
    }

    fn search(text: &str) -> SearchParams {
        SearchParams {
            text: text.into(),
            datasets: vec!["A".into()],
        }
    }

    #[test]
    fn test_new_requires_runtime() {
        let backend = Arc::new(ScriptedBackend::new());
        let result = FetchCoordinator::new(
            &ExplorerConfig::default(),
            Services::from_backend(backend),
            Arc::new(ManualClock::new()),
        );
        assert!(matches!(result, Err(ExplorerError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_out_of_order_results_last_wins() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut fetch = coordinator(&backend, ExplorerConfig::default());

        fetch.trigger_results(search("a"));
        let first = backend.next_call().await;
        fetch.trigger_results(search("b"));
        let second = backend.next_call().await;

        second.respond_results(vec![RawResult::new("2", "A")]);
        let response = fetch.recv().await.expect("second response");
        assert!(matches!(fetch.apply(response), FetchUpdate::Results(ref r) if r[0].id == "2"));

        first.respond_results(vec![RawResult::new("1", "A")]);
        let response = fetch.recv().await.expect("first response");
        assert!(matches!(fetch.apply(response), FetchUpdate::Discarded { channel: Channel::Results, .. }));

        assert_eq!(fetch.results().map(|r| r[0].id.clone()), Some("2".to_string()));
        assert!(fetch.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_surfaces_notice_and_keeps_results() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut fetch = coordinator(&backend, ExplorerConfig::default());

        fetch.trigger_results(search("a"));
        backend.next_call().await.respond_results(vec![RawResult::new("1", "A")]);
        let response = fetch.recv().await.expect("response");
        fetch.apply(response);

        fetch.trigger_results(search("b"));
        backend.next_call().await.fail("503");
        let response = fetch.recv().await.expect("response");
        assert!(matches!(fetch.apply(response), FetchUpdate::Failed(ref n) if n.channel == Channel::Results));

        assert_eq!(fetch.state(Channel::Results).status, FetchStatus::Failed);
        assert_eq!(fetch.results().map(|r| r.len()), Some(1));
        assert_eq!(fetch.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_late_response() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut fetch = coordinator(&backend, ExplorerConfig::default());

        fetch.trigger_results(search("a"));
        let call = backend.next_call().await;
        assert!(fetch.cancel(Channel::Results));
        call.respond_results(vec![RawResult::new("1", "A")]);

        let response = fetch.recv().await.expect("response");
        assert!(matches!(fetch.apply(response), FetchUpdate::Discarded { .. }));
        assert_eq!(fetch.state(Channel::Results).status, FetchStatus::Cancelled);
        assert!(fetch.results().is_none());
    }

    #[tokio::test]
    async fn test_abort_superseded_still_reports_once() {
        let backend = Arc::new(ScriptedBackend::new());
        let config = ExplorerConfig {
            abort_superseded: true,
            ..ExplorerConfig::default()
        };
        let mut fetch = coordinator(&backend, config);

        fetch.trigger_results(search("a"));
        let _first = backend.next_call().await;
        fetch.trigger_results(search("b"));
        let second = backend.next_call().await;

        let response = fetch.recv().await.expect("aborted response");
        assert!(matches!(
            response,
            FetchResponse::Results {
                outcome: Err(FetchError::Dropped),
                ..
            }
        ));
        assert!(matches!(fetch.apply(response), FetchUpdate::Discarded { .. }));

        second.respond_results(Vec::new());
        let response = fetch.recv().await.expect("second response");
        assert!(matches!(fetch.apply(response), FetchUpdate::Results(_)));
        assert_eq!(fetch.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_request() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut config = ExplorerConfig::default();
        config.results.timeout = Some(Duration::from_millis(100));
        let mut fetch = coordinator(&backend, config);

        fetch.trigger_results(search("a"));
        let _call = backend.next_call().await;

        let response = fetch.recv().await.expect("timeout response");
        match fetch.apply(response) {
            FetchUpdate::Failed(notice) => {
                assert_eq!(notice.error, FetchError::Timeout(Duration::from_millis(100)))
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_suggestions_debounced() {
        let backend = Arc::new(ScriptedBackend::new());
        let clock = ManualClock::new();
        let mut config = ExplorerConfig::default();
        config.debounce.mode = DebounceMode::Trailing;
        let mut fetch =
            FetchCoordinator::new(&config, Services::from_backend(backend.clone()), Arc::new(clock.clone()))
                .expect("runtime");

        assert!(fetch.trigger_suggestions("k".into()).is_some());
        assert!(fetch.trigger_suggestions("ki".into()).is_none());
        assert!(fetch.next_deadline().is_some());
        assert!(fetch.poll_deferred().is_none());

        clock.advance(Duration::from_millis(300));
        assert!(fetch.poll_deferred().is_some());
        assert_eq!(fetch.state(Channel::Suggestions).request_id, RequestId(2));
    }

    #[tokio::test]
    async fn test_clear_resets_channel() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut fetch = coordinator(&backend, ExplorerConfig::default());

        fetch.trigger_suggestions("kirk".into());
        backend.next_call().await.respond_suggestions(vec![Suggestion::new("kirkko")]);
        let response = fetch.recv().await.expect("response");
        fetch.apply(response);
        assert!(fetch.suggestions().is_some());

        fetch.clear(Channel::Suggestions);
        assert_eq!(fetch.state(Channel::Suggestions).status, FetchStatus::Idle);
        assert!(fetch.suggestions().is_none());
    }
}
