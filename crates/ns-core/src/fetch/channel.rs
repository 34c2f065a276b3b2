//! Generation-counted channel state

use super::{Channel, FetchState, FetchStatus, RequestId};
use crate::error::{ErrorNotice, FetchError};

/// What happened to a response on arrival
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Applied,
    Failed(ErrorNotice),
    /// Response belonged to a superseded, cancelled or cleared request
    Stale,
}

/// State of one channel: latest request, last-known-good data and last error
#[derive(Debug)]
pub struct FetchChannel<T> {
    channel: Channel,
    state: FetchState,
    data: Option<T>,
    error: Option<ErrorNotice>,
}

impl<T> FetchChannel<T> {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            state: FetchState::default(),
            data: None,
            error: None,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// Last successfully applied data
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorNotice> {
        self.error.as_ref()
    }

    /// Start a new generation; any older request becomes stale
    pub fn begin(&mut self) -> RequestId {
        self.state = FetchState {
            request_id: self.state.request_id.next(),
            status: FetchStatus::InFlight,
        };
        self.state.request_id
    }

    /// Mark the current generation cancelled. Returns whether a request was in flight.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_in_flight() {
            self.state.status = FetchStatus::Cancelled;
            true
        } else {
            false
        }
    }

    /// Back to `Idle` with no data and no error
    pub fn clear(&mut self) {
        self.state.status = FetchStatus::Idle;
        self.data = None;
        self.error = None;
    }

    /// Whether a response for `request_id` may still mutate state
    pub fn is_current(&self, request_id: RequestId) -> bool {
        self.state.is_in_flight() && self.state.request_id == request_id
    }

    /// Apply a response, enforcing the generation rule
    pub fn resolve(&mut self, request_id: RequestId, outcome: Result<T, FetchError>) -> Resolution {
        if !self.is_current(request_id) {
            return Resolution::Stale;
        }
        match outcome {
            Ok(data) => {
                self.succeed(data);
                Resolution::Applied
            }
            Err(error) => Resolution::Failed(self.fail(error)),
        }
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.state.status = FetchStatus::Succeeded;
        self.data = Some(data);
        self.error = None;
    }

    /// Record a failure; previously applied data stays in place
    pub(crate) fn fail(&mut self, error: FetchError) -> ErrorNotice {
        self.state.status = FetchStatus::Failed;
        let notice = ErrorNotice::new(self.channel, error);
        self.error = Some(notice.clone());
        notice
    }
}
