//! Fetch coordination for the three asynchronous channels
//!
//! Each channel keeps a generation counter. A response is applied only when
//! it carries the channel's current request id while the channel is still in
//! flight; everything else is dropped on arrival. That single rule gives
//! last-triggered-wins ordering within a channel and makes cancel and clear
//! cooperative: nothing has to be interrupted at the transport level.

mod channel;
mod coordinator;
mod debounce;

pub use channel::{FetchChannel, Resolution};
pub use coordinator::{FetchCoordinator, FetchResponse, FetchUpdate};
pub use debounce::{Admission, Debouncer};

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the independent asynchronous data streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Suggestions,
    Results,
    Geometry,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Suggestions, Channel::Results, Channel::Geometry];

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Suggestions => 0,
            Channel::Results => 1,
            Channel::Geometry => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Suggestions => "suggestions",
            Channel::Results => "results",
            Channel::Geometry => "geometry",
        })
    }
}

/// Per-channel generation counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    fn next(self) -> Self {
        RequestId(self.0 + 1)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchStatus {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
    Cancelled,
}

/// Status of the latest request on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchState {
    pub request_id: RequestId,
    pub status: FetchStatus,
}

impl FetchState {
    pub fn is_in_flight(&self) -> bool {
        self.status == FetchStatus::InFlight
    }
}
