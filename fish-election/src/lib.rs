//! Per-application round-based election, allocation, and deallocation
//! scheduler (C1-C9). This crate is the Application lifecycle engine: given
//! a `StateStore`, a `ClusterTransport`, and a set of `Driver`s, it decides
//! which node runs which Application and drives it from submission through
//! allocation, task execution, and deallocation.

pub mod capacity;
pub mod clock;
pub mod cluster;
mod dispatcher;
pub mod driver;
mod duration;
mod election;
mod engine;
mod errors;
mod execution;
pub mod model;
mod selection;
pub mod store;
mod timeout;
pub mod votes;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use dispatcher::DispatchSignal;
pub use duration::{parse_lifetime, DurationParseError};
pub use engine::{
    Engine, EngineConfig, ImportError, ImportKind, DEALLOCATION_RETRY_ATTEMPTS,
    DEALLOCATION_RETRY_GAP, ELECTION_POLL_INTERVAL, ELECTION_ROUND_TIME,
};
pub use store::StoreError;
pub use timeout::TimeoutScheduler;
