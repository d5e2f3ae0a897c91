//! Device session coordination

pub mod coordinator;
pub mod runner;
pub mod sink;
pub mod state;

pub use coordinator::{SessionConfig, SessionCoordinator};
pub use runner::{event_channel, run, spawn_ticker, SessionEvent};
pub use sink::{NullSink, RecordingSink, Sink};
pub use state::{PendingRequest, SessionState};
