//! VLBL Target Tracker
//!
//! Coordinates a surface operator station with a submerged acoustic
//! transponder over a half-duplex serial/acoustic link and maintains a live
//! position estimate of the transponder from slant-range measurements
//! against a moving surface baseline.

pub mod algorithms;
pub mod core;
pub mod hardware;
pub mod processing;
pub mod session;
pub mod tracking;
pub mod utils;

// Re-export commonly used types
pub use crate::algorithms::locator::{SolverError, VlblLocator};
pub use crate::core::aging::AgingValue;
pub use crate::core::types::{
    BasePoint, BestFix, GeoPoint, LocalizationResult, MeasurementRecord, Track,
};
pub use crate::hardware::{LinkError, MockTransport, SerialTransport, Transport};
pub use crate::processing::codec::{CodecError, RemoteCommand, Sentence, SentenceCodec};
pub use crate::processing::sound_speed::SoundSpeedEstimator;
pub use crate::session::{
    NullSink, SessionConfig, SessionCoordinator, SessionEvent, SessionState, Sink,
};
pub use crate::tracking::{FixTracker, MeasurementBuffer};
pub use crate::utils::config::AppConfig;
