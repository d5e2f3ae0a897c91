//! Measurement history, baseline geometry and best-fix tracking

pub mod buffer;
pub mod fix;

pub use buffer::MeasurementBuffer;
pub use fix::FixTracker;
