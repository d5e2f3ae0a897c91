//! Positioning algorithms

pub mod geo;
pub mod locator;

pub use locator::{SolverError, VlblLocator, MIN_BASE_POINTS};
