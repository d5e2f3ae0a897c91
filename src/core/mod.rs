//! Core types and constants for the VLBL tracking system

pub mod aging;
pub mod constants;
pub mod types;

pub use aging::AgingValue;
pub use constants::*;
pub use types::*;
