//! Scalar readings with a freshness contract
//!
//! Every instrument reading whose staleness matters (vessel position,
//! temperature, depth, pressure, battery voltage, target-side readings) is
//! held in an [`AgingValue`]: a value, the instant it was last refreshed,
//! and a maximum age after which it counts as obsolete. An obsolete value is
//! not cleared; consumers get the last known value together with the
//! obsolete flag and decide for themselves whether to ignore it.

use std::fmt;
use std::time::{Duration, Instant};

/// A reading with a bounded shelf life
#[derive(Debug, Clone, Copy)]
pub struct AgingValue<T: Copy> {
    value: Option<T>,
    last_update: Instant,
    max_age: Duration,
}

impl<T: Copy> AgingValue<T> {
    /// Create an uninitialized value that stays fresh for `max_age` after
    /// each assignment
    pub fn new(max_age: Duration) -> Self {
        Self {
            value: None,
            last_update: Instant::now(),
            max_age,
        }
    }

    /// Store a fresh reading and restart its age
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.last_update = Instant::now();
    }

    /// Last stored reading, if any was ever stored
    pub fn value(&self) -> Option<T> {
        self.value
    }

    /// Whether a reading has ever been stored
    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the reading has outlived its maximum age
    ///
    /// A value that was never initialized is not obsolete, merely
    /// unavailable.
    pub fn is_obsolete(&self) -> bool {
        self.is_obsolete_at(Instant::now())
    }

    /// Obsolescence evaluated against an explicit instant
    pub fn is_obsolete_at(&self, now: Instant) -> bool {
        self.value.is_some() && now.saturating_duration_since(self.last_update) > self.max_age
    }

    /// Initialized and not obsolete
    pub fn is_fresh(&self) -> bool {
        self.is_initialized() && !self.is_obsolete()
    }
}

impl AgingValue<f64> {
    /// Render the reading with fixed precision and a unit suffix, or `"-"`
    /// when no reading exists yet
    pub fn format(&self, precision: usize, unit: &str) -> String {
        match self.value {
            Some(v) => format!("{:.*}{}", precision, v, unit),
            None => "-".to_string(),
        }
    }
}

impl<T: Copy + fmt::Display> fmt::Display for AgingValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "-"),
        }
    }
}
