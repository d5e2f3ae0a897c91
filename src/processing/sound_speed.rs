//! Propagation-speed estimation from ambient telemetry
//!
//! Slant ranges are derived from one-way acoustic travel times, so the
//! quality of every range measurement hinges on the speed-of-sound estimate.
//! The estimator recomputes whenever a fresh temperature or pressure reading
//! arrives; until both exist it silently keeps the previous value.

use crate::core::aging::AgingValue;
use crate::core::constants::{
    ATMOSPHERIC_PRESSURE_MBAR, PRESSURE_MBAR_PER_METER, SPEED_OF_SOUND_WATER,
};

/// Running speed-of-sound estimate (m/s)
#[derive(Debug, Clone)]
pub struct SoundSpeedEstimator {
    speed_ms: f64,
}

impl SoundSpeedEstimator {
    pub fn new() -> Self {
        Self {
            speed_ms: SPEED_OF_SOUND_WATER,
        }
    }

    /// Current estimate (m/s)
    pub fn speed(&self) -> f64 {
        self.speed_ms
    }

    /// Convert a one-way travel time to a slant range using the current
    /// estimate
    pub fn slant_range(&self, travel_time_s: f64) -> f64 {
        travel_time_s * self.speed_ms
    }

    /// Recompute from ambient readings; returns whether a recomputation
    /// happened
    ///
    /// Both temperature and pressure must have been initialized. A stale
    /// but initialized reading is still used; with either reading missing
    /// the previous estimate is retained unchanged.
    pub fn update(
        &mut self,
        temperature: &AgingValue<f64>,
        pressure: &AgingValue<f64>,
        salinity_psu: f64,
    ) -> bool {
        let (t, p) = match (temperature.value(), pressure.value()) {
            (Some(t), Some(p)) => (t, p),
            _ => return false,
        };
        self.speed_ms = medwin_sound_speed(t, salinity_psu, depth_from_pressure(p));
        true
    }
}

impl Default for SoundSpeedEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Medwin's empirical equation for the speed of sound in seawater
///
/// c = 1449.2 + 4.6T - 0.055T^2 + 0.00029T^3 + (1.34 - 0.01T)(S - 35) + 0.016z
/// with T in °C, S in PSU and depth z in metres.
fn medwin_sound_speed(temperature_c: f64, salinity_psu: f64, depth_m: f64) -> f64 {
    let t = temperature_c;
    1449.2 + 4.6 * t - 0.055 * t * t + 0.00029 * t * t * t
        + (1.34 - 0.01 * t) * (salinity_psu - 35.0)
        + 0.016 * depth_m
}

/// Hydrostatic depth from absolute ambient pressure (mBar)
fn depth_from_pressure(pressure_mbar: f64) -> f64 {
    ((pressure_mbar - ATMOSPHERIC_PRESSURE_MBAR) / PRESSURE_MBAR_PER_METER).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn aging(value: Option<f64>) -> AgingValue<f64> {
        let mut v = AgingValue::new(Duration::from_secs(60));
        if let Some(value) = value {
            v.set(value);
        }
        v
    }

    #[test]
    fn test_default_speed() {
        let estimator = SoundSpeedEstimator::new();
        assert_eq!(estimator.speed(), 1500.0);
    }

    #[test]
    fn test_slant_range_conversion() {
        let estimator = SoundSpeedEstimator::new();
        assert!((estimator.slant_range(0.002) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_update_without_both_readings() {
        let mut estimator = SoundSpeedEstimator::new();
        assert!(!estimator.update(&aging(Some(10.0)), &aging(None), 35.0));
        assert!(!estimator.update(&aging(None), &aging(Some(1013.25)), 35.0));
        assert_eq!(estimator.speed(), 1500.0);
    }

    #[test]
    fn test_update_with_both_readings() {
        let mut estimator = SoundSpeedEstimator::new();
        assert!(estimator.update(&aging(Some(13.0)), &aging(Some(1013.25)), 35.0));
        let speed = estimator.speed();
        assert!(speed > 1449.0 && speed < 1501.0, "speed = {}", speed);
    }

    #[test]
    fn test_warmer_water_is_faster() {
        let mut cold = SoundSpeedEstimator::new();
        let mut warm = SoundSpeedEstimator::new();
        cold.update(&aging(Some(5.0)), &aging(Some(1013.25)), 35.0);
        warm.update(&aging(Some(20.0)), &aging(Some(1013.25)), 35.0);
        assert!(warm.speed() > cold.speed());
    }

    #[test]
    fn test_depth_term_from_pressure() {
        let mut surface = SoundSpeedEstimator::new();
        let mut deep = SoundSpeedEstimator::new();
        surface.update(&aging(Some(10.0)), &aging(Some(1013.25)), 35.0);
        // Roughly 100 m of water column
        deep.update(&aging(Some(10.0)), &aging(Some(11_000.0)), 35.0);
        assert!(deep.speed() > surface.speed());
    }
}
