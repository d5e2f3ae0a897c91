//! Core data types for the VLBL tracking system

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Surface anchor for multilateration: a recent vessel position together
/// with the slant range measured from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Slant range to the target measured at this position (m)
    pub slant_range: f64,
}

/// One range measurement paired with the surface fix it was taken at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Slant range to the target (m)
    pub slant_range: f64,
    /// Signal-to-noise ratio of the acoustic response (dB)
    pub signal_to_noise: f64,
    /// Surface-vessel depth reading at measurement time (m)
    pub depth: f64,
}

/// Position estimate produced by the multilateration solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizationResult {
    pub latitude: f64,
    pub longitude: f64,
    /// Estimated horizontal uncertainty radius (m)
    pub radial_error: f64,
    /// Target depth assumed during the solve (m)
    pub depth: f64,
}

/// Lowest-error position fix seen so far
///
/// Starts "unknown" (all fields NaN); once set, the radial error only ever
/// decreases over the fix's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct BestFix {
    pub latitude: f64,
    pub longitude: f64,
    pub radial_error: f64,
}

impl BestFix {
    pub fn unknown() -> Self {
        Self {
            latitude: f64::NAN,
            longitude: f64::NAN,
            radial_error: f64::NAN,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.radial_error.is_nan()
    }
}

impl Default for BestFix {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Named display tracks consumed by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    /// Surface-vessel GNSS track
    Boat,
    /// Current multilateration base points
    Base,
    /// Surface positions where measurements were taken
    Measurements,
    /// All solver fixes
    Target,
    /// Lowest-error fix
    Best,
}

impl Track {
    pub fn name(&self) -> &'static str {
        match self {
            Track::Boat => "BOAT",
            Track::Base => "BASE",
            Track::Measurements => "MEASUREMENTS",
            Track::Target => "TARGET",
            Track::Best => "BEST",
        }
    }
}
