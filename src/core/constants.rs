//! Physical constants and protocol parameters

/// Speed of sound in water under standard conditions (m/s)
pub const SPEED_OF_SOUND_WATER: f64 = 1500.0;

/// Angular diversity a base-point set must exceed before a fix is attempted
/// (degrees, as seen from the reference point)
pub const SUFFICIENT_ANGULAR_RANGE_DEG: f64 = 270.0;

/// Ticks a command may wait for its local acknowledgement
pub const LOCAL_TIMEOUT_TICKS: u64 = 2;

/// Ticks a remote-tagged command may wait for its acoustic response
pub const REMOTE_TIMEOUT_TICKS: u64 = 3;

/// Approximate metres per degree of latitude on the WGS84 ellipsoid
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Standard atmospheric pressure at sea level (mBar)
pub const ATMOSPHERIC_PRESSURE_MBAR: f64 = 1013.25;

/// Hydrostatic pressure gradient of seawater (mBar per metre of depth)
pub const PRESSURE_MBAR_PER_METER: f64 = 98.1;
