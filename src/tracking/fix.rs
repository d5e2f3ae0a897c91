//! Best-fix tracking and reference-point feedback
//!
//! Keeps the lowest-error fix seen so far and feeds it back into the
//! measurement buffer as the solver's reference point, so that each
//! improved fix narrows the search region for the next solve. Before any
//! fix exists the reference point follows the measurement centroid; the
//! switch to best-fix mode is one-way.

use crate::core::types::{BestFix, GeoPoint, LocalizationResult};
use crate::tracking::buffer::MeasurementBuffer;

/// Running best-fix estimate and target-track history
#[derive(Debug, Clone, Default)]
pub struct FixTracker {
    best: BestFix,
    track: Vec<LocalizationResult>,
}

impl FixTracker {
    pub fn new() -> Self {
        Self {
            best: BestFix::unknown(),
            track: Vec::new(),
        }
    }

    /// Offer a solver result; returns whether it became the new best fix
    ///
    /// Accepted means no fix existed yet or the radial error strictly
    /// improved; the buffer's reference point is then moved onto the fix.
    /// Rejected results are still appended to the target track for display
    /// and export.
    pub fn offer(&mut self, result: LocalizationResult, buffer: &mut MeasurementBuffer) -> bool {
        self.track.push(result);

        if self.best.is_known() && result.radial_error >= self.best.radial_error {
            return false;
        }

        self.best = BestFix {
            latitude: result.latitude,
            longitude: result.longitude,
            radial_error: result.radial_error,
        };
        buffer.update_reference_point(GeoPoint::new(result.latitude, result.longitude));
        true
    }

    /// Track the measurement centroid while no fix exists yet
    ///
    /// Once any fix has been accepted this is a no-op; the reference point
    /// never reverts to centroid mode.
    pub fn refine_reference_from_centroid(&self, buffer: &mut MeasurementBuffer) {
        if self.best.is_known() {
            return;
        }
        if let Some(centroid) = buffer.center_of_mass() {
            buffer.update_reference_point(centroid);
        }
    }

    pub fn best(&self) -> &BestFix {
        &self.best
    }

    /// Every offered result, in arrival order
    pub fn target_track(&self) -> &[LocalizationResult] {
        &self.track
    }
}
