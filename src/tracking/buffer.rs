//! Bounded measurement history and baseline-geometry assessment
//!
//! Two ring buffers: recent surface base points (the multilateration
//! anchors) and the longer history of individual range measurements. The
//! buffer also owns the current reference point, the vantage from which the
//! angular diversity of the baseline is judged and the position the solver
//! is biased toward.

use crate::algorithms::geo;
use crate::core::constants::SUFFICIENT_ANGULAR_RANGE_DEG;
use crate::core::types::{BasePoint, GeoPoint, MeasurementRecord};
use std::collections::VecDeque;

/// Ring-buffered base points and measurements with centroid and
/// angular-diversity computation
#[derive(Debug, Clone)]
pub struct MeasurementBuffer {
    base: VecDeque<BasePoint>,
    measurements: VecDeque<MeasurementRecord>,
    base_capacity: usize,
    measurements_capacity: usize,
    reference: Option<GeoPoint>,
}

impl MeasurementBuffer {
    pub fn new(measurements_capacity: usize, base_capacity: usize) -> Self {
        Self {
            base: VecDeque::with_capacity(base_capacity),
            measurements: VecDeque::with_capacity(measurements_capacity),
            base_capacity,
            measurements_capacity,
            reference: None,
        }
    }

    /// Append a base point, evicting the oldest on overflow
    pub fn add_base_point(&mut self, point: BasePoint) {
        if self.base.len() == self.base_capacity {
            self.base.pop_front();
        }
        self.base.push_back(point);
    }

    /// Append a measurement record, evicting the oldest on overflow
    pub fn add_measurement(&mut self, record: MeasurementRecord) {
        if self.measurements.len() == self.measurements_capacity {
            self.measurements.pop_front();
        }
        self.measurements.push_back(record);
    }

    /// Current base points, oldest first
    pub fn base_points(&self) -> Vec<BasePoint> {
        self.base.iter().copied().collect()
    }

    /// Measurement history, oldest first
    pub fn measurements(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.measurements.iter()
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    pub fn measurement_len(&self) -> usize {
        self.measurements.len()
    }

    /// Point the solver is biased toward and the vantage for
    /// [`angular_range`](Self::angular_range)
    pub fn reference_point(&self) -> Option<GeoPoint> {
        self.reference
    }

    pub fn update_reference_point(&mut self, point: GeoPoint) {
        self.reference = Some(point);
    }

    /// Angular spread of the base points as seen from the reference point
    /// (degrees)
    ///
    /// Bearings are sorted and the largest circular gap between neighbours
    /// found. A gap strictly narrower than a half-circle means the reference
    /// point is enclosed by the baseline: full 360° coverage. Otherwise the
    /// spread is the arc actually subtended, `360° - gap`. Fewer than two
    /// base points, or no reference point yet, give 0.
    pub fn angular_range(&self) -> f64 {
        let reference = match self.reference {
            Some(r) => r,
            None => return 0.0,
        };
        if self.base.len() < 2 {
            return 0.0;
        }

        let mut bearings: Vec<f64> = self
            .base
            .iter()
            .map(|b| geo::bearing_deg(reference, GeoPoint::new(b.latitude, b.longitude)))
            .collect();
        bearings.sort_by(|a, b| a.total_cmp(b));

        let mut largest_gap = 360.0 - (bearings[bearings.len() - 1] - bearings[0]);
        for pair in bearings.windows(2) {
            let gap = pair[1] - pair[0];
            if gap > largest_gap {
                largest_gap = gap;
            }
        }

        if largest_gap < 180.0 {
            360.0
        } else {
            360.0 - largest_gap
        }
    }

    /// Whether the baseline is diverse enough to attempt a fix
    pub fn has_sufficient_base(&self) -> bool {
        self.angular_range() > SUFFICIENT_ANGULAR_RANGE_DEG
    }

    /// Arithmetic mean of all buffered measurement positions
    pub fn center_of_mass(&self) -> Option<GeoPoint> {
        if self.measurements.is_empty() {
            return None;
        }
        let n = self.measurements.len() as f64;
        let (lat_sum, lon_sum) = self
            .measurements
            .iter()
            .fold((0.0, 0.0), |(lat, lon), m| (lat + m.latitude, lon + m.longitude));
        Some(GeoPoint::new(lat_sum / n, lon_sum / n))
    }
}
