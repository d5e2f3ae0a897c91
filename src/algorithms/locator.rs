//! VLBL multilateration solver
//!
//! Turns a set of surface base points (position + measured slant range) into
//! a target position estimate by minimizing the RMS range residual over a
//! local tangent plane with a 2-D Nelder-Mead simplex. The search starts at
//! the caller's reference point, which biases the solver toward the region
//! the coordinator currently believes the target to be in. The solver keeps
//! no state between calls.

use crate::algorithms::geo;
use crate::core::types::{BasePoint, GeoPoint, LocalizationResult};
use nalgebra::Vector2;
use std::fmt;

/// Minimum number of base points for a 2-D multilateration solve
pub const MIN_BASE_POINTS: usize = 3;

/// Solver failure modes
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Not enough base points for a solve
    InsufficientBasePoints { available: usize, required: usize },
    /// Objective evaluated to a non-finite value (corrupt input)
    NonFiniteObjective,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InsufficientBasePoints { available, required } => {
                write!(f, "insufficient base points: {} of {} required", available, required)
            }
            SolverError::NonFiniteObjective => {
                write!(f, "range residual is not finite")
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// Nelder-Mead parameters: reflection, expansion, contraction, shrink
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Range-residual multilateration over a moving surface baseline
#[derive(Debug, Clone)]
pub struct VlblLocator {
    /// Iteration cap for the simplex search
    pub max_iterations: usize,
    /// Simplex diameter below which the search stops (m)
    pub convergence_tolerance: f64,
    /// Initial simplex edge length around the reference point (m)
    pub initial_step_m: f64,
}

impl Default for VlblLocator {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            convergence_tolerance: 1e-3,
            initial_step_m: 25.0,
        }
    }
}

impl VlblLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve for the target position
    ///
    /// `reference` seeds the search; `target_depth` fixes the vertical
    /// component of every predicted slant range (base points ride at the
    /// surface). `error_threshold` is the residual considered good enough
    /// to stop early. Returns the result and the iteration count.
    pub fn locate(
        &self,
        base_points: &[BasePoint],
        reference: GeoPoint,
        target_depth: f64,
        error_threshold: f64,
    ) -> Result<(LocalizationResult, usize), SolverError> {
        if base_points.len() < MIN_BASE_POINTS {
            return Err(SolverError::InsufficientBasePoints {
                available: base_points.len(),
                required: MIN_BASE_POINTS,
            });
        }

        let anchors: Vec<(Vector2<f64>, f64)> = base_points
            .iter()
            .map(|b| {
                (
                    geo::to_local(GeoPoint::new(b.latitude, b.longitude), reference),
                    b.slant_range,
                )
            })
            .collect();

        let cost = |p: &Vector2<f64>| rms_residual(p, &anchors, target_depth);

        // Simplex seeded on the reference point (local origin)
        let mut simplex = [
            Vector2::new(0.0, 0.0),
            Vector2::new(self.initial_step_m, 0.0),
            Vector2::new(0.0, self.initial_step_m),
        ];
        let mut costs = [cost(&simplex[0]), cost(&simplex[1]), cost(&simplex[2])];
        if costs.iter().any(|c| !c.is_finite()) {
            return Err(SolverError::NonFiniteObjective);
        }

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;

            // Order best..worst
            let mut order = [0usize, 1, 2];
            order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
            let (best, mid, worst) = (order[0], order[1], order[2]);

            let diameter = (simplex[best] - simplex[worst])
                .norm()
                .max((simplex[best] - simplex[mid]).norm());
            if diameter < self.convergence_tolerance || costs[best] <= error_threshold {
                break;
            }

            let centroid = (simplex[best] + simplex[mid]) / 2.0;
            let reflected = centroid + ALPHA * (centroid - simplex[worst]);
            let reflected_cost = cost(&reflected);

            if reflected_cost < costs[best] {
                let expanded = centroid + GAMMA * (reflected - centroid);
                let expanded_cost = cost(&expanded);
                if expanded_cost < reflected_cost {
                    simplex[worst] = expanded;
                    costs[worst] = expanded_cost;
                } else {
                    simplex[worst] = reflected;
                    costs[worst] = reflected_cost;
                }
            } else if reflected_cost < costs[mid] {
                simplex[worst] = reflected;
                costs[worst] = reflected_cost;
            } else {
                let contracted = centroid + RHO * (simplex[worst] - centroid);
                let contracted_cost = cost(&contracted);
                if contracted_cost < costs[worst] {
                    simplex[worst] = contracted;
                    costs[worst] = contracted_cost;
                } else {
                    // Shrink toward the best vertex
                    for i in 0..3 {
                        if i != best {
                            simplex[i] = simplex[best] + SIGMA * (simplex[i] - simplex[best]);
                            costs[i] = cost(&simplex[i]);
                        }
                    }
                }
            }

            if costs.iter().any(|c| !c.is_finite()) {
                return Err(SolverError::NonFiniteObjective);
            }
        }

        let best = (0..3)
            .min_by(|&a, &b| costs[a].total_cmp(&costs[b]))
            .unwrap_or(0);
        let position = geo::to_geodetic(simplex[best], reference);
        Ok((
            LocalizationResult {
                latitude: position.latitude,
                longitude: position.longitude,
                radial_error: costs[best],
                depth: target_depth,
            },
            iterations,
        ))
    }
}

/// RMS of (predicted slant range - measured slant range) over all anchors
fn rms_residual(candidate: &Vector2<f64>, anchors: &[(Vector2<f64>, f64)], depth: f64) -> f64 {
    let sum: f64 = anchors
        .iter()
        .map(|(anchor, range)| {
            let horizontal = (candidate - anchor).norm();
            let predicted = (horizontal * horizontal + depth * depth).sqrt();
            let residual = predicted - range;
            residual * residual
        })
        .sum();
    (sum / anchors.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: GeoPoint = GeoPoint {
        latitude: 48.5,
        longitude: 44.5,
    };
    const DEPTH: f64 = 30.0;

    /// Base points on a circle of `radius` metres around the target, with
    /// exact slant ranges
    fn ring_base(bearings_deg: &[f64], radius: f64) -> Vec<BasePoint> {
        let slant = (radius * radius + DEPTH * DEPTH).sqrt();
        bearings_deg
            .iter()
            .map(|b| {
                let rad = b.to_radians();
                let local = Vector2::new(radius * rad.sin(), radius * rad.cos());
                let p = geo::to_geodetic(local, TARGET);
                BasePoint {
                    latitude: p.latitude,
                    longitude: p.longitude,
                    slant_range: slant,
                }
            })
            .collect()
    }

    #[test]
    fn test_recovers_synthetic_target() {
        let base = ring_base(&[0.0, 90.0, 180.0, 270.0], 100.0);
        // Seed the search 40 m off the true position
        let reference = geo::to_geodetic(Vector2::new(40.0, -20.0), TARGET);
        let locator = VlblLocator::new();
        let (result, iterations) = locator.locate(&base, reference, DEPTH, 0.0).unwrap();
        let offset = geo::to_local(GeoPoint::new(result.latitude, result.longitude), TARGET);
        assert!(offset.norm() < 2.0, "offset = {} m", offset.norm());
        assert!(result.radial_error < 1.0, "residual = {}", result.radial_error);
        assert!(iterations > 0 && iterations <= locator.max_iterations);
        assert_eq!(result.depth, DEPTH);
    }

    #[test]
    fn test_insufficient_base_points() {
        let base = ring_base(&[0.0, 90.0], 100.0);
        let locator = VlblLocator::new();
        let result = locator.locate(&base, TARGET, DEPTH, 0.0);
        assert_eq!(
            result,
            Err(SolverError::InsufficientBasePoints {
                available: 2,
                required: MIN_BASE_POINTS
            })
        );
    }

    #[test]
    fn test_error_threshold_stops_early() {
        let base = ring_base(&[0.0, 120.0, 240.0], 150.0);
        let locator = VlblLocator::new();
        let (_, strict_iterations) = locator.locate(&base, TARGET, DEPTH, 0.0).unwrap();
        let (_, lax_iterations) = locator.locate(&base, TARGET, DEPTH, 50.0).unwrap();
        assert!(lax_iterations <= strict_iterations);
    }

    #[test]
    fn test_stateless_between_calls() {
        let base = ring_base(&[0.0, 90.0, 180.0, 270.0], 100.0);
        let locator = VlblLocator::new();
        let first = locator.locate(&base, TARGET, DEPTH, 0.0).unwrap();
        let second = locator.locate(&base, TARGET, DEPTH, 0.0).unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }
}
