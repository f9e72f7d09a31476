//! Continuous collision: time of impact between two swept convex proxies.
//!
//! Uses conservative advancement. The returned time never passes the first moment at which the
//! cores come within `target` of each other, so a body placed at that time is still separated.

use serde::{Deserialize, Serialize};

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::core::types::Sweep;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the search interval, in `[0, 1]`.
    pub t_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToiState {
    /// The cores reached the target distance at `t`.
    Touching,
    /// No impact before `t_max`.
    Separated,
    /// Already closer than the target at the start of the interval.
    Overlapped,
    /// Gave up; `t` is still a safe lower bound.
    MaxIterationsReached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
    pub iterations: u32,
}

/// Core distance the solver aims to leave between two shapes after a TOI event.
///
/// Keeps a little overlap of the rounded skins so the contact stays touching afterwards.
pub fn default_toi_target(total_radius: f32, linear_slop: f32) -> f32 {
    linear_slop.max(total_radius - 3.0 * linear_slop)
}

/// Earliest time in `[0, t_max]` at which the core distance drops to `target`.
pub fn time_of_impact(input: &ToiInput, target: f32, tolerance: f32, max_iterations: u32) -> ToiOutput {
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    // Per unit of t the sweeps move by their full displacement.
    let v_a = sweep_a.c - sweep_a.c0;
    let v_b = sweep_b.c - sweep_b.c0;
    let angular_bound = (sweep_a.a - sweep_a.a0).abs() * input.proxy_a.max_extent(sweep_a.local_center)
        + (sweep_b.a - sweep_b.a0).abs() * input.proxy_b.max_extent(sweep_b.local_center);

    let t_max = input.t_max;
    let mut cache = SimplexCache::default();
    let mut t = 0.0_f32;
    let mut iterations = 0;

    loop {
        let xf_a = sweep_a.transform_at(t);
        let xf_b = sweep_b.transform_at(t);
        let output = distance(
            &DistanceInput::new(input.proxy_a, xf_a, input.proxy_b, xf_b),
            &mut cache,
        );
        let d = output.distance;

        if d < target - tolerance {
            let state = if iterations == 0 { ToiState::Overlapped } else { ToiState::Touching };
            return ToiOutput { state, t, iterations };
        }
        if d <= target + tolerance {
            return ToiOutput {
                state: ToiState::Touching,
                t,
                iterations,
            };
        }

        let normal = (output.point_b - output.point_a) / d;
        let bound = normal.dot(v_a - v_b) + angular_bound;
        if bound <= f32::EPSILON {
            return ToiOutput {
                state: ToiState::Separated,
                t: t_max,
                iterations,
            };
        }

        t += (d - target) / bound;
        iterations += 1;

        if t >= t_max {
            return ToiOutput {
                state: ToiState::Separated,
                t: t_max,
                iterations,
            };
        }
        if iterations >= max_iterations {
            log::warn!("time of impact did not converge after {iterations} iterations (t = {t})");
            return ToiOutput {
                state: ToiState::MaxIterationsReached,
                t,
                iterations,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{PolygonShape, Shape};
    use glam::Vec2;

    fn point_proxy() -> DistanceProxy {
        DistanceProxy::new(&[Vec2::ZERO], 1.0)
    }

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..Default::default()
        }
    }

    #[test]
    fn fast_circle_touches_halfway() {
        let input = ToiInput {
            proxy_a: point_proxy(),
            proxy_b: point_proxy(),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(Vec2::new(4.0, 0.0), Vec2::ZERO),
            t_max: 1.0,
        };
        let output = time_of_impact(&input, 2.0, 1e-4, 20);
        assert_eq!(output.state, ToiState::Touching);
        assert!((output.t - 0.5).abs() < 1e-4);
    }

    #[test]
    fn receding_shapes_are_separated() {
        let input = ToiInput {
            proxy_a: point_proxy(),
            proxy_b: point_proxy(),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(Vec2::new(4.0, 0.0), Vec2::new(8.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input, 2.0, 1e-4, 20);
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn short_sweep_that_stops_early_is_separated() {
        let input = ToiInput {
            proxy_a: point_proxy(),
            proxy_b: point_proxy(),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(Vec2::new(4.0, 0.0), Vec2::new(3.0, 0.0)),
            t_max: 1.0,
        };
        assert_eq!(time_of_impact(&input, 2.0, 1e-4, 20).state, ToiState::Separated);
    }

    #[test]
    fn initial_overlap_is_reported() {
        let input = ToiInput {
            proxy_a: point_proxy(),
            proxy_b: point_proxy(),
            sweep_a: Sweep::default(),
            sweep_b: linear_sweep(Vec2::new(1.0, 0.0), Vec2::new(-3.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input, 2.0, 1e-4, 20);
        assert_eq!(output.state, ToiState::Overlapped);
        assert_eq!(output.t, 0.0);
    }

    #[test]
    fn rotating_bar_needs_several_iterations() {
        let bar = Shape::Polygon(PolygonShape::new_box(2.0, 0.1)).distance_proxy(0);
        let sweep_bar = Sweep {
            a: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        let target = DistanceProxy::new(&[Vec2::ZERO], 0.5);
        let sweep_target = linear_sweep(Vec2::new(0.0, 1.5), Vec2::new(0.0, 1.5));
        let input = ToiInput {
            proxy_a: bar,
            proxy_b: target,
            sweep_a: sweep_bar,
            sweep_b: sweep_target,
            t_max: 1.0,
        };

        let capped = time_of_impact(&input, 0.5, 1e-3, 1);
        assert_eq!(capped.state, ToiState::MaxIterationsReached);
        assert!(capped.t > 0.0 && capped.t < 1.0);

        let full = time_of_impact(&input, 0.5, 1e-3, 50);
        assert_eq!(full.state, ToiState::Touching);
        assert!(full.t >= capped.t && full.t < 1.0);

        // Conservative: the bar is not yet inside the target distance.
        let xf_a = input.sweep_a.transform_at(full.t);
        let xf_b = input.sweep_b.transform_at(full.t);
        let d = distance(&DistanceInput::new(bar, xf_a, target, xf_b), &mut SimplexCache::default());
        assert!(d.distance >= 0.5 - 1e-3);
    }

    #[test]
    fn target_keeps_a_sliver_of_overlap() {
        assert!((default_toi_target(0.02, 0.005) - 0.005).abs() < 1e-7);
        assert!((default_toi_target(1.0, 0.005) - 0.985).abs() < 1e-6);
    }
}
