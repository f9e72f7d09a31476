//! Global configuration constants and the per-world tuning value.

use serde::{Deserialize, Serialize};

use crate::core::types::MixingMode;

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -10.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Velocity iterations performed per step.
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 8;

/// Position iterations performed per step.
pub const DEFAULT_POSITION_ITERATIONS: u32 = 3;

/// Collision and constraint tolerance, in meters.
pub const LINEAR_SLOP: f32 = 0.005;

/// Collision and constraint tolerance, in radians.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Skin radius around polygons; keeps polygon cores apart so GJK stays well-conditioned.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum vertices on a convex polygon (and therefore on a distance proxy).
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum contact points in a manifold.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Fattening applied to broad-phase AABBs.
pub const DEFAULT_AABB_MARGIN: f32 = 0.1;

/// Scale applied to the displacement when predicting fat AABB motion.
pub const DEFAULT_AABB_MULTIPLIER: f32 = 4.0;

/// Seconds a body must stay below the sleep tolerances before its island sleeps.
pub const DEFAULT_TIME_TO_SLEEP: f32 = 0.5;

/// Default cap on GJK iterations.
pub const DEFAULT_GJK_MAX_ITERATIONS: u32 = 20;

/// Default cap on conservative-advancement iterations.
pub const DEFAULT_TOI_MAX_ITERATIONS: u32 = 20;

/// Immutable tuning passed to the world; every tolerance and iteration count lives here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed step used by [`crate::world::PhysicsWorld::advance`].
    pub time_step: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub linear_slop: f32,
    pub angular_slop: f32,
    pub aabb_margin: f32,
    pub aabb_multiplier: f32,
    /// Maximum linear position correction applied per position iteration.
    pub max_linear_correction: f32,
    /// Maximum angular position correction applied per position iteration.
    pub max_angular_correction: f32,
    /// Maximum translation of a body per step (prevents numerical blow-ups).
    pub max_translation: f32,
    /// Maximum rotation of a body per step.
    pub max_rotation: f32,
    /// Fraction of overlap resolved per position iteration.
    pub baumgarte: f32,
    pub toi_baumgarte: f32,
    /// Relative normal speed below which collisions are treated as inelastic.
    pub restitution_threshold: f32,
    pub time_to_sleep: f32,
    pub linear_sleep_tolerance: f32,
    pub angular_sleep_tolerance: f32,
    pub allow_sleep: bool,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    /// Stop after the first TOI event each step (debugging aid).
    pub sub_stepping: bool,
    pub max_sub_steps: u32,
    pub max_toi_contacts: usize,
    pub gjk_max_iterations: u32,
    pub toi_max_iterations: u32,
    pub friction_mixing: MixingMode,
    pub restitution_mixing: MixingMode,
    /// Wall-clock budget per step; overruns are logged and flagged in the step profile.
    pub step_budget_ms: Option<f32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            velocity_iterations: DEFAULT_VELOCITY_ITERATIONS,
            position_iterations: DEFAULT_POSITION_ITERATIONS,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            aabb_margin: DEFAULT_AABB_MARGIN,
            aabb_multiplier: DEFAULT_AABB_MULTIPLIER,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * std::f32::consts::PI,
            max_translation: 2.0,
            max_rotation: 0.5 * std::f32::consts::PI,
            baumgarte: 0.2,
            toi_baumgarte: 0.75,
            restitution_threshold: 1.0,
            time_to_sleep: DEFAULT_TIME_TO_SLEEP,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * std::f32::consts::PI,
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            max_sub_steps: 8,
            max_toi_contacts: 32,
            gjk_max_iterations: DEFAULT_GJK_MAX_ITERATIONS,
            toi_max_iterations: DEFAULT_TOI_MAX_ITERATIONS,
            friction_mixing: MixingMode::GeometricMean,
            restitution_mixing: MixingMode::Max,
            step_budget_ms: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_continuous_physics(mut self, enabled: bool) -> Self {
        self.continuous_physics = enabled;
        self
    }

    pub fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    pub fn with_step_budget(mut self, budget_ms: f32) -> Self {
        self.step_budget_ms = Some(budget_ms);
        self
    }

    pub fn with_mixing(mut self, friction: MixingMode, restitution: MixingMode) -> Self {
        self.friction_mixing = friction;
        self.restitution_mixing = restitution;
        self
    }

    /// Squared form of [`Self::max_translation`], used in the integrator hot loop.
    pub fn max_translation_squared(&self) -> f32 {
        self.max_translation * self.max_translation
    }

    pub fn max_rotation_squared(&self) -> f32 {
        self.max_rotation * self.max_rotation
    }

    /// Checks that every tolerance is usable; returns a description of the first bad field.
    pub fn validate(&self) -> Result<(), crate::PhysicsError> {
        let positive = [
            ("time_step", self.time_step),
            ("linear_slop", self.linear_slop),
            ("angular_slop", self.angular_slop),
            ("max_translation", self.max_translation),
            ("max_rotation", self.max_rotation),
            ("max_linear_correction", self.max_linear_correction),
            ("max_angular_correction", self.max_angular_correction),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(crate::PhysicsError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.baumgarte) || !(0.0..=1.0).contains(&self.toi_baumgarte) {
            return Err(crate::PhysicsError::InvalidConfig(
                "baumgarte factors must lie in [0, 1]".to_string(),
            ));
        }
        if self.aabb_margin < 0.0 || self.aabb_multiplier < 0.0 {
            return Err(crate::PhysicsError::InvalidConfig(
                "aabb margin and multiplier must be non-negative".to_string(),
            ));
        }
        if let Some(budget) = self.step_budget_ms {
            if !(budget.is_finite() && budget >= 0.0) {
                return Err(crate::PhysicsError::InvalidConfig(format!(
                    "step_budget_ms must be non-negative and finite, got {budget}"
                )));
            }
        }
        if self.velocity_iterations == 0 {
            return Err(crate::PhysicsError::InvalidConfig(
                "velocity_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
