use glam::Vec2;

use crate::{
    config::SimulationConfig,
    core::{
        rigidbody::{BodyType, RigidBody},
        types::{Position, Velocity},
    },
};

/// Semi-implicit Euler integration shared by island, TOI and kinematic passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    pub gravity: Vec2,
    pub max_translation: f32,
    pub max_rotation: f32,
}

impl Integrator {
    pub fn new(gravity: Vec2, config: &SimulationConfig) -> Self {
        Self {
            gravity,
            max_translation: config.max_translation,
            max_rotation: config.max_rotation,
        }
    }

    /// Applies gravity, accumulated forces and damping. Non-dynamic bodies keep their velocity.
    pub fn integrate_velocity(&self, body: &RigidBody, velocity: Velocity, h: f32) -> Velocity {
        if body.body_type != BodyType::Dynamic {
            return velocity;
        }

        let mut v = velocity.linear + h * body.inv_mass * (body.gravity_scale * body.mass * self.gravity + body.force);
        let mut w = velocity.angular + h * body.inv_inertia * body.torque;

        // Pade approximation of exp(-c * h), stable for large damping.
        v *= 1.0 / (1.0 + h * body.linear_damping);
        w *= 1.0 / (1.0 + h * body.angular_damping);

        Velocity { linear: v, angular: w }
    }

    /// Advances a pose, clamping per-step motion so tunneling stays bounded.
    pub fn integrate_position(&self, position: &mut Position, velocity: &mut Velocity, h: f32) {
        let translation = h * velocity.linear;
        if translation.length_squared() > self.max_translation * self.max_translation {
            velocity.linear *= self.max_translation / translation.length();
        }

        let rotation = h * velocity.angular;
        if rotation * rotation > self.max_rotation * self.max_rotation {
            velocity.angular *= self.max_rotation / rotation.abs();
        }

        position.center += h * velocity.linear;
        position.angle += h * velocity.angular;
    }
}
