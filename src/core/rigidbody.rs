use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::types::{MassData, Rot, Sweep, Transform, Velocity};
use crate::{
    utils::allocator::{BodyId, ContactKey, FixtureId, JointId},
    utils::math::{cross, cross_sv},
};

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by hand.
    #[default]
    Static,
    /// Zero mass, velocity set by the user, moved by the solver.
    Kinematic,
    /// Positive mass, velocity determined by forces and constraints.
    Dynamic,
}

/// Construction parameters for a [`RigidBody`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Opts a dynamic body into continuous collision against other dynamic bodies.
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f32,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    pub fn dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Self::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            ..Self::default()
        }
    }

    pub fn fixed() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: f32) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Rigid body state owned by the world.
///
/// Bodies keep handle lists of their fixtures, contacts and joints; none of those lists own the
/// referenced items.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub(crate) id: BodyId,
    pub(crate) body_type: BodyType,
    pub(crate) transform: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) velocity: Velocity,
    pub(crate) force: Vec2,
    pub(crate) torque: f32,
    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) sleep_time: f32,
    pub(crate) awake: bool,
    pub(crate) allow_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,
    pub(crate) user_data: u64,
    pub(crate) fixtures: Vec<FixtureId>,
    pub(crate) contacts: Vec<ContactKey>,
    pub(crate) joints: Vec<JointId>,
}

impl RigidBody {
    pub(crate) fn new(id: BodyId, def: &BodyDef) -> Self {
        let transform = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };
        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };
        let moving = def.body_type != BodyType::Static;

        Self {
            id,
            body_type: def.body_type,
            transform,
            sweep,
            velocity: if moving {
                Velocity {
                    linear: def.linear_velocity,
                    angular: def.angular_velocity,
                }
            } else {
                Velocity::default()
            },
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake && moving,
            allow_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            user_data: def.user_data,
            fixtures: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// World position of the body origin.
    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.velocity.linear
    }

    pub fn angular_velocity(&self) -> f32 {
        self.velocity.angular
    }

    /// Velocity of a world point attached to this body.
    pub fn linear_velocity_at(&self, world_point: Vec2) -> Vec2 {
        self.velocity.linear + cross_sv(self.velocity.angular, world_point - self.sweep.c)
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.length_squared()
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn set_damping(&mut self, linear: f32, angular: f32) {
        self.linear_damping = linear;
        self.angular_damping = angular;
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn sleep_time(&self) -> f32 {
        self.sleep_time
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.allow_sleep
    }

    pub fn set_sleeping_allowed(&mut self, allow: bool) {
        self.allow_sleep = allow;
        if !allow {
            self.set_awake(true);
        }
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    pub fn contacts(&self) -> &[ContactKey] {
        &self.contacts
    }

    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Wakes the body or puts it to sleep. Sleeping clears velocity and pending forces.
    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.velocity = Velocity::default();
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if velocity.length_squared() > 0.0 {
            self.set_awake(true);
        }
        self.velocity.linear = velocity;
    }

    pub fn set_angular_velocity(&mut self, velocity: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if velocity * velocity > 0.0 {
            self.set_awake(true);
        }
        self.velocity.angular = velocity;
    }

    /// Applies a force at a world point. Ignored on sleeping bodies unless `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
        self.torque += cross(point - self.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Instantly changes velocity by an impulse applied at a world point.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.velocity.linear += self.inv_mass * impulse;
        self.velocity.angular += self.inv_inertia * cross(point - self.sweep.c, impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.accepts_input(wake) {
            return;
        }
        self.velocity.angular += self.inv_inertia * impulse;
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.transform.apply_inverse(world_point)
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.transform.apply(local_point)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.transform.rotation.apply_inverse(world_vector)
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.transform.rotation.apply(local_vector)
    }

    fn accepts_input(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        self.awake
    }

    /// At least one side of a contact must be dynamic.
    pub(crate) fn should_collide_type(&self, other: &RigidBody) -> bool {
        self.body_type == BodyType::Dynamic || other.body_type == BodyType::Dynamic
    }

    /// Rebuilds the transform from the end pose of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.transform.rotation = Rot::from_angle(self.sweep.a);
        self.transform.position = self.sweep.c - self.transform.rotation.apply(self.sweep.local_center);
    }

    /// Transform at the start of the sweep.
    pub(crate) fn start_transform(&self) -> Transform {
        let rotation = Rot::from_angle(self.sweep.a0);
        Transform {
            position: self.sweep.c0 - rotation.apply(self.sweep.local_center),
            rotation,
        }
    }

    /// Moves the body back along its sweep to `alpha` and rebuilds the transform there.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.transform = Transform::new(position, angle);
        self.sweep.c = self.transform.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Recomputes mass, center of mass and inertia from per-fixture mass data.
    pub(crate) fn reset_mass_data(&mut self, fixture_masses: impl IntoIterator<Item = MassData>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.transform.position;
            self.sweep.c = self.transform.position;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        let mut inertia = 0.0;
        for data in fixture_masses {
            if data.mass == 0.0 {
                continue;
            }
            self.mass += data.mass;
            local_center += data.mass * data.center;
            inertia += data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Dynamic bodies always have positive mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if inertia > 0.0 && !self.fixed_rotation {
            // Shift inertia to the center of mass.
            self.inertia = inertia - self.mass * local_center.length_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = if self.inertia > 0.0 { 1.0 / self.inertia } else { 0.0 };
        }

        // Keep the center-of-mass velocity consistent with the new center.
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.transform.apply(local_center);
        self.sweep.c0 = self.sweep.c;
        self.velocity.linear += cross_sv(self.velocity.angular, self.sweep.c - old_center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn body(def: BodyDef) -> RigidBody {
        RigidBody::new(BodyId::default(), &def)
    }

    #[test]
    fn static_bodies_ignore_velocity_and_forces() {
        let mut b = body(BodyDef::fixed().with_linear_velocity(Vec2::X));
        assert_eq!(b.linear_velocity(), Vec2::ZERO);
        b.apply_force_to_center(Vec2::Y, true);
        assert_eq!(b.force, Vec2::ZERO);
        assert!(!b.is_awake());
    }

    #[test]
    fn mass_data_moves_center_and_keeps_origin_inertia() {
        let mut b = body(BodyDef::dynamic().with_position(Vec2::new(1.0, 0.0)));
        b.reset_mass_data([MassData {
            mass: 2.0,
            center: Vec2::new(0.5, 0.0),
            inertia: 2.0 * (0.5 + 0.25),
        }]);
        assert_relative_eq!(b.mass(), 2.0);
        assert_relative_eq!(b.world_center().x, 1.5);
        assert_relative_eq!(b.inertia, 1.0, epsilon = 1e-6);
        assert_relative_eq!(b.inertia(), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn sleeping_clears_motion_and_waking_resets_timer() {
        let mut b = body(BodyDef::dynamic().with_linear_velocity(Vec2::X));
        b.sleep_time = 0.3;
        b.set_awake(false);
        assert_eq!(b.linear_velocity(), Vec2::ZERO);
        b.apply_force_to_center(Vec2::Y, false);
        assert_eq!(b.force, Vec2::ZERO);
        b.apply_linear_impulse(Vec2::Y, b.world_center(), true);
        assert!(b.is_awake());
        assert_eq!(b.sleep_time(), 0.0);
        assert_relative_eq!(b.linear_velocity().y, 1.0);
    }

    #[test]
    fn advance_rewinds_along_the_sweep() {
        let mut b = body(BodyDef::dynamic());
        b.sweep.c = Vec2::new(2.0, 0.0);
        b.sweep.a = 1.0;
        b.advance(0.5);
        assert_relative_eq!(b.position().x, 1.0);
        assert_relative_eq!(b.angle(), 0.5);
        assert_relative_eq!(b.sweep.alpha0, 0.5);
    }
}
