//! Joint constraints solved alongside contacts inside an island.

use glam::{Mat2, Mat3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::solver::SolverData;
use crate::{
    core::types::Rot,
    utils::math::{cross, cross_sv, solve22, solve33},
};

/// Capability shared by every joint kind.
pub trait JointConstraint {
    /// Caches anchors and effective masses, then applies warm-start impulses.
    fn init_velocity_constraints(&mut self, data: &mut SolverData);
    fn solve_velocity_constraints(&mut self, data: &mut SolverData);
    /// Returns true once the joint error is within slop.
    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool;
}

/// Island indices and mass data of the two bodies, refreshed at every init.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointBodies {
    pub index_a: usize,
    pub index_b: usize,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
}

impl JointBodies {
    fn load(&mut self, data: &SolverData) {
        let a = data.bodies[self.index_a];
        let b = data.bodies[self.index_b];
        self.local_center_a = a.local_center;
        self.local_center_b = b.local_center;
        self.inv_mass_a = a.inv_mass;
        self.inv_mass_b = b.inv_mass;
        self.inv_i_a = a.inv_inertia;
        self.inv_i_b = b.inv_inertia;
    }
}

/// Keeps two anchor points at a fixed distance; soft when `frequency_hz > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistanceJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    pub frequency_hz: f32,
    pub damping_ratio: f32,
    pub(crate) bodies: JointBodies,
    pub(crate) impulse: f32,
    gamma: f32,
    bias: f32,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl DistanceJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, length: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            length,
            ..Default::default()
        }
    }

    pub fn impulse(&self) -> f32 {
        self.impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u
    }
}

impl JointConstraint for DistanceJoint {
    fn init_velocity_constraints(&mut self, data: &mut SolverData) {
        self.bodies.load(data);
        let JointBodies {
            index_a,
            index_b,
            local_center_a,
            local_center_b,
            inv_mass_a: m_a,
            inv_mass_b: m_b,
            inv_i_a: i_a,
            inv_i_b: i_b,
        } = self.bodies;

        let pos_a = data.positions[index_a];
        let pos_b = data.positions[index_b];
        let mut vel_a = data.velocities[index_a];
        let mut vel_b = data.velocities[index_b];

        let q_a = Rot::from_angle(pos_a.angle);
        let q_b = Rot::from_angle(pos_b.angle);
        self.r_a = q_a.apply(self.local_anchor_a - local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - local_center_b);
        self.u = pos_b.center + self.r_b - pos_a.center - self.r_a;

        let current_length = self.u.length();
        if current_length > data.config.linear_slop {
            self.u /= current_length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_au = cross(self.r_a, self.u);
        let cr_bu = cross(self.r_b, self.u);
        let mut inv_mass = m_a + i_a * cr_au * cr_au + m_b + i_b * cr_bu * cr_bu;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = current_length - self.length;
            let omega = 2.0 * std::f32::consts::PI * self.frequency_hz;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;
            let h = data.step.dt;

            // Soft constraint: gamma adds compliance, bias pulls toward the rest length.
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = self.impulse * self.u;
            vel_a.linear -= m_a * p;
            vel_a.angular -= i_a * cross(self.r_a, p);
            vel_b.linear += m_b * p;
            vel_b.angular += i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
        }

        data.velocities[index_a] = vel_a;
        data.velocities[index_b] = vel_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let b = self.bodies;
        let mut vel_a = data.velocities[b.index_a];
        let mut vel_b = data.velocities[b.index_b];

        let vp_a = vel_a.linear + cross_sv(vel_a.angular, self.r_a);
        let vp_b = vel_b.linear + cross_sv(vel_b.angular, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        vel_a.linear -= b.inv_mass_a * p;
        vel_a.angular -= b.inv_i_a * cross(self.r_a, p);
        vel_b.linear += b.inv_mass_b * p;
        vel_b.angular += b.inv_i_b * cross(self.r_b, p);

        data.velocities[b.index_a] = vel_a;
        data.velocities[b.index_b] = vel_b;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        if self.frequency_hz > 0.0 {
            // Soft joints have no position error to remove.
            return true;
        }

        let b = self.bodies;
        let mut pos_a = data.positions[b.index_a];
        let mut pos_b = data.positions[b.index_b];

        let r_a = Rot::from_angle(pos_a.angle).apply(self.local_anchor_a - b.local_center_a);
        let r_b = Rot::from_angle(pos_b.angle).apply(self.local_anchor_b - b.local_center_b);
        let u = pos_b.center + r_b - pos_a.center - r_a;

        let length = u.length();
        let u = if length > f32::EPSILON { u / length } else { u };
        let max_correction = data.config.max_linear_correction;
        let c = (length - self.length).clamp(-max_correction, max_correction);

        let impulse = -self.mass * c;
        let p = impulse * u;

        pos_a.center -= b.inv_mass_a * p;
        pos_a.angle -= b.inv_i_a * cross(r_a, p);
        pos_b.center += b.inv_mass_b * p;
        pos_b.angle += b.inv_i_b * cross(r_b, p);

        data.positions[b.index_a] = pos_a;
        data.positions[b.index_b] = pos_b;

        c.abs() < data.config.linear_slop
    }
}

/// Shares an anchor point between two bodies; optional angle limits and motor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RevoluteJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    pub(crate) bodies: JointBodies,
    pub(crate) impulse: Vec2,
    pub(crate) motor_impulse: f32,
    pub(crate) lower_impulse: f32,
    pub(crate) upper_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat2,
    angle: f32,
    axial_mass: f32,
}

impl RevoluteJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            ..Default::default()
        }
    }

    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
    }

    fn point_mass(&self, r_a: Vec2, r_b: Vec2) -> Mat2 {
        let b = &self.bodies;
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22))
    }
}

impl JointConstraint for RevoluteJoint {
    fn init_velocity_constraints(&mut self, data: &mut SolverData) {
        self.bodies.load(data);
        let b = self.bodies;
        let pos_a = data.positions[b.index_a];
        let pos_b = data.positions[b.index_b];
        let mut vel_a = data.velocities[b.index_a];
        let mut vel_b = data.velocities[b.index_b];

        self.r_a = Rot::from_angle(pos_a.angle).apply(self.local_anchor_a - b.local_center_a);
        self.r_b = Rot::from_angle(pos_b.angle).apply(self.local_anchor_b - b.local_center_b);
        self.k = self.point_mass(self.r_a, self.r_b);

        self.axial_mass = b.inv_i_a + b.inv_i_b;
        let fixed_rotation = self.axial_mass == 0.0;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.angle = pos_b.angle - pos_a.angle - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;
            vel_a.linear -= b.inv_mass_a * p;
            vel_a.angular -= b.inv_i_a * (cross(self.r_a, p) + axial_impulse);
            vel_b.linear += b.inv_mass_b * p;
            vel_b.angular += b.inv_i_b * (cross(self.r_b, p) + axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        data.velocities[b.index_a] = vel_a;
        data.velocities[b.index_b] = vel_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let b = self.bodies;
        let mut vel_a = data.velocities[b.index_a];
        let mut vel_b = data.velocities[b.index_b];
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let fixed_rotation = i_a + i_b == 0.0;

        if self.enable_motor && !fixed_rotation {
            let cdot = vel_b.angular - vel_a.angular - self.motor_speed;
            let impulse = -self.axial_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            vel_a.angular -= i_a * impulse;
            vel_b.angular += i_b * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit
            {
                let c = self.angle - self.lower_angle;
                let cdot = vel_b.angular - vel_a.angular;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;

                vel_a.angular -= i_a * impulse;
                vel_b.angular += i_b * impulse;
            }

            // Upper limit. The sign flip keeps both limit impulses non-negative.
            {
                let c = self.upper_angle - self.angle;
                let cdot = vel_a.angular - vel_b.angular;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;

                vel_a.angular += i_a * impulse;
                vel_b.angular -= i_b * impulse;
            }
        }

        // Point-to-point constraint
        let cdot = vel_b.linear + cross_sv(vel_b.angular, self.r_b)
            - vel_a.linear
            - cross_sv(vel_a.angular, self.r_a);
        let impulse = solve22(self.k, -cdot);
        self.impulse += impulse;

        vel_a.linear -= m_a * impulse;
        vel_a.angular -= i_a * cross(self.r_a, impulse);
        vel_b.linear += m_b * impulse;
        vel_b.angular += i_b * cross(self.r_b, impulse);

        data.velocities[b.index_a] = vel_a;
        data.velocities[b.index_b] = vel_b;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let b = self.bodies;
        let mut pos_a = data.positions[b.index_a];
        let mut pos_b = data.positions[b.index_b];
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let config = data.config;

        let mut angular_error = 0.0;
        let fixed_rotation = i_a + i_b == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = pos_b.angle - pos_a.angle - self.reference_angle;
            let max = config.max_angular_correction;
            let c = if (self.upper_angle - self.lower_angle).abs() < 2.0 * config.angular_slop {
                (angle - self.lower_angle).clamp(-max, max)
            } else if angle <= self.lower_angle {
                (angle - self.lower_angle + config.angular_slop).clamp(-max, 0.0)
            } else if angle >= self.upper_angle {
                (angle - self.upper_angle - config.angular_slop).clamp(0.0, max)
            } else {
                0.0
            };

            let limit_impulse = -self.axial_mass * c;
            pos_a.angle -= i_a * limit_impulse;
            pos_b.angle += i_b * limit_impulse;
            angular_error = c.abs();
        }

        let r_a = Rot::from_angle(pos_a.angle).apply(self.local_anchor_a - b.local_center_a);
        let r_b = Rot::from_angle(pos_b.angle).apply(self.local_anchor_b - b.local_center_b);

        let c = pos_b.center + r_b - pos_a.center - r_a;
        let position_error = c.length();

        let impulse = -solve22(self.point_mass(r_a, r_b), c);

        pos_a.center -= m_a * impulse;
        pos_a.angle -= i_a * cross(r_a, impulse);
        pos_b.center += m_b * impulse;
        pos_b.angle += i_b * cross(r_b, impulse);

        data.positions[b.index_a] = pos_a;
        data.positions[b.index_b] = pos_b;

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

/// Allows relative translation along one axis of body A; rotation is locked.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrismaticJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Unit translation axis in body A's frame.
    pub local_x_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,
    pub(crate) bodies: JointBodies,
    pub(crate) impulse: Vec2,
    pub(crate) motor_impulse: f32,
    pub(crate) lower_impulse: f32,
    pub(crate) upper_impulse: f32,
    local_y_axis_a: Vec2,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat2,
    translation: f32,
    axial_mass: f32,
}

impl PrismaticJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: Vec2, reference_angle: f32) -> Self {
        let local_x_axis_a = local_axis_a.normalize_or_zero();
        Self {
            local_anchor_a,
            local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: cross_sv(1.0, local_x_axis_a),
            reference_angle,
            ..Default::default()
        }
    }

    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse.x * self.perp + (self.motor_impulse + self.lower_impulse - self.upper_impulse) * self.axis)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
    }

    fn angular_k22(&self) -> f32 {
        let k22 = self.bodies.inv_i_a + self.bodies.inv_i_b;
        // Both bodies have fixed rotation.
        if k22 == 0.0 {
            1.0
        } else {
            k22
        }
    }
}

impl JointConstraint for PrismaticJoint {
    fn init_velocity_constraints(&mut self, data: &mut SolverData) {
        self.bodies.load(data);
        let b = self.bodies;
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let pos_a = data.positions[b.index_a];
        let pos_b = data.positions[b.index_b];
        let mut vel_a = data.velocities[b.index_a];
        let mut vel_b = data.velocities[b.index_b];

        let q_a = Rot::from_angle(pos_a.angle);
        let q_b = Rot::from_angle(pos_b.angle);
        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = pos_b.center - pos_a.center + r_b - r_a;

        // Motor and limit share the axial Jacobian.
        self.axis = q_a.apply(self.local_x_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);
        self.axial_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        // Perpendicular and angular constraint.
        self.perp = q_a.apply(self.local_y_axis_a);
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let k22 = self.angular_k22();
        self.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));

        if self.enable_limit {
            self.translation = self.axis.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * self.perp + axial_impulse * self.axis;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial_impulse * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial_impulse * self.a2;

            vel_a.linear -= m_a * p;
            vel_a.angular -= i_a * l_a;
            vel_b.linear += m_b * p;
            vel_b.angular += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        data.velocities[b.index_a] = vel_a;
        data.velocities[b.index_b] = vel_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let b = self.bodies;
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let mut vel_a = data.velocities[b.index_a];
        let mut vel_b = data.velocities[b.index_b];

        if self.enable_motor {
            let cdot = self.axis.dot(vel_b.linear - vel_a.linear) + self.a2 * vel_b.angular - self.a1 * vel_a.angular;
            let impulse = self.axial_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            let p = impulse * self.axis;
            vel_a.linear -= m_a * p;
            vel_a.angular -= i_a * impulse * self.a1;
            vel_b.linear += m_b * p;
            vel_b.angular += i_b * impulse * self.a2;
        }

        if self.enable_limit {
            // Lower limit
            {
                let c = self.translation - self.lower_translation;
                let cdot =
                    self.axis.dot(vel_b.linear - vel_a.linear) + self.a2 * vel_b.angular - self.a1 * vel_a.angular;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;

                let p = impulse * self.axis;
                vel_a.linear -= m_a * p;
                vel_a.angular -= i_a * impulse * self.a1;
                vel_b.linear += m_b * p;
                vel_b.angular += i_b * impulse * self.a2;
            }

            // Upper limit, solved with flipped signs.
            {
                let c = self.upper_translation - self.translation;
                let cdot =
                    self.axis.dot(vel_a.linear - vel_b.linear) + self.a1 * vel_a.angular - self.a2 * vel_b.angular;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;

                let p = impulse * self.axis;
                vel_a.linear += m_a * p;
                vel_a.angular += i_a * impulse * self.a1;
                vel_b.linear -= m_b * p;
                vel_b.angular -= i_b * impulse * self.a2;
            }
        }

        // Perpendicular and angular constraint
        let cdot = Vec2::new(
            self.perp.dot(vel_b.linear - vel_a.linear) + self.s2 * vel_b.angular - self.s1 * vel_a.angular,
            vel_b.angular - vel_a.angular,
        );
        let df = solve22(self.k, -cdot);
        self.impulse += df;

        let p = df.x * self.perp;
        let l_a = df.x * self.s1 + df.y;
        let l_b = df.x * self.s2 + df.y;
        vel_a.linear -= m_a * p;
        vel_a.angular -= i_a * l_a;
        vel_b.linear += m_b * p;
        vel_b.angular += i_b * l_b;

        data.velocities[b.index_a] = vel_a;
        data.velocities[b.index_b] = vel_b;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let b = self.bodies;
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let config = data.config;
        let mut pos_a = data.positions[b.index_a];
        let mut pos_b = data.positions[b.index_b];

        let q_a = Rot::from_angle(pos_a.angle);
        let q_b = Rot::from_angle(pos_b.angle);
        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = pos_b.center + r_b - pos_a.center - r_a;

        let axis = q_a.apply(self.local_x_axis_a);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let perp = q_a.apply(self.local_y_axis_a);
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(perp.dot(d), pos_b.angle - pos_a.angle - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut limit = None;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * config.linear_slop {
                limit = Some(translation);
                linear_error = linear_error.max(translation.abs());
            } else if translation <= self.lower_translation {
                limit = Some((translation - self.lower_translation).min(0.0));
                linear_error = linear_error.max(self.lower_translation - translation);
            } else if translation >= self.upper_translation {
                limit = Some((translation - self.upper_translation).max(0.0));
                linear_error = linear_error.max(translation - self.upper_translation);
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let k22 = self.angular_k22();

        let impulse = match limit {
            Some(c2) => {
                let k13 = i_a * s1 * a1 + i_b * s2 * a2;
                let k23 = i_a * a1 + i_b * a2;
                let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
                let k = Mat3::from_cols(
                    Vec3::new(k11, k12, k13),
                    Vec3::new(k12, k22, k23),
                    Vec3::new(k13, k23, k33),
                );
                solve33(k, -Vec3::new(c1.x, c1.y, c2))
            }
            None => {
                let k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                solve22(k, -c1).extend(0.0)
            }
        };

        let p = impulse.x * perp + impulse.z * axis;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        pos_a.center -= m_a * p;
        pos_a.angle -= i_a * l_a;
        pos_b.center += m_b * p;
        pos_b.angle += i_b * l_b;

        data.positions[b.index_a] = pos_a;
        data.positions[b.index_b] = pos_b;

        linear_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

/// Closed set of joint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
}

impl JointKind {
    /// Points the joint at its bodies' slots in the island arrays.
    pub fn bind(&mut self, index_a: usize, index_b: usize) {
        let bodies = match self {
            JointKind::Distance(joint) => &mut joint.bodies,
            JointKind::Revolute(joint) => &mut joint.bodies,
            JointKind::Prismatic(joint) => &mut joint.bodies,
        };
        bodies.index_a = index_a;
        bodies.index_b = index_b;
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        match self {
            JointKind::Distance(joint) => joint.local_anchor_a,
            JointKind::Revolute(joint) => joint.local_anchor_a,
            JointKind::Prismatic(joint) => joint.local_anchor_a,
        }
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        match self {
            JointKind::Distance(joint) => joint.local_anchor_b,
            JointKind::Revolute(joint) => joint.local_anchor_b,
            JointKind::Prismatic(joint) => joint.local_anchor_b,
        }
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match self {
            JointKind::Distance(joint) => joint.reaction_force(inv_dt),
            JointKind::Revolute(joint) => joint.reaction_force(inv_dt),
            JointKind::Prismatic(joint) => joint.reaction_force(inv_dt),
        }
    }
}

impl JointConstraint for JointKind {
    fn init_velocity_constraints(&mut self, data: &mut SolverData) {
        match self {
            JointKind::Distance(joint) => joint.init_velocity_constraints(data),
            JointKind::Revolute(joint) => joint.init_velocity_constraints(data),
            JointKind::Prismatic(joint) => joint.init_velocity_constraints(data),
        }
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match self {
            JointKind::Distance(joint) => joint.solve_velocity_constraints(data),
            JointKind::Revolute(joint) => joint.solve_velocity_constraints(data),
            JointKind::Prismatic(joint) => joint.solve_velocity_constraints(data),
        }
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match self {
            JointKind::Distance(joint) => joint.solve_position_constraints(data),
            JointKind::Revolute(joint) => joint.solve_position_constraints(data),
            JointKind::Prismatic(joint) => joint.solve_position_constraints(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimulationConfig,
        core::types::{Position, Velocity},
        dynamics::solver::{SolverBody, TimeStep},
    };

    fn unit_body() -> SolverBody {
        SolverBody {
            local_center: Vec2::ZERO,
            inv_mass: 1.0,
            inv_inertia: 1.0,
        }
    }

    fn run(joint: &mut impl JointConstraint, positions: &mut [Position], velocities: &mut [Velocity], iterations: usize) {
        let config = SimulationConfig::default();
        let bodies = [SolverBody::default(), unit_body()];
        let step = TimeStep::new(1.0 / 60.0, 60.0, &config);
        let mut data = SolverData {
            step,
            config: &config,
            bodies: &bodies,
            positions,
            velocities,
        };
        joint.init_velocity_constraints(&mut data);
        for _ in 0..iterations {
            joint.solve_velocity_constraints(&mut data);
        }
    }

    #[test]
    fn rigid_distance_removes_stretching_velocity() {
        let mut joint = DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0);
        joint.bodies.index_b = 1;
        let mut positions = [
            Position::default(),
            Position {
                center: Vec2::new(2.0, 0.0),
                angle: 0.0,
            },
        ];
        let mut velocities = [
            Velocity::default(),
            Velocity {
                linear: Vec2::new(3.0, 1.0),
                angular: 0.0,
            },
        ];
        run(&mut joint, &mut positions, &mut velocities, 4);
        assert!(velocities[1].linear.x.abs() < 1e-5);
        assert!((velocities[1].linear.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn revolute_motor_respects_torque_cap() {
        let mut joint = RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        joint.enable_motor = true;
        joint.motor_speed = 10.0;
        joint.max_motor_torque = 6.0;
        joint.bodies.index_b = 1;
        let mut positions = [Position::default(); 2];
        let mut velocities = [Velocity::default(); 2];
        run(&mut joint, &mut positions, &mut velocities, 8);
        // One step of max torque on unit inertia.
        assert!((velocities[1].angular - 0.1).abs() < 1e-5);
    }

    #[test]
    fn prismatic_blocks_perpendicular_motion() {
        let mut joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X, 0.0);
        joint.bodies.index_b = 1;
        let mut positions = [Position::default(); 2];
        let mut velocities = [
            Velocity::default(),
            Velocity {
                linear: Vec2::new(2.0, -3.0),
                angular: 0.5,
            },
        ];
        run(&mut joint, &mut positions, &mut velocities, 8);
        assert!((velocities[1].linear.x - 2.0).abs() < 1e-5);
        assert!(velocities[1].linear.y.abs() < 1e-5);
        assert!(velocities[1].angular.abs() < 1e-5);
    }

    #[test]
    fn revolute_position_pass_closes_anchor_gap() {
        let config = SimulationConfig::default();
        let bodies = [SolverBody::default(), unit_body()];
        let mut joint = RevoluteJoint::new(Vec2::ZERO, Vec2::new(-1.0, 0.0), 0.0);
        joint.bodies.index_b = 1;
        let mut positions = [
            Position::default(),
            Position {
                center: Vec2::new(1.1, 0.05),
                angle: 0.0,
            },
        ];
        let mut velocities = [Velocity::default(); 2];
        let mut data = SolverData {
            step: TimeStep::new(1.0 / 60.0, 60.0, &config),
            config: &config,
            bodies: &bodies,
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(&mut data);
        let solved = (0..20).any(|_| joint.solve_position_constraints(&mut data));
        assert!(solved);
        let anchor_b = positions[1].center + Rot::from_angle(positions[1].angle).apply(Vec2::new(-1.0, 0.0));
        assert!(anchor_b.length() < 0.01);
    }

    #[test]
    fn kinds_share_the_constraint_capability() {
        let mut kind = JointKind::Revolute(RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0));
        kind.bind(0, 1);
        let mut positions = [Position::default(); 2];
        let mut velocities = [
            Velocity::default(),
            Velocity {
                linear: Vec2::new(1.0, 1.0),
                angular: 0.0,
            },
        ];
        run(&mut kind, &mut positions, &mut velocities, 4);
        assert!(velocities[1].linear.length() < 1e-5);
        assert_eq!(kind.local_anchor_b(), Vec2::ZERO);
    }
}
