use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    core::rigidbody::RigidBody,
    dynamics::joints::{DistanceJoint, JointKind, PrismaticJoint, RevoluteJoint},
    utils::allocator::BodyId,
};

/// Distance joint definition; anchors are stored in each body's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    /// Spring frequency; zero makes the joint rigid.
    pub frequency_hz: f32,
    pub damping_ratio: f32,
    pub collide_connected: bool,
}

impl DistanceJointDef {
    /// Rest length is the current distance between the two world anchors.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self {
            body_a: body_a.id(),
            body_b: body_b.id(),
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length: (anchor_b - anchor_a).length(),
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = length;
        self
    }

    pub fn with_frequency(mut self, frequency_hz: f32, damping_ratio: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevoluteJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Angle of B relative to A that counts as zero joint angle.
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    pub collide_connected: bool,
}

impl RevoluteJointDef {
    /// Pins both bodies at the world point `anchor`.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2) -> Self {
        Self {
            body_a: body_a.id(),
            body_b: body_b.id(),
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            collide_connected: false,
        }
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower.min(upper);
        self.upper_angle = lower.max(upper);
        self
    }

    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrismaticJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Translation axis in body A's frame.
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,
    pub collide_connected: bool,
}

impl PrismaticJointDef {
    /// Slides B along the world `axis` through the world point `anchor`.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2, axis: Vec2) -> Self {
        Self {
            body_a: body_a.id(),
            body_b: body_b.id(),
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis).normalize_or_zero(),
            reference_angle: body_b.angle() - body_a.angle(),
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            collide_connected: false,
        }
    }

    pub fn with_limit(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower.min(upper);
        self.upper_translation = lower.max(upper);
        self
    }

    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

/// Any supported joint definition, passed to [`crate::world::PhysicsWorld::create_joint`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Revolute(RevoluteJointDef),
    Prismatic(PrismaticJointDef),
}

impl JointDef {
    pub fn bodies(&self) -> (BodyId, BodyId) {
        match self {
            JointDef::Distance(def) => (def.body_a, def.body_b),
            JointDef::Revolute(def) => (def.body_a, def.body_b),
            JointDef::Prismatic(def) => (def.body_a, def.body_b),
        }
    }

    pub fn collide_connected(&self) -> bool {
        match self {
            JointDef::Distance(def) => def.collide_connected,
            JointDef::Revolute(def) => def.collide_connected,
            JointDef::Prismatic(def) => def.collide_connected,
        }
    }

    pub(crate) fn build(&self) -> JointKind {
        match *self {
            JointDef::Distance(def) => {
                let mut joint = DistanceJoint::new(def.local_anchor_a, def.local_anchor_b, def.length);
                joint.frequency_hz = def.frequency_hz;
                joint.damping_ratio = def.damping_ratio;
                JointKind::Distance(joint)
            }
            JointDef::Revolute(def) => {
                let mut joint = RevoluteJoint::new(def.local_anchor_a, def.local_anchor_b, def.reference_angle);
                joint.enable_limit = def.enable_limit;
                joint.lower_angle = def.lower_angle;
                joint.upper_angle = def.upper_angle;
                joint.enable_motor = def.enable_motor;
                joint.motor_speed = def.motor_speed;
                joint.max_motor_torque = def.max_motor_torque;
                JointKind::Revolute(joint)
            }
            JointDef::Prismatic(def) => {
                let mut joint = PrismaticJoint::new(
                    def.local_anchor_a,
                    def.local_anchor_b,
                    def.local_axis_a,
                    def.reference_angle,
                );
                joint.enable_limit = def.enable_limit;
                joint.lower_translation = def.lower_translation;
                joint.upper_translation = def.upper_translation;
                joint.enable_motor = def.enable_motor;
                joint.motor_speed = def.motor_speed;
                joint.max_motor_force = def.max_motor_force;
                JointKind::Prismatic(joint)
            }
        }
    }
}

impl From<DistanceJointDef> for JointDef {
    fn from(def: DistanceJointDef) -> Self {
        JointDef::Distance(def)
    }
}

impl From<RevoluteJointDef> for JointDef {
    fn from(def: RevoluteJointDef) -> Self {
        JointDef::Revolute(def)
    }
}

impl From<PrismaticJointDef> for JointDef {
    fn from(def: PrismaticJointDef) -> Self {
        JointDef::Prismatic(def)
    }
}

/// A joint owned by the world, connecting two bodies.
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) collide_connected: bool,
    pub(crate) kind: JointKind,
}

impl Joint {
    pub(crate) fn new(def: &JointDef) -> Self {
        let (body_a, body_b) = def.bodies();
        Self {
            body_a,
            body_b,
            collide_connected: def.collide_connected(),
            kind: def.build(),
        }
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn other_body(&self, body: BodyId) -> BodyId {
        if body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Mutable access for tuning motors and limits between steps.
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    /// Force applied on body B at its anchor during the last step.
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.kind.reaction_force(inv_dt)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Distance(_) => 0.0,
            JointKind::Revolute(joint) => joint.reaction_torque(inv_dt),
            JointKind::Prismatic(joint) => joint.reaction_torque(inv_dt),
        }
    }
}
