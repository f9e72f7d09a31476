//! Core types describing bodies, fixtures, joints, and shared data.

pub mod constraints;
pub mod fixture;
pub mod rigidbody;
pub mod types;

pub use constraints::{DistanceJointDef, Joint, JointDef, PrismaticJointDef, RevoluteJointDef};
pub use fixture::{Filter, Fixture, FixtureDef};
pub use rigidbody::{BodyDef, BodyType, RigidBody};
pub use types::{MassData, Material, MixingMode, Position, Rot, Sweep, Transform, Velocity};
