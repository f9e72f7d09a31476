//! rigid2d – a deterministic 2D rigid-body physics engine for Rust.
//!
//! The crate is organised around a [`PhysicsWorld`] that owns bodies, fixtures, joints and
//! contacts. Each step runs broad phase pair finding, narrow phase manifolds, island
//! sequential-impulse solving and a continuous collision pass for fast bodies.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use collision::{
    aabb::Aabb,
    broadphase::BroadPhase,
    contact::{Contact, ContactImpulse},
    manifold::{Manifold, WorldManifold},
    queries::{Raycast, RaycastHit, RaycastQuery},
    shapes::{ChainShape, CircleShape, EdgeShape, PolygonShape, Shape},
};
pub use config::SimulationConfig;
pub use core::{
    constraints::{DistanceJointDef, Joint, JointDef, PrismaticJointDef, RevoluteJointDef},
    fixture::{Filter, Fixture, FixtureDef},
    rigidbody::{BodyDef, BodyType, RigidBody},
    types::{MassData, Material, MixingMode, Rot, Transform},
};
pub use dynamics::joints::JointKind;
pub use error::{PhysicsError, PhysicsResult};
pub use utils::{
    allocator::{BodyId, ContactKey, FixtureId, JointId},
    profiling::StepProfile,
};
pub use world::{
    CommandQueue, ContactFilter, ContactListener, DefaultContactFilter, NullListener, PhysicsWorld, WorldCommand,
};
