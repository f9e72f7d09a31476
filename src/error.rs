use thiserror::Error;

use crate::utils::allocator::{BodyId, FixtureId, JointId};

/// Errors returned by the world bookkeeping API.
///
/// The simulation step itself never fails; these only surface when a caller passes a handle or
/// definition that cannot be honored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// The body handle is stale or was never issued by this world.
    #[error("body {0:?} does not exist")]
    InvalidBody(BodyId),
    #[error("fixture {0:?} does not exist")]
    InvalidFixture(FixtureId),
    #[error("joint {0:?} does not exist")]
    InvalidJoint(JointId),
    /// Shape construction rejected the input geometry.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    /// Joints must connect two distinct bodies.
    #[error("joint endpoints must be different bodies, both were {0:?}")]
    SameBody(BodyId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;
