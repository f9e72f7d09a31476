//! Simulation dynamics: integration, contact and joint solvers, and islands.

pub mod integrator;
pub mod island;
pub mod joints;
pub mod solver;

pub use integrator::Integrator;
pub use island::{Island, IslandManager};
pub use joints::{DistanceJoint, JointConstraint, JointKind, PrismaticJoint, RevoluteJoint};
pub use solver::{ContactSolver, SolverStepMetrics, TimeStep};
