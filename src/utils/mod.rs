//! Utility helpers including math extensions, handle arenas, logging, and profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, ArenaId, BodyId, ContactKey, FixtureId, GenerationalId, JointId};
pub use math::*;
