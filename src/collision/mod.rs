//! Collision detection: bounding volumes, broad phase, GJK, manifolds, time of impact, queries.

pub mod aabb;
pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod distance;
pub mod dynamic_tree;
pub mod manifold;
pub mod narrowphase;
pub mod queries;
pub mod shapes;

pub use aabb::{Aabb, RayCastInput, RayCastOutput};
pub use broadphase::BroadPhase;
pub use ccd::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use contact::{Contact, ContactImpulse};
pub use distance::{distance, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};
pub use dynamic_tree::DynamicTree;
pub use manifold::{Manifold, ManifoldPoint, WorldManifold};
pub use narrowphase::{collide, ContactKind};
pub use queries::{Raycast, RaycastHit, RaycastQuery};
pub use shapes::{ChainShape, CircleShape, EdgeShape, PolygonShape, Shape, ShapeType};
