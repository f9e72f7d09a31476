//! Contact manifold data: local-space contact points with persistent feature ids.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{config::MAX_MANIFOLD_POINTS, core::types::Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContactFeatureType {
    #[default]
    Vertex,
    Face,
}

/// Features that intersect to form a contact point.
///
/// Built from feature indices only, never positions, so the id survives small motions and lets
/// impulses be matched across steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContactFeature {
    /// Feature index on shape A
    pub index_a: u8,
    /// Feature index on shape B
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

impl ContactFeature {
    pub fn new(index_a: usize, type_a: ContactFeatureType, index_b: usize, type_b: ContactFeatureType) -> Self {
        Self {
            index_a: index_a as u8,
            index_b: index_b as u8,
            type_a,
            type_b,
        }
    }

    /// Packed key used to match points between manifolds.
    pub fn key(&self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// Same features seen from the other shape.
    pub fn swapped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A contact point. `local_point` depends on the manifold kind:
/// circles: center of circle B; face A: clip point of B; face B: clip point of A.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Non-penetration impulse accumulated by the solver.
    pub normal_impulse: f32,
    /// Friction impulse accumulated by the solver.
    pub tangent_impulse: f32,
    pub id: ContactFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Up to two contact points sharing one normal, expressed in body-local coordinates.
///
/// - circles: `local_point` is the center of circle A
/// - face A: `local_normal`/`local_point` describe the reference face on A
/// - face B: same, on B
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Copies accumulated impulses from `old` onto points with matching feature keys.
    pub fn carry_impulses_from(&mut self, old: &Manifold) {
        for point in self.points_mut() {
            point.normal_impulse = 0.0;
            point.tangent_impulse = 0.0;
            let key = point.id.key();
            if let Some(previous) = old.points().iter().find(|p| p.id.key() == key) {
                point.normal_impulse = previous.normal_impulse;
                point.tangent_impulse = previous.tangent_impulse;
            }
        }
    }
}

/// World-space view of a manifold. The normal points from A to B.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    pub normal: Vec2,
    /// Midpoints between the two surfaces.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when overlapping.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl WorldManifold {
    pub fn new(manifold: &Manifold, xf_a: &Transform, radius_a: f32, xf_b: &Transform, radius_b: f32) -> Self {
        let mut out = WorldManifold {
            point_count: manifold.point_count,
            ..Default::default()
        };
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                out.normal = Vec2::X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalize();
                }
                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.rotation.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.rotation.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(normal);
                }
                // Ensure normal points from A to B.
                out.normal = -normal;
            }
        }
        out
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }
}

/// Lifecycle of an individual point between two manifolds of the same contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    #[default]
    Null,
    /// Point appeared in the new manifold.
    Add,
    Persist,
    /// Point only exists in the old manifold.
    Remove,
}

/// Compares two manifolds by feature key. Returns states of the old and the new points.
pub fn point_states(
    old: &Manifold,
    new: &Manifold,
) -> ([PointState; MAX_MANIFOLD_POINTS], [PointState; MAX_MANIFOLD_POINTS]) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    for (i, point) in old.points().iter().enumerate() {
        let key = point.id.key();
        state1[i] = if new.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }
    for (i, point) in new.points().iter().enumerate() {
        let key = point.id.key();
        state2[i] = if old.points().iter().any(|p| p.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }
    (state1, state2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(index_b: usize, normal_impulse: f32) -> ManifoldPoint {
        ManifoldPoint {
            local_point: Vec2::ZERO,
            normal_impulse,
            tangent_impulse: 0.5 * normal_impulse,
            id: ContactFeature::new(0, ContactFeatureType::Face, index_b, ContactFeatureType::Vertex),
        }
    }

    #[test]
    fn impulses_follow_feature_keys() {
        let mut old = Manifold::default();
        old.points[0] = point(2, 3.0);
        old.points[1] = point(3, 5.0);
        old.point_count = 2;

        let mut new = Manifold::default();
        new.points[0] = point(3, 0.0);
        new.points[1] = point(1, 0.0);
        new.point_count = 2;
        new.carry_impulses_from(&old);

        assert_eq!(new.points[0].normal_impulse, 5.0);
        assert_eq!(new.points[0].tangent_impulse, 2.5);
        assert_eq!(new.points[1].normal_impulse, 0.0);

        let (old_states, new_states) = point_states(&old, &new);
        assert_eq!(old_states, [PointState::Remove, PointState::Persist]);
        assert_eq!(new_states, [PointState::Persist, PointState::Add]);
    }

    #[test]
    fn feature_keys_distinguish_types_and_swap() {
        let a = ContactFeature::new(1, ContactFeatureType::Face, 2, ContactFeatureType::Vertex);
        let b = ContactFeature::new(1, ContactFeatureType::Vertex, 2, ContactFeatureType::Face);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.swapped().swapped(), a);
        assert_eq!(a.swapped().index_a, 2);
    }

    #[test]
    fn circles_world_manifold_points_from_a_to_b() {
        let mut manifold = Manifold {
            kind: ManifoldType::Circles,
            point_count: 1,
            ..Default::default()
        };
        manifold.points[0].local_point = Vec2::ZERO;
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.5), 0.0);
        let world = WorldManifold::new(&manifold, &xf_a, 1.0, &xf_b, 1.0);
        assert!((world.normal - Vec2::Y).length() < 1e-6);
        assert!((world.separations[0] + 0.5).abs() < 1e-6);
        assert!((world.points[0] - Vec2::new(0.0, 0.75)).length() < 1e-6);
    }
}
