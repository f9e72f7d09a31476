use glam::Vec2;

use super::{
    aabb::{Aabb, RayCastInput},
    broadphase::BroadPhase,
};
use crate::{
    core::{
        fixture::{Fixture, FixtureProxyKey},
        rigidbody::RigidBody,
    },
    utils::allocator::{Arena, BodyId, FixtureId},
};

/// Result of a ray cast against fixtures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body_id: BodyId,
    pub fixture_id: FixtureId,
    /// Chain edge index; zero for single-child shapes.
    pub child: usize,
    pub point: Vec2,
    pub normal: Vec2,
    pub distance: f32,
    /// Fraction of the query segment at the hit.
    pub fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastQuery {
    pub origin: Vec2,
    pub direction: Vec2,
    pub max_distance: f32,
}

impl RaycastQuery {
    pub fn new(origin: Vec2, direction: Vec2, max_distance: f32) -> Self {
        Self {
            origin,
            direction,
            max_distance,
        }
    }

    /// Query along the segment `p1 -> p2`.
    pub fn segment(p1: Vec2, p2: Vec2) -> Self {
        let d = p2 - p1;
        Self::new(p1, d.normalize_or_zero(), d.length())
    }

    fn input(&self) -> Option<RayCastInput> {
        let direction = self.direction.normalize_or_zero();
        if direction == Vec2::ZERO || self.max_distance <= 0.0 {
            return None;
        }
        Some(RayCastInput {
            p1: self.origin,
            p2: self.origin + direction * self.max_distance,
            max_fraction: 1.0,
        })
    }
}

pub struct Raycast;

impl Raycast {
    /// Every fixture hit along the ray, nearest first.
    pub fn cast(
        query: &RaycastQuery,
        broad_phase: &BroadPhase<FixtureProxyKey>,
        fixtures: &Arena<FixtureId, Fixture>,
        bodies: &Arena<BodyId, RigidBody>,
    ) -> Vec<RaycastHit> {
        Self::cast_with_filter(query, broad_phase, fixtures, bodies, |_, _| true)
    }

    pub fn cast_with_filter<F>(
        query: &RaycastQuery,
        broad_phase: &BroadPhase<FixtureProxyKey>,
        fixtures: &Arena<FixtureId, Fixture>,
        bodies: &Arena<BodyId, RigidBody>,
        mut filter: F,
    ) -> Vec<RaycastHit>
    where
        F: FnMut(FixtureId, &Fixture) -> bool,
    {
        let mut hits = Vec::new();
        let Some(input) = query.input() else {
            return hits;
        };

        broad_phase.ray_cast(&input, |sub, _, key| {
            let Some(fixture) = fixtures.get(key.fixture) else {
                return -1.0;
            };
            if !filter(key.fixture, fixture) {
                return -1.0;
            }
            if let Some(hit) = Self::hit_fixture(query, sub, key, fixture, bodies) {
                hits.push(hit);
            }
            // Keep the full segment so every hit is collected.
            sub.max_fraction
        });

        hits.sort_by(|a, b| {
            a.fraction
                .total_cmp(&b.fraction)
                .then(a.fixture_id.cmp(&b.fixture_id))
                .then(a.child.cmp(&b.child))
        });
        hits
    }

    /// The nearest hit only; the search segment is clipped as hits are found.
    pub fn cast_closest(
        query: &RaycastQuery,
        broad_phase: &BroadPhase<FixtureProxyKey>,
        fixtures: &Arena<FixtureId, Fixture>,
        bodies: &Arena<BodyId, RigidBody>,
    ) -> Option<RaycastHit> {
        let input = query.input()?;
        let mut closest: Option<RaycastHit> = None;

        broad_phase.ray_cast(&input, |sub, _, key| {
            let Some(fixture) = fixtures.get(key.fixture) else {
                return -1.0;
            };
            match Self::hit_fixture(query, sub, key, fixture, bodies) {
                Some(hit) => {
                    let fraction = hit.fraction;
                    closest = Some(hit);
                    fraction
                }
                None => sub.max_fraction,
            }
        });
        closest
    }

    fn hit_fixture(
        query: &RaycastQuery,
        input: &RayCastInput,
        key: FixtureProxyKey,
        fixture: &Fixture,
        bodies: &Arena<BodyId, RigidBody>,
    ) -> Option<RaycastHit> {
        let body = bodies.get(fixture.body)?;
        let output = fixture.ray_cast(input, body.transform(), key.child)?;
        let point = input.p1 + output.fraction * (input.p2 - input.p1);
        Some(RaycastHit {
            body_id: fixture.body,
            fixture_id: key.fixture,
            child: key.child,
            point,
            normal: output.normal,
            distance: output.fraction * query.max_distance,
            fraction: output.fraction,
        })
    }
}

/// Fixtures whose fat AABB overlaps `aabb`, each reported once, in handle order.
pub fn query_aabb(aabb: &Aabb, broad_phase: &BroadPhase<FixtureProxyKey>) -> Vec<FixtureId> {
    let mut found = Vec::new();
    broad_phase.query(aabb, |_, key| {
        found.push(key.fixture);
        true
    });
    found.sort();
    found.dedup();
    found
}

/// Fixtures containing the world point.
pub fn query_point(
    point: Vec2,
    broad_phase: &BroadPhase<FixtureProxyKey>,
    fixtures: &Arena<FixtureId, Fixture>,
    bodies: &Arena<BodyId, RigidBody>,
) -> Vec<FixtureId> {
    let point_box = Aabb::new(point, point);
    query_aabb(&point_box, broad_phase)
        .into_iter()
        .filter(|&id| {
            fixtures
                .get(id)
                .and_then(|fixture| bodies.get(fixture.body).map(|body| fixture.test_point(body.transform(), point)))
                .unwrap_or(false)
        })
        .collect()
}
