//! Persistent contact between two fixture children.

use serde::{Deserialize, Serialize};

use super::{
    distance::{test_overlap, SimplexCache},
    manifold::{Manifold, WorldManifold},
    narrowphase::{collide, ContactKind},
    shapes::Shape,
};
use crate::{
    config::MAX_MANIFOLD_POINTS,
    core::{
        fixture::{Fixture, FixtureProxyKey},
        types::{MixingMode, Transform},
    },
    utils::allocator::{BodyId, FixtureId},
};

/// State flags carried by a contact between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactFlags {
    /// The manifold has points (or, for sensors, the shapes overlap).
    pub touching: bool,
    /// Cleared by a listener in `pre_solve` to skip the contact for one step.
    pub enabled: bool,
    /// Filtering must be re-evaluated before the next update.
    pub filter: bool,
    /// `toi` holds a valid time of impact for the current sub-step search.
    pub toi: bool,
}

/// Normal and tangent impulses applied at each manifold point, reported after solving.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Touching transition produced by [`Contact::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactUpdate {
    pub was_touching: bool,
    pub touching: bool,
    pub old_manifold: Manifold,
}

impl ContactUpdate {
    pub fn began(&self) -> bool {
        !self.was_touching && self.touching
    }

    pub fn ended(&self) -> bool {
        self.was_touching && !self.touching
    }
}

/// A pairing of two fixture children whose fat AABBs overlap.
///
/// Fixture A always carries the shape type named first by [`ContactKind`].
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) proxy_a: FixtureProxyKey,
    pub(crate) proxy_b: FixtureProxyKey,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) kind: ContactKind,
    pub(crate) sensor: bool,
    pub(crate) manifold: Manifold,
    pub(crate) cache: SimplexCache,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) tangent_speed: f32,
    pub(crate) flags: ContactFlags,
    pub(crate) toi_count: u32,
    pub(crate) toi: f32,
}

impl Contact {
    pub(crate) fn new(
        kind: ContactKind,
        proxy_a: FixtureProxyKey,
        fixture_a: &Fixture,
        proxy_b: FixtureProxyKey,
        fixture_b: &Fixture,
        friction_mixing: MixingMode,
        restitution_mixing: MixingMode,
    ) -> Self {
        Self {
            proxy_a,
            proxy_b,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            kind,
            sensor: fixture_a.is_sensor || fixture_b.is_sensor,
            manifold: Manifold::default(),
            cache: SimplexCache::default(),
            friction: friction_mixing.combine(fixture_a.friction, fixture_b.friction),
            restitution: restitution_mixing.combine(fixture_a.restitution, fixture_b.restitution),
            restitution_threshold: fixture_a.restitution_threshold.min(fixture_b.restitution_threshold),
            tangent_speed: 0.0,
            flags: ContactFlags {
                enabled: true,
                ..Default::default()
            },
            toi_count: 0,
            toi: 1.0,
        }
    }

    pub fn kind(&self) -> ContactKind {
        self.kind
    }

    pub fn fixture_a(&self) -> FixtureId {
        self.proxy_a.fixture
    }

    pub fn fixture_b(&self) -> FixtureId {
        self.proxy_b.fixture
    }

    pub fn child_a(&self) -> usize {
        self.proxy_a.child
    }

    pub fn child_b(&self) -> usize {
        self.proxy_b.child
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

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn world_manifold(&self, xf_a: &Transform, radius_a: f32, xf_b: &Transform, radius_b: f32) -> WorldManifold {
        WorldManifold::new(&self.manifold, xf_a, radius_a, xf_b, radius_b)
    }

    pub fn is_touching(&self) -> bool {
        self.flags.touching
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.enabled
    }

    /// Disables the contact for the current step only; re-enabled on the next update.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.enabled = enabled;
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    /// Conveyor-belt speed along the contact tangent.
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    pub fn toi_count(&self) -> u32 {
        self.toi_count
    }

    /// Marks the contact so filtering runs again before its next update.
    pub fn flag_for_filtering(&mut self) {
        self.flags.filter = true;
    }

    /// Participates in the solver this step.
    pub(crate) fn is_solvable(&self) -> bool {
        self.flags.enabled && self.flags.touching && !self.sensor
    }

    /// Recomputes the manifold and touching state.
    ///
    /// Impulses of points whose feature ids persist are carried over so the solver can warm start.
    pub(crate) fn update(&mut self, shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> ContactUpdate {
        let old_manifold = self.manifold;
        let was_touching = self.flags.touching;

        // Re-enable every update; listeners may disable again in pre-solve.
        self.flags.enabled = true;

        let touching = if self.sensor {
            self.manifold.point_count = 0;
            test_overlap(
                shape_a,
                self.proxy_a.child,
                xf_a,
                shape_b,
                self.proxy_b.child,
                xf_b,
                &mut self.cache,
            )
        } else {
            self.manifold = collide(self.kind, shape_a, self.proxy_a.child, xf_a, shape_b, xf_b);
            self.manifold.carry_impulses_from(&old_manifold);
            self.manifold.point_count > 0
        };

        self.flags.touching = touching;
        ContactUpdate {
            was_touching,
            touching,
            old_manifold,
        }
    }
}
