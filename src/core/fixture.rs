use serde::{Deserialize, Serialize};

use super::types::{MassData, Material, Transform};
use crate::{
    collision::{
        aabb::{Aabb, RayCastInput, RayCastOutput},
        broadphase::BroadPhase,
        dynamic_tree::ProxyId,
        shapes::Shape,
    },
    utils::allocator::{BodyId, FixtureId},
};

/// Collision filtering data.
///
/// Fixtures sharing a non-zero group always collide (positive group) or never collide (negative
/// group). Otherwise each side's mask must accept the other side's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Broad-phase user data: one entry per fixture child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixtureProxyKey {
    pub fixture: FixtureId,
    pub child: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureProxy {
    /// Tight bounds at the last synchronization.
    pub aabb: Aabb,
    pub child: usize,
    pub proxy_id: ProxyId,
}

/// Construction parameters for a [`Fixture`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDef {
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Overrides the world restitution threshold when set.
    pub restitution_threshold: Option<f32>,
    pub is_sensor: bool,
    pub filter: Filter,
    pub user_data: u64,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        let material = Material::default();
        Self {
            shape,
            density: material.density,
            friction: material.friction,
            restitution: material.restitution,
            restitution_threshold: None,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_restitution_threshold(mut self, threshold: f32) -> Self {
        self.restitution_threshold = Some(threshold);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.density = material.density;
        self.friction = material.friction;
        self.restitution = material.restitution;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// A shape attached to a body, with material and filtering data.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyId,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) user_data: u64,
    pub(crate) proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub(crate) fn new(body: BodyId, def: FixtureDef, default_restitution_threshold: f32) -> Self {
        Self {
            body,
            shape: def.shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            restitution_threshold: def.restitution_threshold.unwrap_or(default_restitution_threshold),
            is_sensor: def.is_sensor,
            filter: def.filter,
            user_data: def.user_data,
            proxies: Vec::new(),
        }
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Only affects contacts created afterwards.
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

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn proxies(&self) -> &[FixtureProxy] {
        &self.proxies
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// Tight bounds of one child at the last synchronization.
    pub fn aabb(&self, child: usize) -> Option<Aabb> {
        self.proxies.get(child).map(|proxy| proxy.aabb)
    }

    pub fn test_point(&self, xf: &Transform, point: glam::Vec2) -> bool {
        self.shape.test_point(xf, point)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child: usize) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child)
    }

    pub(crate) fn create_proxies(
        &mut self,
        id: FixtureId,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf: &Transform,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child);
            let proxy_id = broad_phase.create_proxy(aabb, FixtureProxyKey { fixture: id, child });
            self.proxies.push(FixtureProxy { aabb, child, proxy_id });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Moves every child proxy to cover the motion from `xf1` to `xf2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for proxy in &mut self.proxies {
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child);
            proxy.aabb = aabb1.union(&aabb2);
            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }

    /// Forces the broad phase to report pairs for this fixture again.
    pub(crate) fn refilter(&self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_collide() {
        assert!(Filter::default().should_collide(&Filter::default()));
    }

    #[test]
    fn groups_override_masks() {
        let friendly = Filter {
            group_index: -2,
            ..Default::default()
        };
        assert!(!friendly.should_collide(&friendly));

        let always = Filter {
            group_index: 3,
            mask_bits: 0,
            ..Default::default()
        };
        assert!(always.should_collide(&always));
    }

    #[test]
    fn masks_must_accept_both_ways() {
        let player = Filter {
            category_bits: 0x0002,
            mask_bits: 0x0001,
            group_index: 0,
        };
        let pickup = Filter {
            category_bits: 0x0004,
            mask_bits: 0xFFFF,
            group_index: 0,
        };
        assert!(!player.should_collide(&pickup));
        assert!(player.should_collide(&Filter::default()));
    }

    #[test]
    fn proxies_follow_chain_children() {
        let chain = crate::collision::shapes::ChainShape::new_loop(&[
            glam::Vec2::new(0.0, 0.0),
            glam::Vec2::new(1.0, 0.0),
            glam::Vec2::new(1.0, 1.0),
        ])
        .expect("valid chain");
        let mut fixture = Fixture::new(BodyId::default(), FixtureDef::new(Shape::Chain(chain)), 1.0);
        let mut broad_phase = BroadPhase::default();
        fixture.create_proxies(FixtureId::default(), &mut broad_phase, &Transform::IDENTITY);
        assert_eq!(fixture.proxies().len(), 3);
        assert_eq!(broad_phase.proxy_count(), 3);
        fixture.destroy_proxies(&mut broad_phase);
        assert_eq!(broad_phase.proxy_count(), 0);
    }
}
