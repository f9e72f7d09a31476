//! Island construction and per-island solving.
//!
//! Islands are built with an explicit-stack depth-first search over touching contacts and joints.
//! Each island is solved from a read-only [`IslandContext`] and returns an [`IslandOutcome`], so
//! independent islands can be solved concurrently and applied in a fixed order afterwards.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::{
    integrator::Integrator,
    joints::{JointConstraint, JointKind},
    solver::{ContactConstraintDef, ContactSolver, SolverBody, SolverData, SolverStepMetrics, TimeStep},
};
use crate::{
    collision::{
        contact::{Contact, ContactImpulse},
        manifold::Manifold,
    },
    config::SimulationConfig,
    core::{
        constraints::Joint,
        fixture::Fixture,
        rigidbody::{BodyType, RigidBody},
        types::{Position, Sweep, Velocity},
    },
    utils::allocator::{Arena, BodyId, ContactKey, FixtureId, JointId},
};

/// A connected set of bodies solved together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Island {
    pub bodies: Vec<BodyId>,
    pub contacts: Vec<ContactKey>,
    pub joints: Vec<JointId>,
}

impl Island {
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Builds islands each step.
#[derive(Debug, Default)]
pub struct IslandManager {
    islands: Vec<Island>,
    visited_bodies: HashSet<BodyId>,
    visited_contacts: HashSet<ContactKey>,
    visited_joints: HashSet<JointId>,
}

impl IslandManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one island per awake, enabled dynamic body not yet reached.
    ///
    /// Static and kinematic bodies are added to every island that touches them but never
    /// propagate the search, so they may appear in several islands.
    pub fn build_islands(
        &mut self,
        bodies: &Arena<BodyId, RigidBody>,
        contacts: &Arena<ContactKey, Contact>,
        joints: &Arena<JointId, Joint>,
    ) -> &[Island] {
        self.islands.clear();
        self.visited_bodies.clear();
        self.visited_contacts.clear();
        self.visited_joints.clear();

        let mut stack = Vec::new();
        for (seed_id, seed) in bodies.iter() {
            if self.visited_bodies.contains(&seed_id)
                || !seed.awake
                || !seed.enabled
                || seed.body_type != BodyType::Dynamic
            {
                continue;
            }

            let mut island = Island::default();
            stack.push(seed_id);
            self.visited_bodies.insert(seed_id);

            while let Some(body_id) = stack.pop() {
                let Some(body) = bodies.get(body_id) else {
                    continue;
                };
                island.bodies.push(body_id);

                if body.body_type != BodyType::Dynamic {
                    continue;
                }

                for &key in &body.contacts {
                    if self.visited_contacts.contains(&key) {
                        continue;
                    }
                    let Some(contact) = contacts.get(key) else {
                        continue;
                    };
                    if !contact.is_solvable() {
                        continue;
                    }
                    let other = contact.other_body(body_id);
                    if !bodies.get(other).is_some_and(|b| b.enabled) {
                        continue;
                    }
                    self.visited_contacts.insert(key);
                    island.contacts.push(key);
                    if self.visited_bodies.insert(other) {
                        stack.push(other);
                    }
                }

                for &joint_id in &body.joints {
                    if self.visited_joints.contains(&joint_id) {
                        continue;
                    }
                    let Some(joint) = joints.get(joint_id) else {
                        continue;
                    };
                    let other = joint.other_body(body_id);
                    if !bodies.get(other).is_some_and(|b| b.enabled) {
                        continue;
                    }
                    self.visited_joints.insert(joint_id);
                    island.joints.push(joint_id);
                    if self.visited_bodies.insert(other) {
                        stack.push(other);
                    }
                }
            }

            // Let fixed bodies join other islands too.
            for id in &island.bodies {
                if bodies.get(*id).is_some_and(|b| b.body_type != BodyType::Dynamic) {
                    self.visited_bodies.remove(id);
                }
            }

            self.islands.push(island);
        }

        &self.islands
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn island_count(&self) -> usize {
        self.islands.len()
    }
}

/// Read-only world state shared by island jobs.
#[derive(Clone, Copy)]
pub struct IslandContext<'a> {
    pub bodies: &'a Arena<BodyId, RigidBody>,
    pub fixtures: &'a Arena<FixtureId, Fixture>,
    pub contacts: &'a Arena<ContactKey, Contact>,
    pub joints: &'a Arena<JointId, Joint>,
    pub config: &'a SimulationConfig,
    pub step: TimeStep,
    pub gravity: Vec2,
}

/// Final state of one body after an island solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyOutcome {
    pub id: BodyId,
    pub sweep: Sweep,
    pub velocity: Velocity,
    pub sleep_time: f32,
}

/// Everything an island solve changes, applied by the world in island order.
#[derive(Debug, Clone, Default)]
pub struct IslandOutcome {
    pub bodies: Vec<BodyOutcome>,
    /// Manifold with stored impulses, plus the impulses to report in post-solve.
    pub contacts: Vec<(ContactKey, Manifold, ContactImpulse)>,
    pub joints: Vec<(JointId, JointKind)>,
    /// Every dynamic body in the island should be put to sleep.
    pub sleep: bool,
    pub metrics: SolverStepMetrics,
}

/// Island-local arrays indexed by position in `ids`.
struct LocalBodies {
    ids: Vec<BodyId>,
    index: HashMap<BodyId, usize>,
    solver: Vec<SolverBody>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl LocalBodies {
    fn gather(ids: &[BodyId], bodies: &Arena<BodyId, RigidBody>) -> Self {
        let mut local = Self {
            ids: Vec::with_capacity(ids.len()),
            index: HashMap::with_capacity(ids.len()),
            solver: Vec::with_capacity(ids.len()),
            positions: Vec::with_capacity(ids.len()),
            velocities: Vec::with_capacity(ids.len()),
        };
        for &id in ids {
            let Some(body) = bodies.get(id) else {
                continue;
            };
            local.index.insert(id, local.ids.len());
            local.ids.push(id);
            // Only dynamic bodies respond to impulses.
            let dynamic = body.body_type == BodyType::Dynamic;
            local.solver.push(SolverBody {
                local_center: body.sweep.local_center,
                inv_mass: if dynamic { body.inv_mass } else { 0.0 },
                inv_inertia: if dynamic { body.inv_inertia } else { 0.0 },
            });
            local.positions.push(Position {
                center: body.sweep.c,
                angle: body.sweep.a,
            });
            local.velocities.push(body.velocity);
        }
        local
    }

    fn contact_defs(
        &self,
        keys: &[ContactKey],
        contacts: &Arena<ContactKey, Contact>,
        fixtures: &Arena<FixtureId, Fixture>,
    ) -> Vec<ContactConstraintDef> {
        keys.iter()
            .filter_map(|&key| {
                let contact = contacts.get(key)?;
                let fixture_a = fixtures.get(contact.fixture_a())?;
                let fixture_b = fixtures.get(contact.fixture_b())?;
                if contact.manifold.point_count == 0 {
                    return None;
                }
                Some(ContactConstraintDef {
                    key,
                    index_a: *self.index.get(&contact.body_a)?,
                    index_b: *self.index.get(&contact.body_b)?,
                    friction: contact.friction,
                    restitution: contact.restitution,
                    restitution_threshold: contact.restitution_threshold,
                    tangent_speed: contact.tangent_speed,
                    radius_a: fixture_a.shape.radius(),
                    radius_b: fixture_b.shape.radius(),
                    manifold: contact.manifold,
                })
            })
            .collect()
    }

    fn joints(&self, ids: &[JointId], joints: &Arena<JointId, Joint>) -> Vec<(JointId, JointKind)> {
        ids.iter()
            .filter_map(|&id| {
                let joint = joints.get(id)?;
                let mut kind = joint.kind;
                kind.bind(*self.index.get(&joint.body_a)?, *self.index.get(&joint.body_b)?);
                Some((id, kind))
            })
            .collect()
    }
}

/// Integrates, solves and tests one island for sleep.
pub fn solve_island(ctx: &IslandContext, island: &Island) -> IslandOutcome {
    let config = ctx.config;
    let step = ctx.step;
    let h = step.dt;
    let integrator = Integrator::new(ctx.gravity, config);

    let mut local = LocalBodies::gather(&island.bodies, ctx.bodies);

    // Integrate velocities of dynamic bodies.
    for (i, id) in local.ids.iter().enumerate() {
        if let Some(body) = ctx.bodies.get(*id) {
            local.velocities[i] = integrator.integrate_velocity(body, local.velocities[i], h);
        }
    }

    let mut defs = local.contact_defs(&island.contacts, ctx.contacts, ctx.fixtures);
    let mut joints = local.joints(&island.joints, ctx.joints);

    let mut contact_solver = ContactSolver::new(step, &defs, &local.solver, config);
    contact_solver.initialize_velocity_constraints(&local.positions, &local.velocities);
    if step.warm_starting {
        contact_solver.warm_start(&mut local.velocities);
    }

    {
        let mut data = SolverData {
            step,
            config,
            bodies: &local.solver,
            positions: &mut local.positions,
            velocities: &mut local.velocities,
        };
        for (_, joint) in &mut joints {
            joint.init_velocity_constraints(&mut data);
        }
    }

    for _ in 0..step.velocity_iterations {
        let mut data = SolverData {
            step,
            config,
            bodies: &local.solver,
            positions: &mut local.positions,
            velocities: &mut local.velocities,
        };
        for (_, joint) in &mut joints {
            joint.solve_velocity_constraints(&mut data);
        }
        contact_solver.solve_velocity_constraints(&mut local.velocities);
    }

    contact_solver.store_impulses(&mut defs);
    let impulses = contact_solver.impulses();

    for i in 0..local.ids.len() {
        integrator.integrate_position(&mut local.positions[i], &mut local.velocities[i], h);
    }

    let mut position_solved = false;
    for _ in 0..step.position_iterations {
        let contacts_ok = contact_solver.solve_position_constraints(&mut local.positions);
        let mut data = SolverData {
            step,
            config,
            bodies: &local.solver,
            positions: &mut local.positions,
            velocities: &mut local.velocities,
        };
        let mut joints_ok = true;
        for (_, joint) in &mut joints {
            joints_ok &= joint.solve_position_constraints(&mut data);
        }
        if contacts_ok && joints_ok {
            position_solved = true;
            break;
        }
    }

    let mut outcome = IslandOutcome::default();
    let mut min_sleep_time = f32::MAX;
    let linear_tolerance_sq = config.linear_sleep_tolerance * config.linear_sleep_tolerance;
    let angular_tolerance_sq = config.angular_sleep_tolerance * config.angular_sleep_tolerance;

    for (i, &id) in local.ids.iter().enumerate() {
        let Some(body) = ctx.bodies.get(id) else {
            continue;
        };
        let velocity = local.velocities[i];
        match body.body_type {
            BodyType::Static => {}
            BodyType::Kinematic => {
                // Moved by the world, never by an island; a moving platform keeps its island awake.
                if velocity.linear.length_squared() > linear_tolerance_sq
                    || velocity.angular * velocity.angular > angular_tolerance_sq
                {
                    min_sleep_time = 0.0;
                }
            }
            BodyType::Dynamic => {
                let mut sweep = body.sweep;
                sweep.c0 = sweep.c;
                sweep.a0 = sweep.a;
                sweep.c = local.positions[i].center;
                sweep.a = local.positions[i].angle;

                let sleep_time = if !body.allow_sleep
                    || velocity.angular * velocity.angular > angular_tolerance_sq
                    || velocity.linear.length_squared() > linear_tolerance_sq
                {
                    0.0
                } else {
                    body.sleep_time + h
                };
                min_sleep_time = min_sleep_time.min(sleep_time);

                outcome.bodies.push(BodyOutcome {
                    id,
                    sweep,
                    velocity,
                    sleep_time,
                });
            }
        }
    }

    outcome.sleep = config.allow_sleep && position_solved && min_sleep_time >= config.time_to_sleep;
    outcome.metrics.record_island(&impulses, joints.len());
    outcome.contacts = defs
        .into_iter()
        .zip(impulses)
        .map(|(def, impulse)| (def.key, def.manifold, impulse))
        .collect();
    outcome.joints = joints;
    outcome
}

/// Result of resolving one time-of-impact event.
#[derive(Debug, Clone, Default)]
pub struct ToiOutcome {
    pub bodies: Vec<BodyOutcome>,
    /// Impulses for post-solve reporting; they are not stored for warm starting.
    pub impulses: Vec<(ContactKey, ContactImpulse)>,
}

/// Solves a TOI mini-island over the remainder `(1 - alpha) * dt` of the step.
///
/// `toi_a` and `toi_b` are the two bodies of the impact contact. Only they move during the
/// position pass, and their sweep start is moved to the resolved pose.
pub fn solve_toi_island(
    ctx: &IslandContext,
    island: &Island,
    toi_a: BodyId,
    toi_b: BodyId,
) -> ToiOutcome {
    let config = ctx.config;
    let step = ctx.step;
    let integrator = Integrator::new(ctx.gravity, config);
    let mut local = LocalBodies::gather(&island.bodies, ctx.bodies);

    let (Some(&index_a), Some(&index_b)) = (local.index.get(&toi_a), local.index.get(&toi_b)) else {
        return ToiOutcome::default();
    };

    let defs = local.contact_defs(&island.contacts, ctx.contacts, ctx.fixtures);
    let sub_step = TimeStep {
        warm_starting: false,
        ..step
    };
    let mut contact_solver = ContactSolver::new(sub_step, &defs, &local.solver, config);

    for _ in 0..sub_step.position_iterations {
        if contact_solver.solve_toi_position_constraints(&mut local.positions, index_a, index_b) {
            break;
        }
    }

    // The resolved poses become the new sweep start of the impact pair.
    let mut sweeps: Vec<Sweep> = local
        .ids
        .iter()
        .filter_map(|id| ctx.bodies.get(*id).map(|b| b.sweep))
        .collect();
    for index in [index_a, index_b] {
        sweeps[index].c0 = local.positions[index].center;
        sweeps[index].a0 = local.positions[index].angle;
    }

    contact_solver.initialize_velocity_constraints(&local.positions, &local.velocities);
    for _ in 0..sub_step.velocity_iterations {
        contact_solver.solve_velocity_constraints(&mut local.velocities);
    }

    let h = sub_step.dt;
    let mut outcome = ToiOutcome::default();
    for (i, &id) in local.ids.iter().enumerate() {
        let Some(body) = ctx.bodies.get(id) else {
            continue;
        };
        // Kinematic bodies were rewound to the impact time and must finish their motion too.
        if body.body_type == BodyType::Static {
            continue;
        }
        integrator.integrate_position(&mut local.positions[i], &mut local.velocities[i], h);
        let mut sweep = sweeps[i];
        sweep.c = local.positions[i].center;
        sweep.a = local.positions[i].angle;
        outcome.bodies.push(BodyOutcome {
            id,
            sweep,
            velocity: local.velocities[i],
            sleep_time: body.sleep_time,
        });
    }

    outcome.impulses = defs
        .iter()
        .map(|def| def.key)
        .zip(contact_solver.impulses())
        .collect();
    outcome
}

/// Solves every island, in parallel when the `parallel` feature is enabled.
///
/// Outcomes are returned in island order regardless of scheduling.
pub fn solve_islands(ctx: &IslandContext, islands: &[Island]) -> Vec<IslandOutcome> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if islands.len() > 1 {
            return islands.par_iter().map(|island| solve_island(ctx, island)).collect();
        }
    }
    islands.iter().map(|island| solve_island(ctx, island)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{broadphase::BroadPhase, narrowphase::ContactKind, shapes::Shape},
        core::{fixture::FixtureDef, rigidbody::BodyDef, types::MixingMode},
    };

    struct Scene {
        bodies: Arena<BodyId, RigidBody>,
        fixtures: Arena<FixtureId, Fixture>,
        contacts: Arena<ContactKey, Contact>,
        joints: Arena<JointId, Joint>,
        config: SimulationConfig,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                bodies: Arena::new(),
                fixtures: Arena::new(),
                contacts: Arena::new(),
                joints: Arena::new(),
                config: SimulationConfig::default(),
            }
        }

        fn body(&mut self, def: BodyDef, shape: Shape) -> BodyId {
            let body_id = self.bodies.insert_with(|id| RigidBody::new(id, &def));
            let fixture_id = self
                .fixtures
                .insert(Fixture::new(body_id, FixtureDef::new(shape), self.config.restitution_threshold));
            let mut broad_phase = BroadPhase::new(0.1, 4.0);
            let body = self.bodies.get_mut(body_id).expect("body");
            let fixture = self.fixtures.get_mut(fixture_id).expect("fixture");
            fixture.create_proxies(fixture_id, &mut broad_phase, &body.transform);
            body.fixtures.push(fixture_id);
            body.reset_mass_data([fixture.mass_data()]);
            body_id
        }

        fn touch(&mut self, a: BodyId, b: BodyId) -> ContactKey {
            let fixture_a = self.bodies.get(a).expect("a").fixtures[0];
            let fixture_b = self.bodies.get(b).expect("b").fixtures[0];
            let fa = self.fixtures.get(fixture_a).expect("fa");
            let fb = self.fixtures.get(fixture_b).expect("fb");
            let mut contact = Contact::new(
                ContactKind::PolygonPolygon,
                crate::core::fixture::FixtureProxyKey {
                    fixture: fixture_a,
                    child: 0,
                },
                fa,
                crate::core::fixture::FixtureProxyKey {
                    fixture: fixture_b,
                    child: 0,
                },
                fb,
                MixingMode::GeometricMean,
                MixingMode::Max,
            );
            let xf_a = *self.bodies.get(a).expect("a").transform();
            let xf_b = *self.bodies.get(b).expect("b").transform();
            contact.update(&fa.shape, &xf_a, &fb.shape, &xf_b);
            let key = self.contacts.insert(contact);
            self.bodies.get_mut(a).expect("a").contacts.push(key);
            self.bodies.get_mut(b).expect("b").contacts.push(key);
            key
        }

        fn context(&self) -> IslandContext<'_> {
            IslandContext {
                bodies: &self.bodies,
                fixtures: &self.fixtures,
                contacts: &self.contacts,
                joints: &self.joints,
                config: &self.config,
                step: TimeStep::new(1.0 / 60.0, 60.0, &self.config),
                gravity: Vec2::new(0.0, -10.0),
            }
        }
    }

    #[test]
    fn static_ground_does_not_merge_islands() {
        let mut scene = Scene::new();
        let ground = scene.body(BodyDef::fixed(), Shape::cuboid(10.0, 0.5));
        let left = scene.body(BodyDef::dynamic().with_position(Vec2::new(-3.0, 0.99)), Shape::cuboid(0.5, 0.5));
        let right = scene.body(BodyDef::dynamic().with_position(Vec2::new(3.0, 0.99)), Shape::cuboid(0.5, 0.5));
        scene.touch(ground, left);
        scene.touch(ground, right);

        let mut manager = IslandManager::new();
        let islands = manager.build_islands(&scene.bodies, &scene.contacts, &scene.joints);
        assert_eq!(islands.len(), 2);
        for island in islands {
            assert_eq!(island.bodies.len(), 2);
            assert!(island.bodies.contains(&ground));
            assert_eq!(island.contacts.len(), 1);
        }
    }

    #[test]
    fn sleeping_bodies_do_not_seed_islands() {
        let mut scene = Scene::new();
        scene.body(BodyDef::dynamic().with_awake(false), Shape::circle(0.5));
        let mut manager = IslandManager::new();
        assert!(manager.build_islands(&scene.bodies, &scene.contacts, &scene.joints).is_empty());
    }

    #[test]
    fn resting_box_is_supported_by_ground() {
        let mut scene = Scene::new();
        let ground = scene.body(BodyDef::fixed(), Shape::cuboid(5.0, 0.5));
        let boxed = scene.body(BodyDef::dynamic().with_position(Vec2::new(0.0, 0.995)), Shape::cuboid(0.5, 0.5));
        scene.touch(ground, boxed);

        let mut manager = IslandManager::new();
        let islands = manager.build_islands(&scene.bodies, &scene.contacts, &scene.joints).to_vec();
        let outcome = solve_island(&scene.context(), &islands[0]);

        assert_eq!(outcome.bodies.len(), 1);
        let body = outcome.bodies[0];
        assert_eq!(body.id, boxed);
        assert!(body.velocity.linear.y.abs() < 1e-3, "velocity {:?}", body.velocity);
        assert!(outcome.contacts[0].2.normal_impulses[..2].iter().sum::<f32>() > 0.0);
        assert_eq!(outcome.metrics.islands_solved, 1);
    }

    #[test]
    fn free_fall_integrates_gravity() {
        let mut scene = Scene::new();
        let id = scene.body(BodyDef::dynamic().with_position(Vec2::new(0.0, 10.0)), Shape::circle(0.5));
        let mut manager = IslandManager::new();
        let islands = manager.build_islands(&scene.bodies, &scene.contacts, &scene.joints).to_vec();
        let outcomes = solve_islands(&scene.context(), &islands);
        let body = outcomes[0].bodies[0];
        assert_eq!(body.id, id);
        assert!((body.velocity.linear.y + 10.0 / 60.0).abs() < 1e-5);
        assert_eq!(body.sweep.c0, Vec2::new(0.0, 10.0));
        assert!(body.sweep.c.y < 10.0);
        assert!(!outcomes[0].sleep);
    }
}
