//! The simulation container and its step pipeline.

pub mod commands;
pub mod contact_manager;
pub mod listener;
mod toi;

use std::collections::HashSet;
use std::time::Instant;

use glam::Vec2;

pub use commands::{CommandQueue, WorldCommand};
pub use contact_manager::ContactManager;
pub use listener::{ContactFilter, ContactListener, DefaultContactFilter, NullListener};

use crate::{
    collision::{
        aabb::Aabb,
        contact::Contact,
        queries::{self, Raycast, RaycastHit, RaycastQuery},
    },
    config::SimulationConfig,
    core::{
        constraints::{Joint, JointDef},
        fixture::{Filter, Fixture, FixtureDef},
        rigidbody::{BodyDef, BodyType, RigidBody},
    },
    dynamics::{
        island::{solve_islands, IslandContext, IslandManager},
        solver::{SolverStepMetrics, TimeStep},
    },
    error::{PhysicsError, PhysicsResult},
    utils::{
        allocator::{Arena, BodyId, ContactKey, FixtureId, JointId},
        logging::{warn_if_step_budget_exceeded, ScopedTimer},
        profiling::StepProfile,
    },
};

/// Upper bound on fixed steps taken by one [`PhysicsWorld::advance`] call.
const MAX_ADVANCE_STEPS: u32 = 16;

/// Central simulation container orchestrating all subsystems.
pub struct PhysicsWorld {
    bodies: Arena<BodyId, RigidBody>,
    fixtures: Arena<FixtureId, Fixture>,
    joints: Arena<JointId, Joint>,
    contact_manager: ContactManager,
    islands: IslandManager,
    config: SimulationConfig,
    gravity: Vec2,
    listener: Box<dyn ContactListener>,
    filter: Box<dyn ContactFilter>,
    commands: CommandQueue,
    new_fixtures: bool,
    previous_inv_dt: f32,
    accumulator: f32,
    profile: StepProfile,
    metrics: SolverStepMetrics,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::with_gravity(Vec2::from_array(crate::config::DEFAULT_GRAVITY))
    }
}

impl PhysicsWorld {
    /// Creates a world after validating `config`.
    pub fn new(gravity: Vec2, config: SimulationConfig) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self {
            bodies: Arena::new(),
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::new(&config),
            islands: IslandManager::new(),
            config,
            gravity,
            listener: Box::new(NullListener),
            filter: Box::new(DefaultContactFilter),
            commands: CommandQueue::new(),
            new_fixtures: false,
            previous_inv_dt: 0.0,
            accumulator: 0.0,
            profile: StepProfile::default(),
            metrics: SolverStepMetrics::default(),
        })
    }

    /// World with the default configuration.
    pub fn with_gravity(gravity: Vec2) -> Self {
        let config = SimulationConfig::default();
        Self {
            bodies: Arena::new(),
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::new(&config),
            islands: IslandManager::new(),
            config,
            gravity,
            listener: Box::new(NullListener),
            filter: Box::new(DefaultContactFilter),
            commands: CommandQueue::new(),
            new_fixtures: false,
            previous_inv_dt: 0.0,
            accumulator: 0.0,
            profile: StepProfile::default(),
            metrics: SolverStepMetrics::default(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn set_contact_listener<L>(&mut self, listener: L)
    where
        L: ContactListener + 'static,
    {
        self.listener = Box::new(listener);
    }

    pub fn set_contact_filter<F>(&mut self, filter: F)
    where
        F: ContactFilter + 'static,
    {
        self.filter = Box::new(filter);
    }

    /// Shared handle for queuing changes from inside callbacks.
    pub fn command_queue(&self) -> CommandQueue {
        self.commands.clone()
    }

    pub fn profile(&self) -> &StepProfile {
        &self.profile
    }

    pub fn solver_metrics(&self) -> &SolverStepMetrics {
        &self.metrics
    }

    // Bodies

    pub fn create_body(&mut self, def: &BodyDef) -> BodyId {
        let id = self.bodies.insert_with(|id| RigidBody::new(id, def));
        log::debug!("created {:?} body {id:?}", def.body_type);
        id
    }

    /// Destroys a body with its joints, contacts and fixtures.
    pub fn destroy_body(&mut self, id: BodyId) -> PhysicsResult<()> {
        let body = self.bodies.get(id).ok_or(PhysicsError::InvalidBody(id))?;
        let joints = body.joints.clone();
        let fixtures = body.fixtures.clone();

        for joint in joints {
            self.destroy_joint(joint)?;
        }
        self.contact_manager
            .destroy_for_body(id, None, &mut self.bodies, self.listener.as_mut());
        for fixture_id in fixtures {
            if let Some(mut fixture) = self.fixtures.remove(fixture_id) {
                fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
            }
        }
        self.bodies.remove(id);
        log::debug!("destroyed body {id:?}");
        Ok(())
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> + '_ {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Teleports a body and refreshes its broad-phase proxies.
    pub fn set_transform(&mut self, id: BodyId, position: Vec2, angle: f32) -> PhysicsResult<()> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::InvalidBody(id))?;
        body.set_transform(position, angle);
        let xf = *body.transform();
        for &fixture_id in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(fixture_id) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }
        self.find_new_contacts();
        Ok(())
    }

    /// Changes the body type, resetting mass and dropping its contacts.
    pub fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> PhysicsResult<()> {
        let body = self.bodies.get(id).ok_or(PhysicsError::InvalidBody(id))?;
        if body.body_type == body_type {
            return Ok(());
        }

        if let Some(body) = self.bodies.get_mut(id) {
            body.body_type = body_type;
        }
        self.reset_mass_data(id);

        if let Some(body) = self.bodies.get_mut(id) {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
            if body_type == BodyType::Static {
                body.velocity = Default::default();
                body.sweep.c0 = body.sweep.c;
                body.sweep.a0 = body.sweep.a;
                body.awake = false;
                body.sleep_time = 0.0;
            } else {
                body.set_awake(true);
            }
        }

        self.contact_manager
            .destroy_for_body(id, None, &mut self.bodies, self.listener.as_mut());
        self.touch_proxies(id);
        Ok(())
    }

    /// Disabled bodies keep their fixtures but leave the broad phase and the solver.
    pub fn set_enabled(&mut self, id: BodyId, enabled: bool) -> PhysicsResult<()> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::InvalidBody(id))?;
        if body.enabled == enabled {
            return Ok(());
        }
        body.enabled = enabled;
        let xf = *body.transform();
        let fixtures = body.fixtures.clone();

        if enabled {
            for fixture_id in fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture_id) {
                    fixture.create_proxies(fixture_id, &mut self.contact_manager.broad_phase, &xf);
                }
            }
            self.new_fixtures = true;
        } else {
            for fixture_id in fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture_id) {
                    fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
                }
            }
            self.contact_manager
                .destroy_for_body(id, None, &mut self.bodies, self.listener.as_mut());
        }
        Ok(())
    }

    // Fixtures

    /// Attaches a shape to a body and recomputes the body's mass.
    pub fn create_fixture(&mut self, body_id: BodyId, def: FixtureDef) -> PhysicsResult<FixtureId> {
        let body = self.bodies.get(body_id).ok_or(PhysicsError::InvalidBody(body_id))?;
        let enabled = body.enabled;
        let xf = *body.transform();

        let fixture = Fixture::new(body_id, def, self.config.restitution_threshold);
        let has_density = fixture.density > 0.0;
        let id = self.fixtures.insert(fixture);
        if enabled {
            if let Some(fixture) = self.fixtures.get_mut(id) {
                fixture.create_proxies(id, &mut self.contact_manager.broad_phase, &xf);
            }
        }
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.fixtures.push(id);
        }
        if has_density {
            self.reset_mass_data(body_id);
        }
        self.new_fixtures = true;
        Ok(id)
    }

    pub fn destroy_fixture(&mut self, id: FixtureId) -> PhysicsResult<()> {
        let body_id = self.fixtures.get(id).ok_or(PhysicsError::InvalidFixture(id))?.body;
        self.contact_manager
            .destroy_for_body(body_id, Some(id), &mut self.bodies, self.listener.as_mut());
        if let Some(mut fixture) = self.fixtures.remove(id) {
            fixture.destroy_proxies(&mut self.contact_manager.broad_phase);
        }
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.fixtures.retain(|&f| f != id);
        }
        self.reset_mass_data(body_id);
        Ok(())
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    /// Friction, restitution and user data can be edited in place.
    pub fn fixture_mut(&mut self, id: FixtureId) -> Option<&mut Fixture> {
        self.fixtures.get_mut(id)
    }

    /// Replaces a fixture's filter and re-evaluates its contacts.
    pub fn set_filter(&mut self, id: FixtureId, filter: Filter) -> PhysicsResult<()> {
        let fixture = self.fixtures.get_mut(id).ok_or(PhysicsError::InvalidFixture(id))?;
        fixture.filter = filter;
        let body_id = fixture.body;
        fixture.refilter(&mut self.contact_manager.broad_phase);

        if let Some(body) = self.bodies.get(body_id) {
            for &key in &body.contacts {
                if let Some(contact) = self.contact_manager.contacts.get_mut(key) {
                    if contact.fixture_a() == id || contact.fixture_b() == id {
                        contact.flag_for_filtering();
                    }
                }
            }
        }
        Ok(())
    }

    fn reset_mass_data(&mut self, body_id: BodyId) {
        let Some(body) = self.bodies.get(body_id) else {
            return;
        };
        let masses: Vec<_> = body
            .fixtures
            .iter()
            .filter_map(|id| self.fixtures.get(*id))
            .filter(|fixture| fixture.density > 0.0)
            .map(Fixture::mass_data)
            .collect();
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.reset_mass_data(masses);
        }
    }

    fn touch_proxies(&mut self, body_id: BodyId) {
        let Some(body) = self.bodies.get(body_id) else {
            return;
        };
        for fixture in body.fixtures.iter().filter_map(|id| self.fixtures.get(*id)) {
            fixture.refilter(&mut self.contact_manager.broad_phase);
        }
    }

    // Joints

    pub fn create_joint(&mut self, def: impl Into<JointDef>) -> PhysicsResult<JointId> {
        let def = def.into();
        let (body_a, body_b) = def.bodies();
        if body_a == body_b {
            return Err(PhysicsError::SameBody(body_a));
        }
        for id in [body_a, body_b] {
            if !self.bodies.contains(id) {
                return Err(PhysicsError::InvalidBody(id));
            }
        }

        let id = self.joints.insert(Joint::new(&def));
        for body in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.push(id);
            }
        }

        // Connected bodies stop colliding unless the joint allows it.
        if !def.collide_connected() {
            self.flag_contacts_between(body_a, body_b);
        }
        log::debug!("created joint {id:?} between {body_a:?} and {body_b:?}");
        Ok(id)
    }

    pub fn destroy_joint(&mut self, id: JointId) -> PhysicsResult<()> {
        let joint = self.joints.remove(id).ok_or(PhysicsError::InvalidJoint(id))?;
        for body_id in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.joints.retain(|&j| j != id);
                body.set_awake(true);
            }
        }
        // Pairs suppressed by the joint may collide again.
        if !joint.collide_connected {
            self.touch_proxies(joint.body_b);
        }
        Ok(())
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id)
    }

    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joints.get_mut(id)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn flag_contacts_between(&mut self, body_a: BodyId, body_b: BodyId) {
        let Some(body) = self.bodies.get(body_b) else {
            return;
        };
        for &key in &body.contacts {
            if let Some(contact) = self.contact_manager.contacts.get_mut(key) {
                if contact.other_body(body_b) == body_a {
                    contact.flag_for_filtering();
                }
            }
        }
    }

    // Contacts

    pub fn contacts(&self) -> impl Iterator<Item = (ContactKey, &Contact)> + '_ {
        self.contact_manager.contacts.iter()
    }

    pub fn contact(&self, key: ContactKey) -> Option<&Contact> {
        self.contact_manager.contacts.get(key)
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contact_count()
    }

    pub fn contact_manager(&self) -> &ContactManager {
        &self.contact_manager
    }

    // Queries

    /// Fixtures whose fat AABB overlaps `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<FixtureId> {
        queries::query_aabb(aabb, &self.contact_manager.broad_phase)
    }

    pub fn query_point(&self, point: Vec2) -> Vec<FixtureId> {
        queries::query_point(point, &self.contact_manager.broad_phase, &self.fixtures, &self.bodies)
    }

    /// Every hit along the ray, nearest first.
    pub fn ray_cast(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        Raycast::cast(query, &self.contact_manager.broad_phase, &self.fixtures, &self.bodies)
    }

    pub fn ray_cast_with_filter<F>(&self, query: &RaycastQuery, filter: F) -> Vec<RaycastHit>
    where
        F: FnMut(FixtureId, &Fixture) -> bool,
    {
        Raycast::cast_with_filter(query, &self.contact_manager.broad_phase, &self.fixtures, &self.bodies, filter)
    }

    pub fn ray_cast_closest(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        Raycast::cast_closest(query, &self.contact_manager.broad_phase, &self.fixtures, &self.bodies)
    }

    // Stepping

    /// Runs fixed steps of `config.time_step` for the accumulated frame time.
    ///
    /// Returns the number of steps taken. Time beyond [`MAX_ADVANCE_STEPS`] steps is dropped.
    pub fn advance(&mut self, frame_time: f32) -> u32 {
        let time_step = self.config.time_step;
        self.accumulator += frame_time.max(0.0);

        let mut steps = 0;
        while self.accumulator >= time_step {
            if steps == MAX_ADVANCE_STEPS {
                log::warn!("advance fell behind; dropping {:.3} s", self.accumulator);
                self.accumulator = 0.0;
                break;
            }
            self.accumulator -= time_step;
            self.step(time_step);
            steps += 1;
        }
        steps
    }

    /// Time left over after the last [`Self::advance`], for render interpolation.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Advances the simulation by `dt`. A zero `dt` only updates contacts.
    pub fn step(&mut self, dt: f32) {
        let _timer = ScopedTimer::new("world::step");
        let start = Instant::now();
        self.profile.reset();
        self.metrics = SolverStepMetrics::default();

        if self.new_fixtures {
            let start = Instant::now();
            self.find_new_contacts();
            self.new_fixtures = false;
            self.profile.broad_phase_time += start.elapsed();
        }

        let step = TimeStep::new(dt, self.previous_inv_dt, &self.config);

        {
            let _timer = ScopedTimer::new("contacts::collide");
            let start = Instant::now();
            self.contact_manager.collide(
                &mut self.bodies,
                &self.fixtures,
                &self.joints,
                self.filter.as_ref(),
                self.listener.as_mut(),
            );
            self.profile.collide_time += start.elapsed();
        }

        if step.dt > 0.0 {
            let _timer = ScopedTimer::new("solver::islands");
            let start = Instant::now();
            self.solve(&step);
            self.profile.solve_time += start.elapsed();
        }

        if self.config.continuous_physics && step.dt > 0.0 {
            let _timer = ScopedTimer::new("solver::toi");
            let start = Instant::now();
            self.solve_toi(&step);
            self.profile.solve_toi_time += start.elapsed();
        }

        if step.dt > 0.0 {
            self.previous_inv_dt = step.inv_dt;
        }

        for body in self.bodies.values_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }

        self.apply_commands();

        self.profile.body_count = self.bodies.len();
        self.profile.contact_count = self.contact_manager.contact_count();
        self.profile.island_count = self.islands.island_count();
        self.profile.total_step_time = start.elapsed();
        if let Some(budget_ms) = self.config.step_budget_ms {
            self.profile.over_budget = warn_if_step_budget_exceeded(self.profile.total_step_time, budget_ms);
        }
        self.profile.report();
    }

    fn find_new_contacts(&mut self) {
        self.contact_manager.find_new_contacts(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            self.filter.as_ref(),
            &self.config,
        );
    }

    fn solve(&mut self, step: &TimeStep) {
        self.islands
            .build_islands(&self.bodies, &self.contact_manager.contacts, &self.joints);

        // Bodies reached through a contact or joint wake with their island.
        for island in self.islands.islands() {
            for &id in &island.bodies {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.set_awake(true);
                }
            }
        }

        let outcomes = {
            let ctx = IslandContext {
                bodies: &self.bodies,
                fixtures: &self.fixtures,
                contacts: &self.contact_manager.contacts,
                joints: &self.joints,
                config: &self.config,
                step: *step,
                gravity: self.gravity,
            };
            solve_islands(&ctx, self.islands.islands())
        };

        let mut moved: HashSet<BodyId> = HashSet::new();
        for outcome in outcomes {
            for result in &outcome.bodies {
                if let Some(body) = self.bodies.get_mut(result.id) {
                    body.sweep = result.sweep;
                    body.velocity = result.velocity;
                    body.sleep_time = result.sleep_time;
                    body.synchronize_transform();
                    moved.insert(result.id);
                }
            }
            for (key, manifold, impulse) in &outcome.contacts {
                if let Some(contact) = self.contact_manager.contacts.get_mut(*key) {
                    contact.manifold = *manifold;
                    self.listener.post_solve(contact, impulse);
                }
            }
            for (id, kind) in outcome.joints {
                if let Some(joint) = self.joints.get_mut(id) {
                    joint.kind = kind;
                }
            }
            if outcome.sleep {
                log::debug!("island of {} bodies fell asleep", outcome.bodies.len());
                for result in &outcome.bodies {
                    if let Some(body) = self.bodies.get_mut(result.id) {
                        body.set_awake(false);
                        body.sweep.c0 = body.sweep.c;
                        body.sweep.a0 = body.sweep.a;
                    }
                }
            }
            self.metrics.merge(&outcome.metrics);
        }

        // Kinematic bodies move exactly once per step, outside any island.
        let h = step.dt;
        for (id, body) in self.bodies.iter_mut() {
            if body.body_type != BodyType::Kinematic || !body.awake || !body.enabled {
                continue;
            }
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c += h * body.velocity.linear;
            body.sweep.a += h * body.velocity.angular;
            body.synchronize_transform();
            moved.insert(id);
        }

        let start = Instant::now();
        let mut moved: Vec<BodyId> = moved.into_iter().collect();
        moved.sort();
        for id in moved {
            self.synchronize_fixtures(id);
        }
        self.find_new_contacts();
        self.profile.broad_phase_time += start.elapsed();
    }

    /// Moves a body's proxies to cover its sweep from `c0` to `c`.
    fn synchronize_fixtures(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get(id) else {
            return;
        };
        if !body.enabled {
            return;
        }
        let xf1 = body.start_transform();
        let xf2 = *body.transform();
        for &fixture_id in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(fixture_id) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
            }
        }
    }

    fn apply_commands(&mut self) {
        for command in self.commands.drain() {
            let result = match command {
                WorldCommand::DestroyBody(id) => self.destroy_body(id),
                WorldCommand::DestroyFixture(id) => self.destroy_fixture(id),
                WorldCommand::DestroyJoint(id) => self.destroy_joint(id),
                WorldCommand::SetAwake(id, awake) => self
                    .bodies
                    .get_mut(id)
                    .map(|body| body.set_awake(awake))
                    .ok_or(PhysicsError::InvalidBody(id)),
                WorldCommand::SetEnabled(id, enabled) => self.set_enabled(id, enabled),
                WorldCommand::SetTransform { body, position, angle } => self.set_transform(body, position, angle),
                WorldCommand::SetLinearVelocity(id, velocity) => self
                    .bodies
                    .get_mut(id)
                    .map(|body| body.set_linear_velocity(velocity))
                    .ok_or(PhysicsError::InvalidBody(id)),
                WorldCommand::ApplyLinearImpulse { body, impulse, point } => self
                    .bodies
                    .get_mut(body)
                    .map(|b| {
                        b.apply_linear_impulse(impulse, point, true);
                    })
                    .ok_or(PhysicsError::InvalidBody(body)),
            };
            if let Err(err) = result {
                log::warn!("dropped queued command {command:?}: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Shape;
    use crate::core::constraints::RevoluteJointDef;

    fn world() -> PhysicsWorld {
        PhysicsWorld::with_gravity(Vec2::new(0.0, -10.0))
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            velocity_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            PhysicsWorld::new(Vec2::ZERO, config),
            Err(PhysicsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn stale_handles_are_errors() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic());
        world.destroy_body(body).expect("destroy");
        assert_eq!(world.destroy_body(body), Err(PhysicsError::InvalidBody(body)));
        assert_eq!(
            world.create_fixture(body, FixtureDef::new(Shape::circle(1.0))),
            Err(PhysicsError::InvalidBody(body))
        );
    }

    #[test]
    fn joint_needs_two_bodies() {
        let mut world = world();
        let id = world.create_body(&BodyDef::dynamic());
        let body = world.body(id).expect("body").clone();
        let def = RevoluteJointDef::new(&body, &body, Vec2::ZERO);
        assert_eq!(world.create_joint(def), Err(PhysicsError::SameBody(id)));
    }

    #[test]
    fn fixture_density_sets_body_mass() {
        let mut world = world();
        let id = world.create_body(&BodyDef::dynamic());
        world
            .create_fixture(id, FixtureDef::new(Shape::cuboid(1.0, 0.5)).with_density(2.0))
            .expect("fixture");
        assert!((world.body(id).expect("body").mass() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn advance_runs_whole_steps() {
        let mut world = world();
        let dt = world.config().time_step;
        assert_eq!(world.advance(dt * 2.5), 2);
        assert!((world.accumulator() - dt * 0.5).abs() < 1e-5);
    }

    #[test]
    fn step_profile_times_pair_finding() {
        let mut world = world();
        let ground = world.create_body(&BodyDef::fixed());
        world
            .create_fixture(ground, FixtureDef::new(Shape::cuboid(5.0, 0.5)))
            .expect("ground");
        let ball = world.create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0)));
        world
            .create_fixture(ball, FixtureDef::new(Shape::circle(0.5)))
            .expect("ball");

        world.step(1.0 / 60.0);

        let profile = *world.profile();
        assert_eq!(world.contact_count(), 1);
        assert!(profile.broad_phase_time > std::time::Duration::ZERO);
        assert!(profile.total_step_time >= profile.broad_phase_time);
        assert!(!profile.over_budget);
    }

    #[test]
    fn step_budget_overrun_is_flagged() {
        let config = SimulationConfig {
            step_budget_ms: Some(0.0),
            ..Default::default()
        };
        let mut world = PhysicsWorld::new(Vec2::new(0.0, -10.0), config).expect("valid config");
        let body = world.create_body(&BodyDef::dynamic());
        world
            .create_fixture(body, FixtureDef::new(Shape::circle(0.5)))
            .expect("fixture");
        world.step(1.0 / 60.0);
        assert!(world.profile().over_budget);
    }

    #[test]
    fn queued_commands_apply_after_step() {
        let mut world = world();
        let id = world.create_body(&BodyDef::dynamic());
        world.command_queue().push(WorldCommand::DestroyBody(id));
        assert!(world.body(id).is_some());
        world.step(1.0 / 60.0);
        assert!(world.body(id).is_none());
    }
}
