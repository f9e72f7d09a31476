use std::collections::HashMap;

use super::listener::{ContactFilter, ContactListener};
use crate::{
    collision::{
        broadphase::BroadPhase,
        contact::{Contact, ContactUpdate},
        narrowphase::ContactKind,
    },
    config::SimulationConfig,
    core::{
        constraints::Joint,
        fixture::{Fixture, FixtureProxyKey},
        rigidbody::RigidBody,
    },
    utils::allocator::{Arena, BodyId, ContactKey, FixtureId, JointId},
};

/// Owns the broad phase and every persistent contact.
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase<FixtureProxyKey>,
    pub(crate) contacts: Arena<ContactKey, Contact>,
    pair_index: HashMap<(FixtureProxyKey, FixtureProxyKey), ContactKey>,
}

fn pair_key(a: FixtureProxyKey, b: FixtureProxyKey) -> (FixtureProxyKey, FixtureProxyKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A joint without `collide_connected` between the two bodies suppresses their contacts.
fn joint_allows(body_a: &RigidBody, body_b: BodyId, joints: &Arena<JointId, Joint>) -> bool {
    body_a.joints.iter().all(|&id| {
        joints
            .get(id)
            .map_or(true, |joint| joint.other_body(body_a.id) != body_b || joint.collide_connected)
    })
}

impl ContactManager {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            broad_phase: BroadPhase::new(config.aabb_margin, config.aabb_multiplier),
            contacts: Arena::new(),
            pair_index: HashMap::new(),
        }
    }

    pub fn broad_phase(&self) -> &BroadPhase<FixtureProxyKey> {
        &self.broad_phase
    }

    pub fn contacts(&self) -> &Arena<ContactKey, Contact> {
        &self.contacts
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Turns new broad-phase pairs into contacts.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<BodyId, RigidBody>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        filter: &dyn ContactFilter,
        config: &SimulationConfig,
    ) {
        let mut pairs = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));
        for (a, b) in pairs {
            self.add_pair(a, b, bodies, fixtures, joints, filter, config);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_pair(
        &mut self,
        proxy_a: FixtureProxyKey,
        proxy_b: FixtureProxyKey,
        bodies: &mut Arena<BodyId, RigidBody>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        filter: &dyn ContactFilter,
        config: &SimulationConfig,
    ) {
        if proxy_a.fixture == proxy_b.fixture || self.pair_index.contains_key(&pair_key(proxy_a, proxy_b)) {
            return;
        }
        let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(proxy_a.fixture), fixtures.get(proxy_b.fixture)) else {
            return;
        };
        if fixture_a.body == fixture_b.body {
            return;
        }
        let (Some(body_a), Some(body_b)) = (bodies.get(fixture_a.body), bodies.get(fixture_b.body)) else {
            return;
        };
        if !body_a.should_collide_type(body_b) || !joint_allows(body_b, body_a.id, joints) {
            return;
        }
        if !filter.should_collide((proxy_a.fixture, fixture_a), (proxy_b.fixture, fixture_b)) {
            return;
        }

        let Some((kind, swap)) = ContactKind::resolve(fixture_a.shape.shape_type(), fixture_b.shape.shape_type())
        else {
            return;
        };
        let contact = if swap {
            Contact::new(
                kind,
                proxy_b,
                fixture_b,
                proxy_a,
                fixture_a,
                config.friction_mixing,
                config.restitution_mixing,
            )
        } else {
            Contact::new(
                kind,
                proxy_a,
                fixture_a,
                proxy_b,
                fixture_b,
                config.friction_mixing,
                config.restitution_mixing,
            )
        };

        let (id_a, id_b) = (contact.body_a, contact.body_b);
        let key = self.contacts.insert(contact);
        self.pair_index.insert(pair_key(proxy_a, proxy_b), key);
        if let Some(body) = bodies.get_mut(id_a) {
            body.contacts.push(key);
        }
        if let Some(body) = bodies.get_mut(id_b) {
            body.contacts.push(key);
        }
        log::debug!("contact {key:?} created between {id_a:?} and {id_b:?} ({kind:?})");
    }

    /// Removes a contact, reporting `end_contact` if it was touching.
    pub(crate) fn destroy(
        &mut self,
        key: ContactKey,
        bodies: &mut Arena<BodyId, RigidBody>,
        listener: &mut dyn ContactListener,
    ) {
        let Some(contact) = self.contacts.remove(key) else {
            return;
        };
        self.pair_index.remove(&pair_key(contact.proxy_a, contact.proxy_b));
        for id in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(id) {
                body.contacts.retain(|&k| k != key);
            }
        }
        if contact.flags.touching {
            listener.end_contact(&contact);
        }
        log::debug!("contact {key:?} destroyed");
    }

    /// Destroys every contact attached to `body`, optionally only those of one fixture.
    pub(crate) fn destroy_for_body(
        &mut self,
        body: BodyId,
        fixture: Option<FixtureId>,
        bodies: &mut Arena<BodyId, RigidBody>,
        listener: &mut dyn ContactListener,
    ) {
        let keys: Vec<ContactKey> = bodies.get(body).map(|b| b.contacts.clone()).unwrap_or_default();
        for key in keys {
            let matches = self.contacts.get(key).is_some_and(|contact| {
                fixture.map_or(true, |id| contact.fixture_a() == id || contact.fixture_b() == id)
            });
            if matches {
                self.destroy(key, bodies, listener);
            }
        }
    }

    /// Refreshes one contact's manifold and raises its events.
    ///
    /// A touching transition wakes both bodies. `pre_solve` runs for touching, non-sensor contacts.
    pub(crate) fn update_contact(
        &mut self,
        key: ContactKey,
        bodies: &mut Arena<BodyId, RigidBody>,
        fixtures: &Arena<FixtureId, Fixture>,
        listener: &mut dyn ContactListener,
    ) -> Option<ContactUpdate> {
        let contact = self.contacts.get_mut(key)?;
        let fixture_a = fixtures.get(contact.fixture_a())?;
        let fixture_b = fixtures.get(contact.fixture_b())?;
        let xf_a = *bodies.get(contact.body_a)?.transform();
        let xf_b = *bodies.get(contact.body_b)?.transform();

        let update = contact.update(&fixture_a.shape, &xf_a, &fixture_b.shape, &xf_b);

        if update.touching != update.was_touching {
            for id in [contact.body_a, contact.body_b] {
                if let Some(body) = bodies.get_mut(id) {
                    body.set_awake(true);
                }
            }
        }
        if update.began() {
            listener.begin_contact(contact);
        }
        if update.ended() {
            listener.end_contact(contact);
        }
        if update.touching && !contact.sensor {
            listener.pre_solve(contact, &update.old_manifold);
        }
        Some(update)
    }

    /// Narrow phase over every contact.
    ///
    /// Contacts whose fat AABBs no longer overlap are destroyed here, so a contact outlives the
    /// separation of its proxies by exactly one step.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut Arena<BodyId, RigidBody>,
        fixtures: &Arena<FixtureId, Fixture>,
        joints: &Arena<JointId, Joint>,
        filter: &dyn ContactFilter,
        listener: &mut dyn ContactListener,
    ) {
        let keys: Vec<ContactKey> = self.contacts.ids().collect();
        for key in keys {
            let Some(contact) = self.contacts.get_mut(key) else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(contact.fixture_a()), fixtures.get(contact.fixture_b()))
            else {
                self.destroy(key, bodies, listener);
                continue;
            };
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a), bodies.get(contact.body_b)) else {
                self.destroy(key, bodies, listener);
                continue;
            };

            if contact.flags.filter {
                let allowed = body_a.should_collide_type(body_b)
                    && joint_allows(body_b, body_a.id, joints)
                    && filter.should_collide((contact.fixture_a(), fixture_a), (contact.fixture_b(), fixture_b));
                if !allowed {
                    self.destroy(key, bodies, listener);
                    continue;
                }
                contact.flags.filter = false;
            }

            let active_a = body_a.awake && !body_a.is_static();
            let active_b = body_b.awake && !body_b.is_static();
            if !active_a && !active_b {
                continue;
            }

            let proxy_a = fixture_a.proxies.get(contact.child_a()).map(|p| p.proxy_id);
            let proxy_b = fixture_b.proxies.get(contact.child_b()).map(|p| p.proxy_id);
            let overlap = match (proxy_a, proxy_b) {
                (Some(a), Some(b)) => self.broad_phase.test_overlap(a, b),
                _ => false,
            };
            if !overlap {
                self.destroy(key, bodies, listener);
                continue;
            }

            self.update_contact(key, bodies, fixtures, listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::shapes::Shape,
        core::{
            fixture::{Filter, FixtureDef},
            rigidbody::BodyDef,
        },
        world::listener::{DefaultContactFilter, NullListener},
    };
    use glam::Vec2;

    struct Rig {
        manager: ContactManager,
        bodies: Arena<BodyId, RigidBody>,
        fixtures: Arena<FixtureId, Fixture>,
        joints: Arena<JointId, Joint>,
        config: SimulationConfig,
    }

    impl Rig {
        fn new() -> Self {
            let config = SimulationConfig::default();
            Self {
                manager: ContactManager::new(&config),
                bodies: Arena::new(),
                fixtures: Arena::new(),
                joints: Arena::new(),
                config,
            }
        }

        fn add(&mut self, def: BodyDef, fixture: FixtureDef) -> (BodyId, FixtureId) {
            let body_id = self.bodies.insert_with(|id| RigidBody::new(id, &def));
            let fixture_id = self.fixtures.insert(Fixture::new(body_id, fixture, 1.0));
            let body = self.bodies.get_mut(body_id).expect("body");
            let fixture = self.fixtures.get_mut(fixture_id).expect("fixture");
            fixture.create_proxies(fixture_id, &mut self.manager.broad_phase, &body.transform);
            body.fixtures.push(fixture_id);
            (body_id, fixture_id)
        }

        fn find(&mut self) {
            self.manager.find_new_contacts(
                &mut self.bodies,
                &self.fixtures,
                &self.joints,
                &DefaultContactFilter,
                &self.config,
            );
        }

        fn collide(&mut self) {
            self.manager.collide(
                &mut self.bodies,
                &self.fixtures,
                &self.joints,
                &DefaultContactFilter,
                &mut NullListener,
            );
        }
    }

    #[test]
    fn overlapping_fixtures_form_one_contact() {
        let mut rig = Rig::new();
        let (ground, _) = rig.add(BodyDef::fixed(), FixtureDef::new(Shape::cuboid(5.0, 0.5)));
        let (ball, _) = rig.add(
            BodyDef::dynamic().with_position(Vec2::new(0.0, 0.9)),
            FixtureDef::new(Shape::circle(0.5)),
        );
        rig.find();
        rig.find();
        assert_eq!(rig.manager.contact_count(), 1);

        let (_, contact) = rig.manager.contacts().iter().next().expect("contact");
        // Polygon sorts before circle in the dispatch table.
        assert_eq!(contact.body_a(), ground);
        assert_eq!(contact.body_b(), ball);

        rig.collide();
        let (_, contact) = rig.manager.contacts().iter().next().expect("contact");
        assert!(contact.is_touching());
        assert_eq!(rig.bodies.get(ball).expect("ball").contacts().len(), 1);
    }

    #[test]
    fn static_pairs_and_filtered_pairs_are_skipped() {
        let mut rig = Rig::new();
        rig.add(BodyDef::fixed(), FixtureDef::new(Shape::circle(1.0)));
        rig.add(BodyDef::fixed(), FixtureDef::new(Shape::circle(1.0)));
        let hidden = Filter {
            category_bits: 0x0002,
            mask_bits: 0x0001,
            group_index: 0,
        };
        rig.add(BodyDef::dynamic(), FixtureDef::new(Shape::circle(1.0)).with_filter(hidden));
        rig.add(
            BodyDef::dynamic(),
            FixtureDef::new(Shape::circle(1.0)).with_filter(Filter {
                category_bits: 0x0004,
                mask_bits: 0x0004,
                group_index: 0,
            }),
        );
        rig.find();
        // Only the hidden body against the two static circles passes every rule.
        assert_eq!(rig.manager.contact_count(), 2);
    }

    #[test]
    fn separated_proxies_destroy_the_contact() {
        let mut rig = Rig::new();
        rig.add(BodyDef::fixed(), FixtureDef::new(Shape::circle(0.5)));
        let (ball, fixture) = rig.add(
            BodyDef::dynamic().with_position(Vec2::new(0.9, 0.0)),
            FixtureDef::new(Shape::circle(0.5)),
        );
        rig.find();
        assert_eq!(rig.manager.contact_count(), 1);

        let far = Vec2::new(10.0, 0.0);
        let body = rig.bodies.get_mut(ball).expect("ball");
        body.set_transform(far, 0.0);
        let xf = *body.transform();
        rig.fixtures
            .get_mut(fixture)
            .expect("fixture")
            .synchronize(&mut rig.manager.broad_phase, &xf, &xf);

        rig.collide();
        assert_eq!(rig.manager.contact_count(), 0);
        assert!(rig.bodies.get(ball).expect("ball").contacts().is_empty());
    }
}
