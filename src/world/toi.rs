//! Continuous collision pass run after the regular island solve.
//!
//! Repeatedly picks the earliest time of impact among contacts that involve a bullet or a
//! non-dynamic body, rewinds the pair to that time, and solves a small island over the rest of the
//! step so fast bodies cannot tunnel.

use std::collections::HashSet;

use super::PhysicsWorld;
use crate::{
    collision::ccd::{default_toi_target, time_of_impact, ToiInput, ToiState},
    core::{rigidbody::BodyType, types::Sweep},
    dynamics::{
        island::{solve_toi_island, Island, IslandContext},
        solver::TimeStep,
    },
    utils::allocator::{BodyId, ContactKey},
};

/// Position iterations of the TOI mini solve.
const TOI_POSITION_ITERATIONS: u32 = 20;

impl PhysicsWorld {
    pub(super) fn solve_toi(&mut self, step: &TimeStep) {
        for body in self.bodies.values_mut() {
            body.sweep.alpha0 = 0.0;
        }
        for contact in self.contact_manager.contacts.values_mut() {
            contact.flags.toi = false;
            contact.toi_count = 0;
            contact.toi = 1.0;
        }

        loop {
            let Some((min_key, min_alpha)) = self.find_min_toi() else {
                break;
            };
            if min_alpha >= 1.0 - 10.0 * f32::EPSILON {
                break;
            }
            self.profile.toi_events += 1;

            let Some(contact) = self.contact_manager.contacts.get(min_key) else {
                break;
            };
            let (id_a, id_b) = (contact.body_a, contact.body_b);
            let Some((backup_a, backup_b)) = self.sweeps(id_a, id_b) else {
                break;
            };
            self.advance_body(id_a, min_alpha);
            self.advance_body(id_b, min_alpha);

            // The impact contact most likely has new points.
            self.contact_manager
                .update_contact(min_key, &mut self.bodies, &self.fixtures, self.listener.as_mut());
            let Some(contact) = self.contact_manager.contacts.get_mut(min_key) else {
                break;
            };
            contact.flags.toi = false;
            contact.toi_count += 1;

            if !contact.flags.enabled || !contact.flags.touching {
                // Restore the sweeps; this contact is skipped for the rest of the step.
                contact.set_enabled(false);
                self.restore_sweep(id_a, backup_a);
                self.restore_sweep(id_b, backup_b);
                continue;
            }

            for id in [id_a, id_b] {
                if let Some(body) = self.bodies.get_mut(id) {
                    body.set_awake(true);
                }
            }

            let island = self.gather_toi_island(min_key, id_a, id_b, min_alpha);

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };

            let outcome = {
                let ctx = IslandContext {
                    bodies: &self.bodies,
                    fixtures: &self.fixtures,
                    contacts: &self.contact_manager.contacts,
                    joints: &self.joints,
                    config: &self.config,
                    step: sub_step,
                    gravity: self.gravity,
                };
                solve_toi_island(&ctx, &island, id_a, id_b)
            };

            for result in &outcome.bodies {
                if let Some(body) = self.bodies.get_mut(result.id) {
                    body.sweep = result.sweep;
                    body.velocity = result.velocity;
                    body.synchronize_transform();
                }
            }
            for (key, impulse) in &outcome.impulses {
                if let Some(contact) = self.contact_manager.contacts.get(*key) {
                    self.listener.post_solve(contact, impulse);
                }
            }

            // Moved bodies need fresh proxies and fresh TOIs.
            for &id in &island.bodies {
                let Some(body) = self.bodies.get(id) else {
                    continue;
                };
                if body.body_type != BodyType::Dynamic {
                    continue;
                }
                let contacts = body.contacts.clone();
                self.synchronize_fixtures(id);
                for key in contacts {
                    if let Some(contact) = self.contact_manager.contacts.get_mut(key) {
                        contact.flags.toi = false;
                    }
                }
            }
            self.find_new_contacts();

            if self.config.sub_stepping {
                break;
            }
        }
    }

    /// Earliest impact among eligible contacts, computing and caching TOIs as needed.
    fn find_min_toi(&mut self) -> Option<(ContactKey, f32)> {
        let linear_slop = self.config.linear_slop;
        let mut best: Option<(ContactKey, f32)> = None;
        let keys: Vec<ContactKey> = self.contact_manager.contacts.ids().collect();

        for key in keys {
            let Some(contact) = self.contact_manager.contacts.get(key) else {
                continue;
            };
            if !contact.flags.enabled || contact.toi_count > self.config.max_sub_steps {
                continue;
            }

            let alpha = if contact.flags.toi {
                contact.toi
            } else {
                if contact.sensor {
                    continue;
                }
                let (id_a, id_b) = (contact.body_a, contact.body_b);
                let (proxy_key_a, proxy_key_b) = (contact.proxy_a, contact.proxy_b);
                let (Some(body_a), Some(body_b)) = (self.bodies.get(id_a), self.bodies.get(id_b)) else {
                    continue;
                };

                let active_a = body_a.awake && body_a.body_type != BodyType::Static;
                let active_b = body_b.awake && body_b.body_type != BodyType::Static;
                if !active_a && !active_b {
                    continue;
                }
                let bullet_a = body_a.bullet || body_a.body_type != BodyType::Dynamic;
                let bullet_b = body_b.bullet || body_b.body_type != BodyType::Dynamic;
                if !bullet_a && !bullet_b {
                    continue;
                }

                // Put both sweeps on the same start time.
                let alpha0 = body_a.sweep.alpha0.max(body_b.sweep.alpha0);
                let Some((body_a, body_b)) = self.bodies.get2_mut(id_a, id_b) else {
                    continue;
                };
                if body_a.sweep.alpha0 < alpha0 {
                    body_a.sweep.advance(alpha0);
                } else if body_b.sweep.alpha0 < alpha0 {
                    body_b.sweep.advance(alpha0);
                }
                let (sweep_a, sweep_b) = (body_a.sweep, body_b.sweep);

                let (Some(fixture_a), Some(fixture_b)) =
                    (self.fixtures.get(proxy_key_a.fixture), self.fixtures.get(proxy_key_b.fixture))
                else {
                    continue;
                };
                let input = ToiInput {
                    proxy_a: fixture_a.shape.distance_proxy(proxy_key_a.child),
                    proxy_b: fixture_b.shape.distance_proxy(proxy_key_b.child),
                    sweep_a,
                    sweep_b,
                    t_max: 1.0,
                };
                let target = default_toi_target(input.proxy_a.radius() + input.proxy_b.radius(), linear_slop);
                let output = time_of_impact(&input, target, 0.25 * linear_slop, self.config.toi_max_iterations);

                let alpha = if output.state == ToiState::Touching {
                    (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                } else {
                    1.0
                };
                if let Some(contact) = self.contact_manager.contacts.get_mut(key) {
                    contact.toi = alpha;
                    contact.flags.toi = true;
                }
                alpha
            };

            if best.map_or(true, |(_, min)| alpha < min) {
                best = Some((key, alpha));
            }
        }
        best
    }

    /// Impact pair plus touching neighbors that are static, kinematic or bullets.
    fn gather_toi_island(&mut self, key: ContactKey, id_a: BodyId, id_b: BodyId, alpha: f32) -> Island {
        let max_contacts = self.config.max_toi_contacts;
        let mut island = Island {
            bodies: vec![id_a, id_b],
            contacts: vec![key],
            joints: Vec::new(),
        };
        let mut visited_bodies: HashSet<BodyId> = [id_a, id_b].into_iter().collect();
        let mut visited_contacts: HashSet<ContactKey> = [key].into_iter().collect();

        for id in [id_a, id_b] {
            let Some(body) = self.bodies.get(id) else {
                continue;
            };
            if body.body_type != BodyType::Dynamic {
                continue;
            }
            let bullet = body.bullet;
            let contacts = body.contacts.clone();

            for other_key in contacts {
                if island.contacts.len() >= max_contacts {
                    break;
                }
                if visited_contacts.contains(&other_key) {
                    continue;
                }
                let Some(contact) = self.contact_manager.contacts.get(other_key) else {
                    continue;
                };
                if contact.sensor {
                    continue;
                }
                let other = contact.other_body(id);
                let Some(other_body) = self.bodies.get(other) else {
                    continue;
                };
                if other_body.body_type == BodyType::Dynamic && !bullet && !other_body.bullet {
                    continue;
                }

                // Tentatively move the neighbor to the impact time.
                let backup = other_body.sweep;
                if !visited_bodies.contains(&other) {
                    self.advance_body(other, alpha);
                }

                self.contact_manager.update_contact(
                    other_key,
                    &mut self.bodies,
                    &self.fixtures,
                    self.listener.as_mut(),
                );
                let usable = self
                    .contact_manager
                    .contacts
                    .get(other_key)
                    .is_some_and(|c| c.flags.enabled && c.flags.touching);
                if !usable {
                    self.restore_sweep(other, backup);
                    continue;
                }

                visited_contacts.insert(other_key);
                island.contacts.push(other_key);

                if visited_bodies.insert(other) {
                    if let Some(body) = self.bodies.get_mut(other) {
                        if body.body_type != BodyType::Static {
                            body.set_awake(true);
                        }
                    }
                    island.bodies.push(other);
                }
            }
        }
        island
    }

    fn sweeps(&self, id_a: BodyId, id_b: BodyId) -> Option<(Sweep, Sweep)> {
        Some((self.bodies.get(id_a)?.sweep, self.bodies.get(id_b)?.sweep))
    }

    fn advance_body(&mut self, id: BodyId, alpha: f32) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.advance(alpha);
        }
    }

    fn restore_sweep(&mut self, id: BodyId, sweep: Sweep) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.sweep = sweep;
            body.synchronize_transform();
        }
    }
}
