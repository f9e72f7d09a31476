//! User hooks invoked while a step runs.
//!
//! The world is exclusively borrowed during the step, so hooks only see the contact they are
//! called for. Structural changes go through [`super::commands::CommandQueue`].

use crate::{
    collision::{
        contact::{Contact, ContactImpulse},
        manifold::Manifold,
    },
    core::fixture::Fixture,
    utils::allocator::FixtureId,
};

/// Receives contact events. Every method has an empty default.
pub trait ContactListener: Send {
    /// Two fixtures started touching this step.
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Two fixtures stopped touching, or a touching contact was destroyed.
    fn end_contact(&mut self, _contact: &Contact) {}

    /// Called after the manifold update and before solving. Disable the contact to skip it for
    /// this step. `old_manifold` is the manifold from the previous step.
    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    /// Impulses the solver applied to a touching contact.
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Decides whether two fixtures may form a contact.
pub trait ContactFilter: Send + Sync {
    fn should_collide(&self, fixture_a: (FixtureId, &Fixture), fixture_b: (FixtureId, &Fixture)) -> bool {
        fixture_a.1.filter().should_collide(fixture_b.1.filter())
    }
}

/// Group, category and mask rule from each fixture's [`crate::core::fixture::Filter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl ContactListener for NullListener {}
