use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::utils::allocator::{BodyId, FixtureId, JointId};

/// A world mutation deferred until the current step finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorldCommand {
    DestroyBody(BodyId),
    DestroyFixture(FixtureId),
    DestroyJoint(JointId),
    SetAwake(BodyId, bool),
    SetEnabled(BodyId, bool),
    SetTransform { body: BodyId, position: Vec2, angle: f32 },
    SetLinearVelocity(BodyId, Vec2),
    ApplyLinearImpulse { body: BodyId, impulse: Vec2, point: Vec2 },
}

/// Cloneable handle used by listeners to queue world changes.
///
/// Every clone pushes into the same queue; the world drains it in push order after each step.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<Vec<WorldCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: WorldCommand) {
        self.inner.lock().push(command);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<WorldCommand> {
        std::mem::take(&mut *self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_queue() {
        let queue = CommandQueue::new();
        let handle = queue.clone();
        handle.push(WorldCommand::SetAwake(BodyId::default(), true));
        queue.push(WorldCommand::DestroyJoint(JointId::default()));
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0], WorldCommand::SetAwake(BodyId::default(), true));
        assert!(handle.is_empty());
    }
}
