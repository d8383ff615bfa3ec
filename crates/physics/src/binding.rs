use glam::Vec3;

use crate::body::RigidbodyState;

/// Sink for resolved replicated values.
///
/// Replicated fields call into this after accepting a value, whether it was
/// written locally or received from a peer.
pub trait ApplyTarget {
    fn apply_velocity(&mut self, velocity: Vec3);
    fn apply_angular_velocity(&mut self, angular_velocity: Vec3);
    fn apply_kinematic_intent(&mut self, intent: bool);
    fn apply_gravity(&mut self, use_gravity: bool);
    fn apply_drag(&mut self, drag: f32);
    fn apply_angular_drag(&mut self, angular_drag: f32);
}

/// Couples a simulated body to replication.
///
/// The body's raw kinematic flag is never set from the intent directly: the
/// effective flag is always `intent || !authoritative`, so only the authority
/// simulates the body's motion.
#[derive(Debug, Clone)]
pub struct PhysicsBinding<B> {
    body: B,
    kinematic_intent: bool,
    authoritative: bool,
}

impl<B: RigidbodyState> PhysicsBinding<B> {
    /// Wrap a body. Its current kinematic flag becomes the kinematic intent.
    ///
    /// The binding starts non-authoritative but does not touch the body until
    /// authority is first set.
    pub fn new(body: B) -> Self {
        let kinematic_intent = body.is_kinematic();
        Self {
            body,
            kinematic_intent,
            authoritative: false,
        }
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn into_body(self) -> B {
        self.body
    }

    pub fn kinematic_intent(&self) -> bool {
        self.kinematic_intent
    }

    /// Change the locally desired kinematic mode (game code on the authority).
    pub fn set_kinematic_intent(&mut self, intent: bool) {
        self.kinematic_intent = intent;
        self.enforce_kinematic();
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    pub fn set_authoritative(&mut self, authoritative: bool) {
        self.authoritative = authoritative;
        self.enforce_kinematic();
    }

    /// The kinematic flag the body must carry right now.
    pub fn effective_kinematic(&self) -> bool {
        self.kinematic_intent || !self.authoritative
    }

    pub fn enforce_kinematic(&mut self) {
        let kinematic = self.effective_kinematic();
        if self.body.is_kinematic() != kinematic {
            tracing::trace!(
                kinematic,
                intent = self.kinematic_intent,
                authoritative = self.authoritative,
                "kinematic flag changed"
            );
        }
        self.body.set_kinematic(kinematic);
    }
}

impl<B: RigidbodyState> ApplyTarget for PhysicsBinding<B> {
    fn apply_velocity(&mut self, velocity: Vec3) {
        self.body.set_velocity(velocity);
    }

    fn apply_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.body.set_angular_velocity(angular_velocity);
    }

    fn apply_kinematic_intent(&mut self, intent: bool) {
        self.set_kinematic_intent(intent);
    }

    fn apply_gravity(&mut self, use_gravity: bool) {
        self.body.set_use_gravity(use_gravity);
    }

    fn apply_drag(&mut self, drag: f32) {
        self.body.set_drag(drag);
    }

    fn apply_angular_drag(&mut self, angular_drag: f32) {
        self.body.set_angular_drag(angular_drag);
    }
}
