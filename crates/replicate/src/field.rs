//! The synchronized-value primitive shared by all six rigidbody properties.

use glam::Vec3;
use rigsync_common::{DeliveryClass, FieldId, FieldUpdate, Payload};
use rigsync_physics::ApplyTarget;

use crate::change::ChangeDetect;
use crate::transport::Outbound;

/// A value type that can travel in a [`Payload`].
pub trait FieldValue: ChangeDetect + std::fmt::Debug {
    fn into_payload(self) -> Payload;
    fn from_payload(payload: Payload) -> Option<Self>;
}

impl FieldValue for Vec3 {
    fn into_payload(self) -> Payload {
        Payload::Vector(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    fn into_payload(self) -> Payload {
        Payload::Flag(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Flag(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for f32 {
    fn into_payload(self) -> Payload {
        Payload::Scalar(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// Hook that pushes an accepted value into the physics binding.
pub type ApplyFn<T> = fn(&mut dyn ApplyTarget, T);

/// A replicated value with a local cache and last-write-wins acceptance.
///
/// The authority writes through [`write`](Self::write) or
/// [`stage`](Self::stage); everyone else learns values through
/// [`on_remote_write`](Self::on_remote_write). Both paths run the apply hook.
#[derive(Debug, Clone)]
pub struct ReplicatedField<T> {
    id: FieldId,
    value: T,
    last_sent: Option<T>,
    sensitivity: f32,
    delivery: DeliveryClass,
    last_sequence: Option<u64>,
    apply: ApplyFn<T>,
}

impl<T: FieldValue> ReplicatedField<T> {
    pub fn new(id: FieldId, initial: T, apply: ApplyFn<T>) -> Self {
        Self {
            id,
            value: initial,
            last_sent: None,
            sensitivity: 0.0,
            delivery: id.delivery(),
            last_sequence: None,
            apply,
        }
    }

    /// Change threshold used by [`differs_from_sent`](Self::differs_from_sent).
    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Currently accepted value.
    pub fn value(&self) -> T {
        self.value
    }

    /// Last value this peer transmitted, if any.
    pub fn last_sent(&self) -> Option<T> {
        self.last_sent
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn delivery(&self) -> DeliveryClass {
        self.delivery
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// True if `current` has moved far enough from the last sent value.
    /// A field that never sent anything always differs.
    pub fn differs_from_sent(&self, current: T) -> bool {
        match self.last_sent {
            Some(previous) => T::has_changed(previous, current, self.sensitivity),
            None => true,
        }
    }

    /// Apply locally, record as sent, and return the update without sending.
    pub fn stage(&mut self, value: T, target: &mut dyn ApplyTarget) -> FieldUpdate {
        self.accept(value, target);
        self.last_sent = Some(value);
        FieldUpdate {
            field: self.id,
            payload: value.into_payload(),
        }
    }

    /// Apply locally and forward on this field's own delivery class.
    ///
    /// Returns false without sending when `value` equals the last sent value.
    pub fn write(&mut self, value: T, target: &mut dyn ApplyTarget, out: &mut Outbound<'_>) -> bool {
        if self.last_sent == Some(value) {
            tracing::trace!(field = ?self.id, ?value, "write suppressed");
            return false;
        }
        let update = self.stage(value, target);
        out.forward(self.delivery, vec![update]);
        true
    }

    /// Accept a value from the network unless it is older than the last one.
    pub fn on_remote_write(&mut self, value: T, sequence: u64, target: &mut dyn ApplyTarget) -> bool {
        if let Some(last) = self.last_sequence {
            if sequence <= last {
                tracing::debug!(field = ?self.id, sequence, last, "stale update ignored");
                return false;
            }
        }
        self.last_sequence = Some(sequence);
        self.accept(value, target);
        true
    }

    /// Same as [`on_remote_write`](Self::on_remote_write) for an untyped payload.
    /// `None` means the payload kind does not fit this field.
    pub fn on_remote_payload(
        &mut self,
        payload: Payload,
        sequence: u64,
        target: &mut dyn ApplyTarget,
    ) -> Option<bool> {
        let value = T::from_payload(payload)?;
        Some(self.on_remote_write(value, sequence, target))
    }

    /// Treat the currently accepted value as already sent.
    pub fn resync_sent(&mut self) {
        self.last_sent = Some(self.value);
    }

    /// Accept the next inbound sequence whatever its number.
    pub fn forget_sequence(&mut self) {
        self.last_sequence = None;
    }

    fn accept(&mut self, value: T, target: &mut dyn ApplyTarget) {
        self.value = value;
        (self.apply)(target, value);
    }
}
