use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{BodyId, PeerId};

/// The six replicated rigidbody properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldId {
    Velocity,
    AngularVelocity,
    Kinematic,
    Gravity,
    Drag,
    AngularDrag,
}

impl FieldId {
    pub const ALL: [FieldId; 6] = [
        FieldId::Velocity,
        FieldId::AngularVelocity,
        FieldId::Kinematic,
        FieldId::Gravity,
        FieldId::Drag,
        FieldId::AngularDrag,
    ];

    /// Delivery class the field is always sent with.
    pub fn delivery(self) -> DeliveryClass {
        match self {
            FieldId::Velocity | FieldId::AngularVelocity => DeliveryClass::Unreliable,
            _ => DeliveryClass::Reliable,
        }
    }
}

/// How the transport must carry a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryClass {
    /// Never lost, applied in send order.
    Reliable,
    /// May be dropped or reordered; receivers keep only the newest.
    Unreliable,
}

/// A typed field value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Vector(Vec3),
    Flag(bool),
    Scalar(f32),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Vector(_) => "vector",
            Payload::Flag(_) => "flag",
            Payload::Scalar(_) => "scalar",
        }
    }
}

/// One field's new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: FieldId,
    pub payload: Payload,
}

/// A replication message for a single body.
///
/// `sequence` is stamped by the sending peer and increases monotonically per
/// body; the server re-stamps when relaying. `origin` is the peer whose write
/// produced the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub body: BodyId,
    pub sequence: u64,
    pub origin: PeerId,
    pub delivery: DeliveryClass,
    pub updates: Vec<FieldUpdate>,
}

impl Envelope {
    pub fn touches(&self, field: FieldId) -> bool {
        self.updates.iter().any(|u| u.field == field)
    }
}
