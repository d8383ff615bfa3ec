//! Shared types for rigidbody replication: identifiers, session roles and the
//! message shapes exchanged between peers.

pub mod message;
pub mod types;

pub use message::{DeliveryClass, Envelope, FieldId, FieldUpdate, Payload};
pub use types::{AuthorityMode, BodyId, PeerId, PeerRole};
