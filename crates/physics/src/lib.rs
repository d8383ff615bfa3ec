//! Physics seam for replication.
//!
//! # Invariants
//! - A body bound for replication is kinematic unless the local peer is
//!   authoritative for it.
//! - Replication touches the engine only through [`RigidbodyState`].

pub mod binding;
pub mod body;

pub use binding::{ApplyTarget, PhysicsBinding};
pub use body::{GRAVITY, RigidbodyState, SimBody};
