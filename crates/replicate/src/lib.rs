//! Authority-gated rigidbody replication.
//!
//! Each peer holds a [`NetworkRigidbody`] per replicated body. The one peer
//! that is authoritative samples its physics every network tick and sends what
//! changed; the server relays client writes to every observer; observers apply
//! what they receive and stay kinematic.
//!
//! # Invariants
//! - At most one authoritative writer per body; every other copy is kinematic.
//! - Per field, inbound values are last-write-wins by sequence number.
//! - The last-sent cache is only advanced by the authoritative peer.
//! - Velocity and angular velocity travel unreliably; settings travel reliably.

pub mod authority;
pub mod body;
pub mod change;
pub mod config;
pub mod driver;
pub mod error;
pub mod field;
pub mod sync_state;
pub mod transport;

pub use authority::{Authority, AuthorityTransition, is_authoritative};
pub use body::{NetworkRigidbody, ReplicatedFields};
pub use change::{ChangeDetect, MotionSend, has_changed};
pub use config::{SyncConfig, VectorSyncConfig};
pub use driver::{PhysicsSample, TickReport};
pub use error::{ConfigError, ReplicateError};
pub use field::{FieldValue, ReplicatedField};
pub use sync_state::ClientSyncState;
pub use transport::{Outbound, RecordingTransport, Transport};
