//! In-process network host for rigidbody replication.
//!
//! [`LoopbackNetwork`] stands in for a real transport: it CBOR-encodes every
//! envelope, keeps the latest broadcast value per (body, field) for late
//! joiners, and can drop or swap unreliable packets. [`Session`] hosts a
//! server plus clients on top of it and drives the network tick and the
//! physics step for every body on every peer.

pub mod codec;
pub mod loopback;
pub mod session;

pub use codec::CodecError;
pub use loopback::{Link, LoopbackNetwork, NetConfig, NetStats};
pub use session::{Peer, Session, SessionError, SessionStats};
