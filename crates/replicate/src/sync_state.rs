use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Values the authoritative side last transmitted for a body.
///
/// `None` means the field was never sent by this peer. Only the local
/// authority advances these; they are re-synced from the replicated values
/// when authority is gained.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientSyncState {
    pub velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub is_kinematic: Option<bool>,
    pub use_gravity: Option<bool>,
    pub drag: Option<f32>,
    pub angular_drag: Option<f32>,
}
