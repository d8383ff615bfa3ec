use rigsync_common::{BodyId, FieldId, PeerId};

/// Reasons an inbound replication message is rejected.
///
/// A rejected message leaves the body untouched; hosts log and drop it.
#[derive(Debug, thiserror::Error)]
pub enum ReplicateError {
    #[error("envelope for body {received:?} delivered to body {expected:?}")]
    WrongBody { expected: BodyId, received: BodyId },
    #[error("{kind} payload does not match field {field:?}")]
    PayloadMismatch { field: FieldId, kind: &'static str },
    #[error("{sender} is not authoritative for body {body:?}")]
    NotAuthoritative { sender: PeerId, body: BodyId },
}

/// Errors from validating a [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} sensitivity must be finite and non-negative, got {value}")]
    InvalidSensitivity { field: &'static str, value: f32 },
}
