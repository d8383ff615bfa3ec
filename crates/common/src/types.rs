use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a replicated body in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub Uuid);

impl BodyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a session participant as assigned by the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// The local participant's place in the session.
///
/// Passed explicitly into every replication entry point instead of being
/// queried from a global. Whether the peer *owns* a body is derived from the
/// body's owner, not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRole {
    pub peer: PeerId,
    pub is_server: bool,
}

impl PeerRole {
    pub fn server(peer: PeerId) -> Self {
        Self {
            peer,
            is_server: true,
        }
    }

    pub fn client(peer: PeerId) -> Self {
        Self {
            peer,
            is_server: false,
        }
    }

    /// True if this peer is the given owner.
    pub fn owns(&self, owner: Option<PeerId>) -> bool {
        owner == Some(self.peer)
    }
}

/// Which peer may originate writes for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityMode {
    /// The owning peer writes; the server writes only while nobody owns the body.
    #[default]
    Owner,
    /// The server always writes; owners never do.
    Server,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_id_uniqueness() {
        let a = BodyId::new();
        let b = BodyId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn role_ownership() {
        let role = PeerRole::client(PeerId(3));
        assert!(role.owns(Some(PeerId(3))));
        assert!(!role.owns(Some(PeerId(4))));
        assert!(!role.owns(None));
    }

    #[test]
    fn authority_mode_defaults_to_owner() {
        assert_eq!(AuthorityMode::default(), AuthorityMode::Owner);
    }
}
