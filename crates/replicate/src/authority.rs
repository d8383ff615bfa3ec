//! Who may originate writes for a body.

use rigsync_common::{AuthorityMode, PeerId, PeerRole};

/// Pure authority rule.
///
/// - `Owner`: the owning peer; the server only while nobody owns the body.
/// - `Server`: the server, always; owning clients never.
pub fn is_authoritative(mode: AuthorityMode, role: &PeerRole, owner: Option<PeerId>) -> bool {
    match mode {
        AuthorityMode::Owner => match owner {
            Some(_) => role.owns(owner),
            None => role.is_server,
        },
        AuthorityMode::Server => role.is_server,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityTransition {
    Gained,
    Lost,
    Unchanged,
}

/// Authority state of one body as seen by the local peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    mode: AuthorityMode,
    owner: Option<PeerId>,
    authoritative: bool,
}

impl Authority {
    pub fn new(mode: AuthorityMode, owner: Option<PeerId>) -> Self {
        Self {
            mode,
            owner,
            authoritative: false,
        }
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn owner(&self) -> Option<PeerId> {
        self.owner
    }

    /// Last resolved answer for the local peer.
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// Re-evaluate for `role` and report how the local answer moved.
    pub fn resolve(&mut self, role: &PeerRole) -> AuthorityTransition {
        let now = is_authoritative(self.mode, role, self.owner);
        let transition = match (self.authoritative, now) {
            (false, true) => AuthorityTransition::Gained,
            (true, false) => AuthorityTransition::Lost,
            _ => AuthorityTransition::Unchanged,
        };
        self.authoritative = now;
        transition
    }

    /// Record a new owner and re-evaluate.
    pub fn transfer(&mut self, owner: Option<PeerId>, role: &PeerRole) -> AuthorityTransition {
        self.owner = owner;
        self.resolve(role)
    }

    /// Whether a remote client `peer` may write this body.
    pub fn permits_client(&self, peer: PeerId) -> bool {
        is_authoritative(self.mode, &PeerRole::client(peer), self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: PeerId = PeerId(0);
    const ALICE: PeerId = PeerId(1);
    const BOB: PeerId = PeerId(2);

    #[test]
    fn owner_mode_owner_is_authoritative() {
        let owner = Some(ALICE);
        assert!(is_authoritative(AuthorityMode::Owner, &PeerRole::client(ALICE), owner));
        assert!(!is_authoritative(AuthorityMode::Owner, &PeerRole::client(BOB), owner));
        assert!(!is_authoritative(AuthorityMode::Owner, &PeerRole::server(SERVER), owner));
    }

    #[test]
    fn owner_mode_unowned_falls_back_to_server() {
        assert!(is_authoritative(AuthorityMode::Owner, &PeerRole::server(SERVER), None));
        assert!(!is_authoritative(AuthorityMode::Owner, &PeerRole::client(ALICE), None));
    }

    #[test]
    fn owner_mode_host_owning_its_body() {
        assert!(is_authoritative(
            AuthorityMode::Owner,
            &PeerRole::server(SERVER),
            Some(SERVER)
        ));
    }

    #[test]
    fn server_mode_ignores_ownership() {
        for owner in [None, Some(ALICE)] {
            assert!(is_authoritative(AuthorityMode::Server, &PeerRole::server(SERVER), owner));
            assert!(!is_authoritative(AuthorityMode::Server, &PeerRole::client(ALICE), owner));
        }
    }

    #[test]
    fn transitions() {
        let role = PeerRole::client(ALICE);
        let mut authority = Authority::new(AuthorityMode::Owner, None);
        assert_eq!(authority.resolve(&role), AuthorityTransition::Unchanged);
        assert_eq!(authority.transfer(Some(ALICE), &role), AuthorityTransition::Gained);
        assert!(authority.is_authoritative());
        assert_eq!(authority.transfer(Some(ALICE), &role), AuthorityTransition::Unchanged);
        assert_eq!(authority.transfer(Some(BOB), &role), AuthorityTransition::Lost);
        assert!(!authority.is_authoritative());
        assert_eq!(authority.owner(), Some(BOB));
    }

    #[test]
    fn server_checks_client_writers() {
        let owned = Authority::new(AuthorityMode::Owner, Some(ALICE));
        assert!(owned.permits_client(ALICE));
        assert!(!owned.permits_client(BOB));

        let server_mode = Authority::new(AuthorityMode::Server, Some(ALICE));
        assert!(!server_mode.permits_client(ALICE));
    }
}
