use std::collections::BTreeMap;

use rigsync_common::{BodyId, PeerId, PeerRole};
use rigsync_physics::{RigidbodyState, SimBody};
use rigsync_replicate::{ConfigError, NetworkRigidbody, SyncConfig};
use serde::Serialize;

use crate::loopback::{LoopbackNetwork, NetConfig};

/// Upper bound on delivery rounds per pump; a client write needs two
/// (client to server, server to observers).
const MAX_PUMP_ROUNDS: usize = 8;

/// Errors from session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("{0} already joined")]
    DuplicatePeer(PeerId),
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
    #[error("invalid sync config: {0}")]
    Config(#[from] ConfigError),
}

/// One participant and its local copies of every spawned body.
#[derive(Debug)]
pub struct Peer {
    role: PeerRole,
    bodies: BTreeMap<BodyId, NetworkRigidbody<SimBody>>,
}

impl Peer {
    pub fn role(&self) -> &PeerRole {
        &self.role
    }

    pub fn body(&self, id: BodyId) -> Option<&NetworkRigidbody<SimBody>> {
        self.bodies.get(&id)
    }

    pub fn bodies(&self) -> &BTreeMap<BodyId, NetworkRigidbody<SimBody>> {
        &self.bodies
    }
}

/// What the server knows about a spawned body, used to instantiate it on
/// peers that join later.
#[derive(Debug, Clone)]
struct SpawnRecord {
    config: SyncConfig,
    prefab: SimBody,
    owner: Option<PeerId>,
}

/// Running counters across the session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub network_ticks: u64,
    pub physics_steps: u64,
    pub envelopes_sent: u64,
    pub updates_applied: u64,
    pub rejected: u64,
}

/// Hosts a server and its clients over a [`LoopbackNetwork`] and drives both
/// clocks for every body on every peer.
#[derive(Debug)]
pub struct Session {
    network: LoopbackNetwork,
    peers: BTreeMap<PeerId, Peer>,
    spawned: BTreeMap<BodyId, SpawnRecord>,
    stats: SessionStats,
}

impl Session {
    pub fn new(server: PeerId, config: NetConfig) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(
            server,
            Peer {
                role: PeerRole::server(server),
                bodies: BTreeMap::new(),
            },
        );
        Self {
            network: LoopbackNetwork::new(server, config),
            peers,
            spawned: BTreeMap::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn server(&self) -> PeerId {
        self.network.server()
    }

    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut LoopbackNetwork {
        &mut self.network
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn body_ids(&self) -> Vec<BodyId> {
        self.spawned.keys().copied().collect()
    }

    pub fn owner(&self, body: BodyId) -> Option<PeerId> {
        self.spawned.get(&body).and_then(|r| r.owner)
    }

    pub fn body(&self, peer: PeerId, body: BodyId) -> Option<&NetworkRigidbody<SimBody>> {
        self.peers.get(&peer)?.bodies.get(&body)
    }

    pub fn body_mut(&mut self, peer: PeerId, body: BodyId) -> Option<&mut NetworkRigidbody<SimBody>> {
        self.peers.get_mut(&peer)?.bodies.get_mut(&body)
    }

    /// The peer currently authoritative for `body`, if any copy claims it.
    pub fn authority_of(&self, body: BodyId) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|(_, p)| p.bodies.get(&body).is_some_and(|b| b.is_authoritative()))
            .map(|(id, _)| *id)
    }

    /// Largest distance between the authority's velocity and any other
    /// copy's velocity.
    pub fn velocity_divergence(&self, body: BodyId) -> Option<f32> {
        let authority = self.body(self.authority_of(body)?, body)?.body().velocity();
        self.peers
            .values()
            .filter_map(|p| p.bodies.get(&body))
            .filter(|b| !b.is_authoritative())
            .map(|b| b.body().velocity().distance(authority))
            .reduce(f32::max)
            .or(Some(0.0))
    }

    /// Connect a client. It instantiates every spawned body from its prefab,
    /// applies the buffered latest values, and only then starts the bodies.
    pub fn join(&mut self, peer: PeerId) -> Result<(), SessionError> {
        if self.peers.contains_key(&peer) {
            return Err(SessionError::DuplicatePeer(peer));
        }
        self.network.connect(peer);
        let role = PeerRole::client(peer);
        let mut bodies = BTreeMap::new();
        for (id, record) in &self.spawned {
            let body = NetworkRigidbody::new(*id, record.config, record.prefab.clone(), record.owner)?;
            bodies.insert(*id, body);
        }

        let mut hydrated = 0;
        for (from, envelope) in self.network.drain(peer) {
            let Some(body) = bodies.get_mut(&envelope.body) else {
                continue;
            };
            match body.receive(from, &envelope, &role, &mut self.network.link(peer)) {
                Ok(n) => hydrated += n,
                Err(e) => {
                    self.stats.rejected += 1;
                    tracing::warn!(%peer, %from, "rejected buffered envelope: {e}");
                }
            }
        }
        self.stats.updates_applied += hydrated as u64;

        for body in bodies.values_mut() {
            let sent = body.start(&role, &mut self.network.link(peer));
            self.stats.envelopes_sent += sent as u64;
        }
        self.peers.insert(peer, Peer { role, bodies });
        tracing::info!(%peer, bodies = self.spawned.len(), hydrated, "peer joined");
        Ok(())
    }

    /// Disconnect a client. Bodies it owned fall back to having no owner.
    pub fn leave(&mut self, peer: PeerId) -> Result<(), SessionError> {
        if peer == self.server() || !self.peers.contains_key(&peer) {
            return Err(SessionError::UnknownPeer(peer));
        }
        self.peers.remove(&peer);
        self.network.disconnect(peer);
        let orphaned: Vec<BodyId> = self
            .spawned
            .iter()
            .filter(|(_, r)| r.owner == Some(peer))
            .map(|(id, _)| *id)
            .collect();
        for body in orphaned {
            self.transfer_ownership(body, None)?;
        }
        tracing::info!(%peer, "peer left");
        Ok(())
    }

    /// Spawn a body on every connected peer and start it everywhere.
    pub fn spawn(
        &mut self,
        config: SyncConfig,
        prefab: SimBody,
        owner: Option<PeerId>,
    ) -> Result<BodyId, SessionError> {
        config.validate()?;
        if let Some(owner) = owner {
            if !self.peers.contains_key(&owner) {
                return Err(SessionError::UnknownPeer(owner));
            }
        }
        let id = BodyId::new();
        for (peer_id, peer) in self.peers.iter_mut() {
            let mut body = NetworkRigidbody::new(id, config, prefab.clone(), owner)?;
            let sent = body.start(&peer.role, &mut self.network.link(*peer_id));
            self.stats.envelopes_sent += sent as u64;
            peer.bodies.insert(id, body);
        }
        self.spawned.insert(
            id,
            SpawnRecord {
                config,
                prefab,
                owner,
            },
        );
        tracing::info!(body = ?id, ?owner, authority = ?config.authority, "body spawned");
        Ok(id)
    }

    pub fn despawn(&mut self, body: BodyId) -> Result<(), SessionError> {
        self.spawned
            .remove(&body)
            .ok_or(SessionError::UnknownBody(body))?;
        for peer in self.peers.values_mut() {
            peer.bodies.remove(&body);
        }
        self.network.forget_body(body);
        tracing::info!(?body, "body despawned");
        Ok(())
    }

    /// Deliver an ownership change to every peer.
    pub fn transfer_ownership(
        &mut self,
        body: BodyId,
        owner: Option<PeerId>,
    ) -> Result<(), SessionError> {
        if let Some(owner) = owner {
            if !self.peers.contains_key(&owner) {
                return Err(SessionError::UnknownPeer(owner));
            }
        }
        let record = self
            .spawned
            .get_mut(&body)
            .ok_or(SessionError::UnknownBody(body))?;
        let previous = record.owner;
        record.owner = owner;
        for peer in self.peers.values_mut() {
            if let Some(copy) = peer.bodies.get_mut(&body) {
                copy.on_ownership_changed(previous, owner, &peer.role);
            }
        }
        tracing::info!(?body, ?previous, ?owner, "ownership transferred");
        Ok(())
    }

    /// Network tick on every peer, without delivering anything.
    pub fn network_tick(&mut self) -> usize {
        let _span = tracing::info_span!("network_tick", tick = self.stats.network_ticks).entered();
        let mut sent = 0;
        for (peer_id, peer) in self.peers.iter_mut() {
            for body in peer.bodies.values_mut() {
                let report = body.network_tick(&peer.role, &mut self.network.link(*peer_id));
                sent += report.envelopes;
            }
        }
        self.stats.network_ticks += 1;
        self.stats.envelopes_sent += sent as u64;
        sent
    }

    /// Deliver queued traffic until the network is quiet. Returns the number
    /// of field updates applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            if self.network.pending() == 0 {
                break;
            }
            for (peer_id, peer) in self.peers.iter_mut() {
                for (from, envelope) in self.network.drain(*peer_id) {
                    let Some(body) = peer.bodies.get_mut(&envelope.body) else {
                        tracing::trace!(peer = %peer_id, body = ?envelope.body, "envelope for unknown body");
                        continue;
                    };
                    match body.receive(from, &envelope, &peer.role, &mut self.network.link(*peer_id)) {
                        Ok(n) => applied += n,
                        Err(e) => {
                            self.stats.rejected += 1;
                            tracing::warn!(peer = %peer_id, %from, "rejected envelope: {e}");
                        }
                    }
                }
            }
        }
        self.stats.updates_applied += applied as u64;
        applied
    }

    /// Network tick followed by delivery.
    pub fn tick(&mut self) -> usize {
        self.network_tick();
        self.pump()
    }

    /// Physics step on every peer: local clearing, then integration.
    pub fn physics_step(&mut self, dt: f32) {
        for peer in self.peers.values_mut() {
            for body in peer.bodies.values_mut() {
                body.fixed_update();
                body.body_mut().integrate(dt);
            }
        }
        self.stats.physics_steps += 1;
    }
}
