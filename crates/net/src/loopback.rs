use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rigsync_common::{BodyId, DeliveryClass, Envelope, FieldId, FieldUpdate, PeerId};
use rigsync_replicate::Transport;
use serde::{Deserialize, Serialize};

use crate::codec;

/// Delivery behavior of the loopback network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Probability in `[0, 1]` that an unreliable packet is dropped.
    pub unreliable_loss: f32,
    /// Randomly swap adjacent unreliable packets on delivery.
    pub reorder_unreliable: bool,
    /// Seed for the loss/reorder decisions.
    pub seed: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            unreliable_loss: 0.0,
            reorder_unreliable: false,
            seed: 0,
        }
    }
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub reordered: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
struct Packet {
    from: PeerId,
    delivery: DeliveryClass,
    /// Buffered-last replays are never dropped.
    lossy: bool,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct BufferedUpdate {
    origin: PeerId,
    sequence: u64,
    delivery: DeliveryClass,
    update: FieldUpdate,
}

/// In-process network connecting one server and any number of clients.
///
/// Envelopes are CBOR-encoded on send and decoded on delivery. Reliable
/// packets always arrive in send order. Unreliable packets may be dropped or
/// swapped according to [`NetConfig`], deterministically for a given seed.
/// Every broadcast value is kept per (body, field) and replayed to peers that
/// connect later.
#[derive(Debug)]
pub struct LoopbackNetwork {
    config: NetConfig,
    server: PeerId,
    connected: BTreeSet<PeerId>,
    queues: BTreeMap<PeerId, VecDeque<Packet>>,
    buffered: BTreeMap<(BodyId, FieldId), BufferedUpdate>,
    rng: u64,
    stats: NetStats,
}

impl LoopbackNetwork {
    pub fn new(server: PeerId, config: NetConfig) -> Self {
        let mut network = Self {
            config,
            server,
            connected: BTreeSet::new(),
            queues: BTreeMap::new(),
            buffered: BTreeMap::new(),
            rng: config.seed,
            stats: NetStats::default(),
        };
        network.connected.insert(server);
        network.queues.insert(server, VecDeque::new());
        network
    }

    pub fn server(&self) -> PeerId {
        self.server
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn set_unreliable_loss(&mut self, loss: f32) {
        self.config.unreliable_loss = loss.clamp(0.0, 1.0);
    }

    pub fn stats(&self) -> &NetStats {
        &self.stats
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.connected.contains(&peer)
    }

    /// Connect `peer` and queue the buffered latest value of every field.
    /// Returns the number of replayed envelopes.
    pub fn connect(&mut self, peer: PeerId) -> usize {
        self.connected.insert(peer);
        self.queues.entry(peer).or_default();

        let mut replay: Vec<(BodyId, BufferedUpdate)> = self
            .buffered
            .iter()
            .map(|((body, _), b)| (*body, *b))
            .collect();
        replay.sort_by_key(|(_, b)| b.sequence);
        let server = self.server;
        let mut queued = 0;
        for (body, b) in replay {
            let envelope = Envelope {
                body,
                sequence: b.sequence,
                origin: b.origin,
                delivery: b.delivery,
                updates: vec![b.update],
            };
            if self.enqueue(server, peer, &envelope, false) {
                queued += 1;
            }
        }
        tracing::debug!(%peer, replayed = queued, "peer connected");
        queued
    }

    pub fn disconnect(&mut self, peer: PeerId) {
        self.connected.remove(&peer);
        self.queues.remove(&peer);
        tracing::debug!(%peer, "peer disconnected");
    }

    /// Drop the buffered values of a despawned body.
    pub fn forget_body(&mut self, body: BodyId) {
        self.buffered.retain(|(b, _), _| *b != body);
    }

    /// Transport handle for sends made by `peer`.
    pub fn link(&mut self, peer: PeerId) -> Link<'_> {
        Link {
            network: self,
            peer,
        }
    }

    /// Packets waiting across all peers.
    pub fn pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Deliver everything queued for `peer`, applying loss and reordering to
    /// unreliable packets.
    pub fn drain(&mut self, peer: PeerId) -> Vec<(PeerId, Envelope)> {
        let Some(queue) = self.queues.get_mut(&peer) else {
            return Vec::new();
        };
        let packets: Vec<Packet> = queue.drain(..).collect();

        let mut kept = Vec::with_capacity(packets.len());
        for packet in packets {
            if packet.lossy
                && packet.delivery == DeliveryClass::Unreliable
                && self.next_unit() < self.config.unreliable_loss
            {
                self.stats.dropped += 1;
                tracing::trace!(%peer, from = %packet.from, "unreliable packet dropped");
                continue;
            }
            kept.push(packet);
        }

        if self.config.reorder_unreliable {
            let mut i = 0;
            while i + 1 < kept.len() {
                let both_unreliable = kept[i].lossy
                    && kept[i + 1].lossy
                    && kept[i].delivery == DeliveryClass::Unreliable
                    && kept[i + 1].delivery == DeliveryClass::Unreliable;
                if both_unreliable && self.next_unit() < 0.5 {
                    kept.swap(i, i + 1);
                    self.stats.reordered += 1;
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }

        let mut delivered = Vec::with_capacity(kept.len());
        for packet in kept {
            match codec::decode(&packet.bytes) {
                Ok(envelope) => {
                    self.stats.delivered += 1;
                    delivered.push((packet.from, envelope));
                }
                Err(e) => tracing::warn!(%peer, from = %packet.from, "undecodable packet: {e}"),
            }
        }
        delivered
    }

    fn send(&mut self, from: PeerId, to: PeerId, envelope: &Envelope) {
        self.enqueue(from, to, envelope, true);
    }

    fn enqueue(&mut self, from: PeerId, to: PeerId, envelope: &Envelope, lossy: bool) -> bool {
        if !self.connected.contains(&to) {
            return false;
        }
        let bytes = match codec::encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%from, %to, "dropping unencodable envelope: {e}");
                return false;
            }
        };
        self.stats.sent += 1;
        self.stats.bytes += bytes.len() as u64;
        self.queues.entry(to).or_default().push_back(Packet {
            from,
            delivery: envelope.delivery,
            lossy,
            bytes,
        });
        true
    }

    fn remember(&mut self, envelope: &Envelope) {
        for update in &envelope.updates {
            self.buffered.insert(
                (envelope.body, update.field),
                BufferedUpdate {
                    origin: envelope.origin,
                    sequence: envelope.sequence,
                    delivery: envelope.delivery,
                    update: *update,
                },
            );
        }
    }

    /// Uniform sample in `[0, 1)` from a splitmix64 stream.
    fn next_unit(&mut self) -> f32 {
        self.rng = self.rng.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.rng;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        // 24 high bits give an exact f32 in [0, 1).
        (z >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// A peer's sending end of the [`LoopbackNetwork`].
pub struct Link<'a> {
    network: &'a mut LoopbackNetwork,
    peer: PeerId,
}

impl Transport for Link<'_> {
    fn send_to_server(&mut self, envelope: Envelope) {
        let server = self.network.server;
        self.network.send(self.peer, server, &envelope);
    }

    fn broadcast(&mut self, envelope: Envelope) {
        self.network.remember(&envelope);
        let observers: Vec<PeerId> = self
            .network
            .connected
            .iter()
            .copied()
            .filter(|p| *p != self.peer)
            .collect();
        for to in observers {
            self.network.send(self.peer, to, &envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rigsync_common::Payload;

    const SERVER: PeerId = PeerId(0);
    const ALICE: PeerId = PeerId(1);
    const BOB: PeerId = PeerId(2);

    fn envelope(body: BodyId, sequence: u64, field: FieldId, payload: Payload) -> Envelope {
        Envelope {
            body,
            sequence,
            origin: SERVER,
            delivery: field.delivery(),
            updates: vec![FieldUpdate { field, payload }],
        }
    }

    #[test]
    fn client_send_reaches_server_only() {
        let mut net = LoopbackNetwork::new(SERVER, NetConfig::default());
        net.connect(ALICE);
        net.connect(BOB);
        let env = envelope(BodyId::new(), 1, FieldId::Drag, Payload::Scalar(1.0));
        net.link(ALICE).send_to_server(env.clone());

        assert!(net.drain(BOB).is_empty());
        let got = net.drain(SERVER);
        assert_eq!(got, vec![(ALICE, env)]);
    }

    #[test]
    fn broadcast_skips_sender() {
        let mut net = LoopbackNetwork::new(SERVER, NetConfig::default());
        net.connect(ALICE);
        net.connect(BOB);
        let env = envelope(BodyId::new(), 1, FieldId::Gravity, Payload::Flag(false));
        net.link(SERVER).broadcast(env);

        assert_eq!(net.drain(ALICE).len(), 1);
        assert_eq!(net.drain(BOB).len(), 1);
        assert!(net.drain(SERVER).is_empty());
    }

    #[test]
    fn late_joiner_gets_latest_per_field() {
        let mut net = LoopbackNetwork::new(SERVER, NetConfig::default());
        let body = BodyId::new();
        for (seq, x) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            net.link(SERVER).broadcast(envelope(
                body,
                seq,
                FieldId::Velocity,
                Payload::Vector(Vec3::new(x, 0.0, 0.0)),
            ));
        }
        net.link(SERVER)
            .broadcast(envelope(body, 4, FieldId::Drag, Payload::Scalar(0.5)));

        assert_eq!(net.connect(ALICE), 2);
        let got = net.drain(ALICE);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].1.sequence, 3);
        assert_eq!(
            got[0].1.updates[0].payload,
            Payload::Vector(Vec3::new(3.0, 0.0, 0.0))
        );
        assert_eq!(got[0].1.body, body);
        assert_eq!(got[1].1.updates[0].field, FieldId::Drag);
    }

    #[test]
    fn forgotten_body_is_not_replayed() {
        let mut net = LoopbackNetwork::new(SERVER, NetConfig::default());
        let body = BodyId::new();
        net.link(SERVER)
            .broadcast(envelope(body, 1, FieldId::Drag, Payload::Scalar(0.5)));
        net.forget_body(body);
        assert_eq!(net.connect(ALICE), 0);
    }

    #[test]
    fn full_loss_drops_only_unreliable() {
        let config = NetConfig {
            unreliable_loss: 1.0,
            ..NetConfig::default()
        };
        let mut net = LoopbackNetwork::new(SERVER, config);
        net.connect(ALICE);
        let body = BodyId::new();
        net.link(ALICE).send_to_server(envelope(
            body,
            1,
            FieldId::Velocity,
            Payload::Vector(Vec3::X),
        ));
        net.link(ALICE)
            .send_to_server(envelope(body, 2, FieldId::Kinematic, Payload::Flag(true)));

        let got = net.drain(SERVER);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1.updates[0].field, FieldId::Kinematic);
        assert_eq!(net.stats().dropped, 1);
    }

    #[test]
    fn buffered_replay_is_never_dropped() {
        let config = NetConfig {
            unreliable_loss: 1.0,
            ..NetConfig::default()
        };
        let mut net = LoopbackNetwork::new(SERVER, config);
        let body = BodyId::new();
        net.link(SERVER).broadcast(envelope(
            body,
            1,
            FieldId::Velocity,
            Payload::Vector(Vec3::X),
        ));
        net.connect(BOB);
        assert_eq!(net.drain(BOB).len(), 1);
    }

    #[test]
    fn reliable_order_preserved_under_reordering() {
        let config = NetConfig {
            reorder_unreliable: true,
            seed: 11,
            ..NetConfig::default()
        };
        let mut net = LoopbackNetwork::new(SERVER, config);
        net.connect(ALICE);
        let body = BodyId::new();
        for seq in 1..=20 {
            net.link(ALICE)
                .send_to_server(envelope(body, seq, FieldId::Drag, Payload::Scalar(seq as f32)));
        }
        let seqs: Vec<u64> = net.drain(SERVER).iter().map(|(_, e)| e.sequence).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
        assert_eq!(net.stats().reordered, 0);
    }

    #[test]
    fn same_seed_same_losses() {
        let run = || {
            let config = NetConfig {
                unreliable_loss: 0.5,
                reorder_unreliable: true,
                seed: 99,
            };
            let mut net = LoopbackNetwork::new(SERVER, config);
            net.connect(ALICE);
            let body = BodyId::new();
            for seq in 1..=50 {
                net.link(ALICE).send_to_server(envelope(
                    body,
                    seq,
                    FieldId::Velocity,
                    Payload::Vector(Vec3::X),
                ));
            }
            net.drain(SERVER)
                .iter()
                .map(|(_, e)| e.sequence)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn disconnected_peer_receives_nothing() {
        let mut net = LoopbackNetwork::new(SERVER, NetConfig::default());
        net.connect(ALICE);
        net.disconnect(ALICE);
        net.link(SERVER)
            .broadcast(envelope(BodyId::new(), 1, FieldId::Drag, Payload::Scalar(1.0)));
        assert!(net.drain(ALICE).is_empty());
        assert!(!net.is_connected(ALICE));
    }
}
