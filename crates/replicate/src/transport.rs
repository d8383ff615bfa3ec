use rigsync_common::{BodyId, DeliveryClass, Envelope, FieldUpdate, PeerId, PeerRole};

/// Outbound side of the hosting network runtime.
///
/// Both calls are fire-and-forget. `broadcast` carries buffered-last
/// semantics: the runtime keeps the latest value per (body, field) and hands
/// it to peers that connect later. Inbound envelopes are handed back to
/// [`NetworkRigidbody::receive`](crate::NetworkRigidbody::receive).
pub trait Transport {
    /// Client to server. Only an authoritative client calls this.
    fn send_to_server(&mut self, envelope: Envelope);
    /// Server to every observer.
    fn broadcast(&mut self, envelope: Envelope);
}

/// Routes field updates for one body through a [`Transport`].
///
/// Stamps every envelope with the body's next sequence number and picks the
/// direction from the local role: the server broadcasts, clients send to the
/// server.
pub struct Outbound<'a> {
    body: BodyId,
    role: PeerRole,
    origin: PeerId,
    sequence: &'a mut u64,
    transport: &'a mut dyn Transport,
    sent: usize,
}

impl<'a> Outbound<'a> {
    pub fn new(
        body: BodyId,
        role: PeerRole,
        sequence: &'a mut u64,
        transport: &'a mut dyn Transport,
    ) -> Self {
        Self::relayed(body, role, role.peer, sequence, transport)
    }

    /// Outbound for values another peer originated (server relay).
    pub fn relayed(
        body: BodyId,
        role: PeerRole,
        origin: PeerId,
        sequence: &'a mut u64,
        transport: &'a mut dyn Transport,
    ) -> Self {
        Self {
            body,
            role,
            origin,
            sequence,
            transport,
            sent: 0,
        }
    }

    /// Send `updates` as a single envelope. Empty batches are dropped.
    pub fn forward(&mut self, delivery: DeliveryClass, updates: Vec<FieldUpdate>) {
        if updates.is_empty() {
            return;
        }
        *self.sequence += 1;
        let envelope = Envelope {
            body: self.body,
            sequence: *self.sequence,
            origin: self.origin,
            delivery,
            updates,
        };
        tracing::debug!(
            body = ?envelope.body,
            sequence = envelope.sequence,
            ?delivery,
            fields = envelope.updates.len(),
            server = self.role.is_server,
            "forwarding update"
        );
        if self.role.is_server {
            self.transport.broadcast(envelope);
        } else {
            self.transport.send_to_server(envelope);
        }
        self.sent += 1;
    }

    /// Envelopes handed to the transport so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

/// Transport that keeps everything it is given, for inspection.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub to_server: Vec<Envelope>,
    pub broadcasts: Vec<Envelope>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.to_server.len() + self.broadcasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.to_server.clear();
        self.broadcasts.clear();
    }
}

impl Transport for RecordingTransport {
    fn send_to_server(&mut self, envelope: Envelope) {
        self.to_server.push(envelope);
    }

    fn broadcast(&mut self, envelope: Envelope) {
        self.broadcasts.push(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rigsync_common::{FieldId, Payload};

    fn velocity(v: Vec3) -> FieldUpdate {
        FieldUpdate {
            field: FieldId::Velocity,
            payload: Payload::Vector(v),
        }
    }

    #[test]
    fn server_broadcasts() {
        let mut transport = RecordingTransport::new();
        let mut seq = 0;
        let mut out = Outbound::new(
            BodyId::new(),
            PeerRole::server(PeerId(0)),
            &mut seq,
            &mut transport,
        );
        out.forward(DeliveryClass::Unreliable, vec![velocity(Vec3::X)]);
        assert_eq!(out.sent(), 1);
        assert_eq!(transport.broadcasts.len(), 1);
        assert!(transport.to_server.is_empty());
        assert_eq!(seq, 1);
    }

    #[test]
    fn client_sends_to_server() {
        let mut transport = RecordingTransport::new();
        let mut seq = 7;
        let mut out = Outbound::new(
            BodyId::new(),
            PeerRole::client(PeerId(4)),
            &mut seq,
            &mut transport,
        );
        out.forward(DeliveryClass::Reliable, vec![velocity(Vec3::Y)]);
        let env = &transport.to_server[0];
        assert_eq!(env.sequence, 8);
        assert_eq!(env.origin, PeerId(4));
        assert_eq!(env.delivery, DeliveryClass::Reliable);
    }

    #[test]
    fn relay_keeps_origin() {
        let mut transport = RecordingTransport::new();
        let mut seq = 0;
        let mut out = Outbound::relayed(
            BodyId::new(),
            PeerRole::server(PeerId(0)),
            PeerId(9),
            &mut seq,
            &mut transport,
        );
        out.forward(DeliveryClass::Unreliable, vec![velocity(Vec3::Z)]);
        assert_eq!(transport.broadcasts[0].origin, PeerId(9));
    }

    #[test]
    fn empty_batch_is_not_sent() {
        let mut transport = RecordingTransport::new();
        let mut seq = 0;
        let mut out = Outbound::new(
            BodyId::new(),
            PeerRole::server(PeerId(0)),
            &mut seq,
            &mut transport,
        );
        out.forward(DeliveryClass::Unreliable, Vec::new());
        assert_eq!(out.sent(), 0);
        assert!(transport.is_empty());
        assert_eq!(seq, 0);
    }
}
