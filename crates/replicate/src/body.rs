use glam::Vec3;
use rigsync_common::{BodyId, DeliveryClass, Envelope, FieldId, FieldUpdate, Payload, PeerId, PeerRole};
use rigsync_physics::{ApplyTarget, PhysicsBinding, RigidbodyState};

use crate::authority::{Authority, AuthorityTransition};
use crate::config::SyncConfig;
use crate::error::{ConfigError, ReplicateError};
use crate::field::ReplicatedField;
use crate::sync_state::ClientSyncState;
use crate::transport::{Outbound, Transport};

/// The six replicated properties of a rigidbody.
#[derive(Debug, Clone)]
pub struct ReplicatedFields {
    pub velocity: ReplicatedField<Vec3>,
    pub angular_velocity: ReplicatedField<Vec3>,
    pub kinematic: ReplicatedField<bool>,
    pub gravity: ReplicatedField<bool>,
    pub drag: ReplicatedField<f32>,
    pub angular_drag: ReplicatedField<f32>,
}

impl ReplicatedFields {
    fn from_binding<B: RigidbodyState>(binding: &PhysicsBinding<B>, config: &SyncConfig) -> Self {
        let body = binding.body();
        Self {
            velocity: ReplicatedField::new(FieldId::Velocity, body.velocity(), |t, v| {
                t.apply_velocity(v)
            })
            .with_sensitivity(config.velocity.sensitivity),
            angular_velocity: ReplicatedField::new(
                FieldId::AngularVelocity,
                body.angular_velocity(),
                |t, v| t.apply_angular_velocity(v),
            )
            .with_sensitivity(config.angular_velocity.sensitivity),
            kinematic: ReplicatedField::new(FieldId::Kinematic, binding.kinematic_intent(), |t, v| {
                t.apply_kinematic_intent(v)
            }),
            gravity: ReplicatedField::new(FieldId::Gravity, body.use_gravity(), |t, v| {
                t.apply_gravity(v)
            }),
            drag: ReplicatedField::new(FieldId::Drag, body.drag(), |t, v| t.apply_drag(v)),
            angular_drag: ReplicatedField::new(FieldId::AngularDrag, body.angular_drag(), |t, v| {
                t.apply_angular_drag(v)
            }),
        }
    }

    pub fn sync_state(&self) -> ClientSyncState {
        ClientSyncState {
            velocity: self.velocity.last_sent(),
            angular_velocity: self.angular_velocity.last_sent(),
            is_kinematic: self.kinematic.last_sent(),
            use_gravity: self.gravity.last_sent(),
            drag: self.drag.last_sent(),
            angular_drag: self.angular_drag.last_sent(),
        }
    }

    fn resync_sent(&mut self) {
        self.velocity.resync_sent();
        self.angular_velocity.resync_sent();
        self.kinematic.resync_sent();
        self.gravity.resync_sent();
        self.drag.resync_sent();
        self.angular_drag.resync_sent();
    }

    fn forget_sequences(&mut self) {
        self.velocity.forget_sequence();
        self.angular_velocity.forget_sequence();
        self.kinematic.forget_sequence();
        self.gravity.forget_sequence();
        self.drag.forget_sequence();
        self.angular_drag.forget_sequence();
    }

    fn apply_remote(
        &mut self,
        update: FieldUpdate,
        sequence: u64,
        target: &mut dyn ApplyTarget,
    ) -> Result<bool, ReplicateError> {
        let payload = update.payload;
        let accepted = match update.field {
            FieldId::Velocity => self.velocity.on_remote_payload(payload, sequence, target),
            FieldId::AngularVelocity => {
                self.angular_velocity.on_remote_payload(payload, sequence, target)
            }
            FieldId::Kinematic => self.kinematic.on_remote_payload(payload, sequence, target),
            FieldId::Gravity => self.gravity.on_remote_payload(payload, sequence, target),
            FieldId::Drag => self.drag.on_remote_payload(payload, sequence, target),
            FieldId::AngularDrag => self.angular_drag.on_remote_payload(payload, sequence, target),
        };
        accepted.ok_or(ReplicateError::PayloadMismatch {
            field: update.field,
            kind: payload.kind(),
        })
    }
}

fn payload_fits(update: &FieldUpdate) -> bool {
    matches!(
        (update.field, update.payload),
        (FieldId::Velocity | FieldId::AngularVelocity, Payload::Vector(_))
            | (FieldId::Kinematic | FieldId::Gravity, Payload::Flag(_))
            | (FieldId::Drag | FieldId::AngularDrag, Payload::Scalar(_))
    )
}

/// A rigidbody under replication on one peer.
///
/// Every peer holds its own copy. Exactly one of them is authoritative at a
/// time; the rest are forced kinematic and follow the replicated values.
#[derive(Debug, Clone)]
pub struct NetworkRigidbody<B> {
    pub(crate) id: BodyId,
    pub(crate) config: SyncConfig,
    pub(crate) authority: Authority,
    pub(crate) binding: PhysicsBinding<B>,
    pub(crate) fields: ReplicatedFields,
    pub(crate) sequence: u64,
    pub(crate) started: bool,
}

impl<B: RigidbodyState> NetworkRigidbody<B> {
    /// Bind `body` for replication. The body's kinematic flag becomes the
    /// kinematic intent; nothing is enforced until [`start`](Self::start).
    pub fn new(
        id: BodyId,
        config: SyncConfig,
        body: B,
        owner: Option<PeerId>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let binding = PhysicsBinding::new(body);
        let fields = ReplicatedFields::from_binding(&binding, &config);
        Ok(Self {
            id,
            config,
            authority: Authority::new(config.authority, owner),
            binding,
            fields,
            sequence: 0,
            started: false,
        })
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn owner(&self) -> Option<PeerId> {
        self.authority.owner()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority.is_authoritative()
    }

    pub fn binding(&self) -> &PhysicsBinding<B> {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut PhysicsBinding<B> {
        &mut self.binding
    }

    pub fn body(&self) -> &B {
        self.binding.body()
    }

    pub fn body_mut(&mut self) -> &mut B {
        self.binding.body_mut()
    }

    pub fn fields(&self) -> &ReplicatedFields {
        &self.fields
    }

    pub fn sync_state(&self) -> ClientSyncState {
        self.fields.sync_state()
    }

    /// Sequence number of the last envelope this peer sent for the body.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Start/join event. Resolves authority, enforces the kinematic rule and,
    /// on the authority, pushes every current value out so late joiners never
    /// see an unset field. Returns the number of envelopes sent.
    pub fn start(&mut self, role: &PeerRole, transport: &mut dyn Transport) -> usize {
        let _span = tracing::debug_span!("body_start", body = ?self.id, peer = %role.peer).entered();
        self.authority.resolve(role);
        let authoritative = self.authority.is_authoritative();
        self.binding.set_authoritative(authoritative);

        let sent = if authoritative {
            self.hydrate(role, transport)
        } else {
            0
        };
        self.started = true;
        tracing::debug!(authoritative, sent, "body started");
        sent
    }

    fn hydrate(&mut self, role: &PeerRole, transport: &mut dyn Transport) -> usize {
        let sample = self.sample();
        let mut out = Outbound::new(self.id, *role, &mut self.sequence, transport);

        let mut motion = Vec::with_capacity(2);
        if self.config.velocity.sync {
            motion.push(self.fields.velocity.stage(sample.velocity, &mut self.binding));
        }
        if self.config.angular_velocity.sync {
            motion.push(
                self.fields
                    .angular_velocity
                    .stage(sample.angular_velocity, &mut self.binding),
            );
        }
        out.forward(DeliveryClass::Unreliable, motion);

        self.fields
            .kinematic
            .write(sample.kinematic_intent, &mut self.binding, &mut out);
        self.fields
            .gravity
            .write(sample.use_gravity, &mut self.binding, &mut out);
        self.fields.drag.write(sample.drag, &mut self.binding, &mut out);
        self.fields
            .angular_drag
            .write(sample.angular_drag, &mut self.binding, &mut out);
        out.sent()
    }

    /// Ownership-change event.
    ///
    /// A peer that becomes authoritative after start adopts the last
    /// replicated motion before simulating, so the body does not snap. Every
    /// peer re-applies the kinematic rule. The server also resets inbound
    /// sequence tracking so the new owner's stream is accepted.
    pub fn on_ownership_changed(
        &mut self,
        previous: Option<PeerId>,
        owner: Option<PeerId>,
        role: &PeerRole,
    ) -> AuthorityTransition {
        let transition = self.authority.transfer(owner, role);
        tracing::debug!(
            body = ?self.id,
            peer = %role.peer,
            ?previous,
            ?owner,
            ?transition,
            "ownership changed"
        );
        if role.is_server {
            self.fields.forget_sequences();
        }
        if !self.started {
            return transition;
        }

        if transition == AuthorityTransition::Gained {
            if self.config.velocity.sync {
                self.binding.apply_velocity(self.fields.velocity.value());
            }
            if self.config.angular_velocity.sync {
                self.binding
                    .apply_angular_velocity(self.fields.angular_velocity.value());
            }
            self.fields.resync_sent();
        }
        self.binding
            .set_authoritative(self.authority.is_authoritative());
        transition
    }

    /// Handle an inbound envelope from `from`.
    ///
    /// On the server the sender must be allowed to write the body; accepted
    /// values are applied and relayed to all observers. On a client, values
    /// are applied unless this peer is itself the authority. Returns the
    /// number of field updates applied.
    pub fn receive(
        &mut self,
        from: PeerId,
        envelope: &Envelope,
        role: &PeerRole,
        transport: &mut dyn Transport,
    ) -> Result<usize, ReplicateError> {
        if envelope.body != self.id {
            return Err(ReplicateError::WrongBody {
                expected: self.id,
                received: envelope.body,
            });
        }
        if let Some(bad) = envelope.updates.iter().find(|u| !payload_fits(u)) {
            return Err(ReplicateError::PayloadMismatch {
                field: bad.field,
                kind: bad.payload.kind(),
            });
        }

        if role.is_server {
            if !self.authority.permits_client(from) {
                tracing::warn!(body = ?self.id, sender = %from, "write from non-authoritative peer");
                return Err(ReplicateError::NotAuthoritative {
                    sender: from,
                    body: self.id,
                });
            }
            let mut accepted = Vec::with_capacity(envelope.updates.len());
            for update in &envelope.updates {
                if self
                    .fields
                    .apply_remote(*update, envelope.sequence, &mut self.binding)?
                {
                    accepted.push(*update);
                }
            }
            let applied = accepted.len();
            // Origin is the transport-level sender, never the claimed one.
            let mut out = Outbound::relayed(
                self.id,
                *role,
                from,
                &mut self.sequence,
                transport,
            );
            out.forward(envelope.delivery, accepted);
            return Ok(applied);
        }

        if self.authority.is_authoritative() {
            tracing::trace!(body = ?self.id, sequence = envelope.sequence, "authority ignores inbound values");
            return Ok(0);
        }
        let mut applied = 0;
        for update in &envelope.updates {
            if self
                .fields
                .apply_remote(*update, envelope.sequence, &mut self.binding)?
            {
                applied += 1;
            }
        }
        Ok(applied)
    }
}
