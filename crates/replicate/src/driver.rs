//! Tick entry points: the network tick (send path) and the physics step
//! (local clearing).

use glam::Vec3;
use rigsync_common::{DeliveryClass, PeerRole};
use rigsync_physics::RigidbodyState;

use crate::body::NetworkRigidbody;
use crate::change::MotionSend;
use crate::transport::{Outbound, Transport};

/// Local physics state read once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSample {
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub kinematic_intent: bool,
    pub use_gravity: bool,
    pub drag: f32,
    pub angular_drag: f32,
}

/// What one network tick sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub motion: MotionSend,
    pub settings_sent: usize,
    pub envelopes: usize,
}

impl<B: RigidbodyState> NetworkRigidbody<B> {
    pub fn sample(&self) -> PhysicsSample {
        let body = self.binding.body();
        PhysicsSample {
            velocity: body.velocity(),
            angular_velocity: body.angular_velocity(),
            kinematic_intent: self.binding.kinematic_intent(),
            use_gravity: body.use_gravity(),
            drag: body.drag(),
            angular_drag: body.angular_drag(),
        }
    }

    /// Network tick. Does nothing unless started and authoritative.
    ///
    /// Motion fields are compared against the last sent values with their
    /// sensitivity and bundled into one unreliable envelope when both moved.
    /// Settings go out one reliable envelope each, only when they differ.
    pub fn network_tick(&mut self, role: &PeerRole, transport: &mut dyn Transport) -> TickReport {
        if !self.started || !self.authority.is_authoritative() {
            return TickReport::default();
        }
        let sample = self.sample();
        let mut out = Outbound::new(self.id, *role, &mut self.sequence, transport);

        let motion = MotionSend::plan(
            self.config.velocity.sync && self.fields.velocity.differs_from_sent(sample.velocity),
            self.config.angular_velocity.sync
                && self
                    .fields
                    .angular_velocity
                    .differs_from_sent(sample.angular_velocity),
        );
        let mut updates = Vec::with_capacity(2);
        if motion.velocity() {
            updates.push(self.fields.velocity.stage(sample.velocity, &mut self.binding));
        }
        if motion.angular_velocity() {
            updates.push(
                self.fields
                    .angular_velocity
                    .stage(sample.angular_velocity, &mut self.binding),
            );
        }
        out.forward(DeliveryClass::Unreliable, updates);

        let mut settings_sent = 0;
        if self.fields.kinematic.differs_from_sent(sample.kinematic_intent)
            && self
                .fields
                .kinematic
                .write(sample.kinematic_intent, &mut self.binding, &mut out)
        {
            settings_sent += 1;
        }
        if self.fields.gravity.differs_from_sent(sample.use_gravity)
            && self
                .fields
                .gravity
                .write(sample.use_gravity, &mut self.binding, &mut out)
        {
            settings_sent += 1;
        }
        if self.fields.drag.differs_from_sent(sample.drag)
            && self.fields.drag.write(sample.drag, &mut self.binding, &mut out)
        {
            settings_sent += 1;
        }
        if self.fields.angular_drag.differs_from_sent(sample.angular_drag)
            && self
                .fields
                .angular_drag
                .write(sample.angular_drag, &mut self.binding, &mut out)
        {
            settings_sent += 1;
        }

        let report = TickReport {
            motion,
            settings_sent,
            envelopes: out.sent(),
        };
        if report.envelopes > 0 {
            tracing::trace!(body = ?self.id, ?report, "network tick");
        }
        report
    }

    /// Physics step. Zeroes motion fields that are configured to clear while
    /// their sync is off. Purely local.
    pub fn fixed_update(&mut self) {
        if self.config.angular_velocity.clears() {
            self.binding.body_mut().set_angular_velocity(Vec3::ZERO);
        }
        if self.config.velocity.clears() {
            self.binding.body_mut().set_velocity(Vec3::ZERO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncConfig, VectorSyncConfig};
    use crate::transport::RecordingTransport;
    use rigsync_common::{BodyId, FieldId, PeerId, Payload};
    use rigsync_physics::SimBody;

    const ALICE: PeerId = PeerId(1);

    fn started(config: SyncConfig) -> (NetworkRigidbody<SimBody>, RecordingTransport, PeerRole) {
        let role = PeerRole::client(ALICE);
        let mut body =
            NetworkRigidbody::new(BodyId::new(), config, SimBody::default(), Some(ALICE)).unwrap();
        let mut transport = RecordingTransport::new();
        body.start(&role, &mut transport);
        transport.clear();
        (body, transport, role)
    }

    #[test]
    fn unchanged_state_sends_nothing() {
        let (mut body, mut transport, role) = started(SyncConfig::default());
        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report, TickReport::default());
        assert!(transport.is_empty());
    }

    #[test]
    fn cumulative_velocity_crosses_sensitivity() {
        let (mut body, mut transport, role) = started(SyncConfig::default());

        body.body_mut().velocity = Vec3::new(0.05, 0.0, 0.0);
        body.network_tick(&role, &mut transport);
        assert!(transport.is_empty());

        body.body_mut().velocity = Vec3::new(0.2, 0.0, 0.0);
        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.motion, MotionSend::Velocity);
        assert_eq!(transport.to_server.len(), 1);
        assert_eq!(body.sync_state().velocity, Some(Vec3::new(0.2, 0.0, 0.0)));
    }

    #[test]
    fn both_motion_fields_bundle_into_one_envelope() {
        let (mut body, mut transport, role) = started(SyncConfig::default());
        body.body_mut().velocity = Vec3::new(1.0, 0.0, 0.0);
        body.body_mut().angular_velocity = Vec3::new(0.0, 1.0, 0.0);

        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.motion, MotionSend::Both);
        assert_eq!(report.envelopes, 1);
        let env = &transport.to_server[0];
        assert_eq!(env.delivery, DeliveryClass::Unreliable);
        assert!(env.touches(FieldId::Velocity));
        assert!(env.touches(FieldId::AngularVelocity));
    }

    #[test]
    fn only_angular_velocity_sent_alone() {
        let (mut body, mut transport, role) = started(SyncConfig::default());
        body.body_mut().angular_velocity = Vec3::new(0.0, 0.0, 3.0);

        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.motion, MotionSend::AngularVelocity);
        let env = &transport.to_server[0];
        assert_eq!(env.updates.len(), 1);
        assert!(env.touches(FieldId::AngularVelocity));
    }

    #[test]
    fn disabled_field_never_bundled() {
        let config = SyncConfig {
            velocity: VectorSyncConfig {
                sync: false,
                ..VectorSyncConfig::default()
            },
            ..SyncConfig::default()
        };
        let (mut body, mut transport, role) = started(config);
        body.body_mut().velocity = Vec3::new(9.0, 0.0, 0.0);
        body.body_mut().angular_velocity = Vec3::new(0.0, 9.0, 0.0);

        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.motion, MotionSend::AngularVelocity);
        assert!(!transport.to_server[0].touches(FieldId::Velocity));
        assert_eq!(body.sync_state().velocity, None);
    }

    #[test]
    fn settings_sent_independently_and_once() {
        let (mut body, mut transport, role) = started(SyncConfig::default());
        body.body_mut().drag = 2.0;
        body.body_mut().use_gravity = false;

        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.settings_sent, 2);
        assert_eq!(transport.to_server.len(), 2);
        assert!(
            transport
                .to_server
                .iter()
                .all(|e| e.delivery == DeliveryClass::Reliable && e.updates.len() == 1)
        );
        assert!(transport.to_server.iter().any(|e| e.updates[0].payload == Payload::Scalar(2.0)));

        transport.clear();
        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.settings_sent, 0);
        assert!(transport.is_empty());
    }

    #[test]
    fn kinematic_intent_change_is_replicated() {
        let (mut body, mut transport, role) = started(SyncConfig::default());
        body.binding_mut().set_kinematic_intent(true);
        assert!(body.body().is_kinematic());

        let report = body.network_tick(&role, &mut transport);
        assert_eq!(report.settings_sent, 1);
        assert_eq!(
            transport.to_server[0].updates[0].payload,
            Payload::Flag(true)
        );
        assert_eq!(body.sync_state().is_kinematic, Some(true));
    }

    #[test]
    fn observer_tick_is_silent() {
        let role = PeerRole::client(PeerId(2));
        let mut body =
            NetworkRigidbody::new(BodyId::new(), SyncConfig::default(), SimBody::default(), Some(ALICE))
                .unwrap();
        let mut transport = RecordingTransport::new();
        body.start(&role, &mut transport);
        body.body_mut().velocity = Vec3::new(5.0, 5.0, 5.0);
        assert_eq!(body.network_tick(&role, &mut transport), TickReport::default());
        assert!(transport.is_empty());
    }

    #[test]
    fn tick_before_start_is_silent() {
        let role = PeerRole::client(ALICE);
        let mut body =
            NetworkRigidbody::new(BodyId::new(), SyncConfig::default(), SimBody::default(), Some(ALICE))
                .unwrap();
        let mut transport = RecordingTransport::new();
        body.body_mut().velocity = Vec3::ONE;
        body.network_tick(&role, &mut transport);
        assert!(transport.is_empty());
    }

    #[test]
    fn fixed_update_clears_disabled_fields() {
        let config = SyncConfig {
            velocity: VectorSyncConfig {
                sync: false,
                clear_when_disabled: true,
                ..VectorSyncConfig::default()
            },
            angular_velocity: VectorSyncConfig {
                sync: true,
                clear_when_disabled: true,
                ..VectorSyncConfig::default()
            },
            ..SyncConfig::default()
        };
        let (mut body, mut transport, role) = started(config);
        body.body_mut().velocity = Vec3::new(1.0, 2.0, 3.0);
        body.body_mut().angular_velocity = Vec3::new(1.0, 0.0, 0.0);

        body.fixed_update();
        assert_eq!(body.body().velocity, Vec3::ZERO);
        // Synced field is left alone even with clearing requested.
        assert_eq!(body.body().angular_velocity, Vec3::new(1.0, 0.0, 0.0));

        body.network_tick(&role, &mut transport);
        assert!(transport.to_server.iter().all(|e| !e.touches(FieldId::Velocity)));
    }
}
