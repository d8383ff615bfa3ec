use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Gravitational acceleration applied to bodies with gravity enabled.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Read/write access to a simulated rigidbody.
///
/// This is the only coupling between replication and a concrete physics
/// engine. Implementations must make every setter observable through the
/// matching getter immediately.
pub trait RigidbodyState {
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    fn angular_velocity(&self) -> Vec3;
    fn set_angular_velocity(&mut self, angular_velocity: Vec3);
    fn is_kinematic(&self) -> bool;
    fn set_kinematic(&mut self, kinematic: bool);
    fn use_gravity(&self) -> bool;
    fn set_use_gravity(&mut self, use_gravity: bool);
    fn drag(&self) -> f32;
    fn set_drag(&mut self, drag: f32);
    fn angular_drag(&self) -> f32;
    fn set_angular_drag(&mut self, angular_drag: f32);
}

/// Minimal rigidbody with explicit Euler integration.
///
/// Kinematic bodies keep their velocities but are not integrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub is_kinematic: bool,
    pub use_gravity: bool,
    pub drag: f32,
    pub angular_drag: f32,
}

impl Default for SimBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            is_kinematic: false,
            use_gravity: true,
            drag: 0.0,
            angular_drag: 0.05,
        }
    }
}

impl SimBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the body by `dt` seconds.
    pub fn integrate(&mut self, dt: f32) {
        if self.is_kinematic || dt <= 0.0 {
            return;
        }
        if self.use_gravity {
            self.velocity += GRAVITY * dt;
        }
        // Same damping model as common engines: v *= 1 / (1 + drag * dt)
        self.velocity *= 1.0 / (1.0 + self.drag.max(0.0) * dt);
        self.angular_velocity *= 1.0 / (1.0 + self.angular_drag.max(0.0) * dt);

        self.position += self.velocity * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.rotation = (spin * self.rotation).normalize();
    }
}

impl RigidbodyState for SimBody {
    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        self.angular_velocity = angular_velocity;
    }

    fn is_kinematic(&self) -> bool {
        self.is_kinematic
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.is_kinematic = kinematic;
    }

    fn use_gravity(&self) -> bool {
        self.use_gravity
    }

    fn set_use_gravity(&mut self, use_gravity: bool) {
        self.use_gravity = use_gravity;
    }

    fn drag(&self) -> f32 {
        self.drag
    }

    fn set_drag(&mut self, drag: f32) {
        self.drag = drag;
    }

    fn angular_drag(&self) -> f32 {
        self.angular_drag
    }

    fn set_angular_drag(&mut self, angular_drag: f32) {
        self.angular_drag = angular_drag;
    }
}
