//! Per-tick change detection against the last value sent.

use glam::Vec3;

/// Values that can be compared for "changed enough to send".
pub trait ChangeDetect: Copy + PartialEq {
    /// `threshold` only applies to vectors; other kinds compare exactly.
    fn has_changed(previous: Self, current: Self, threshold: f32) -> bool;
}

impl ChangeDetect for Vec3 {
    fn has_changed(previous: Self, current: Self, threshold: f32) -> bool {
        previous.distance_squared(current) > threshold * threshold
    }
}

impl ChangeDetect for bool {
    fn has_changed(previous: Self, current: Self, _threshold: f32) -> bool {
        previous != current
    }
}

impl ChangeDetect for f32 {
    fn has_changed(previous: Self, current: Self, _threshold: f32) -> bool {
        previous != current
    }
}

pub fn has_changed<T: ChangeDetect>(previous: T, current: T, threshold: f32) -> bool {
    T::has_changed(previous, current, threshold)
}

/// Which motion fields go out this tick.
///
/// Velocity and angular velocity usually change together, so when both do
/// they travel in one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionSend {
    #[default]
    None,
    Velocity,
    AngularVelocity,
    Both,
}

impl MotionSend {
    pub fn plan(velocity_changed: bool, angular_velocity_changed: bool) -> Self {
        match (velocity_changed, angular_velocity_changed) {
            (true, true) => MotionSend::Both,
            (true, false) => MotionSend::Velocity,
            (false, true) => MotionSend::AngularVelocity,
            (false, false) => MotionSend::None,
        }
    }

    pub fn velocity(self) -> bool {
        matches!(self, MotionSend::Velocity | MotionSend::Both)
    }

    pub fn angular_velocity(self) -> bool {
        matches!(self, MotionSend::AngularVelocity | MotionSend::Both)
    }
}
