use rigsync_common::AuthorityMode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Replication settings for one vector field (velocity or angular velocity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSyncConfig {
    /// Replicate this field every network tick it changes.
    pub sync: bool,
    /// Zero the local value every physics step while `sync` is off.
    pub clear_when_disabled: bool,
    /// Minimum distance from the last sent value that counts as a change.
    pub sensitivity: f32,
}

impl Default for VectorSyncConfig {
    fn default() -> Self {
        Self {
            sync: true,
            clear_when_disabled: false,
            sensitivity: 0.1,
        }
    }
}

impl VectorSyncConfig {
    /// True if the local value must be forced to zero each physics step.
    pub fn clears(&self) -> bool {
        !self.sync && self.clear_when_disabled
    }
}

/// Per-body replication configuration. Read-only once the body is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub authority: AuthorityMode,
    pub velocity: VectorSyncConfig,
    pub angular_velocity: VectorSyncConfig,
}

impl SyncConfig {
    pub fn server_authoritative() -> Self {
        Self {
            authority: AuthorityMode::Server,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_sensitivity("velocity", self.velocity.sensitivity)?;
        check_sensitivity("angular_velocity", self.angular_velocity.sensitivity)?;
        Ok(())
    }
}

fn check_sensitivity(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSensitivity { field, value })
    }
}
