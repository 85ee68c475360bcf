//! Game manager configuration and validation.
//!
//! [`GameManagerConfig`] is passed to [`GameManager::new`](crate::GameManager::new),
//! which calls [`validate()`](GameManagerConfig::validate) before building
//! anything.

use thiserror::Error;

// ── GameManagerConfig ──────────────────────────────────────────────

/// Startup configuration for a [`GameManager`](crate::GameManager).
#[derive(Clone, Debug)]
pub struct GameManagerConfig {
    /// Human-readable name of the local machine. Default: `"simgm"`.
    pub machine_name: String,
    /// Host name advertised to peers. Default: `"localhost"`.
    pub host_name: String,
    /// IP address advertised to peers. Default: `"127.0.0.1"`.
    pub ip_address: String,
    /// Port advertised to peers. Default: 0.
    pub port: u16,
    /// Capacity of the outbound message queue. Default: 65536.
    pub max_queued_messages: usize,
    /// Upper bound on removal passes at the end of a step. Removing an
    /// actor may cause further removals; anything still pending after this
    /// many passes is carried to the next step. Default: 16.
    pub max_removal_passes: u32,
    /// Sim-time multiplier applied to every step's delta. Default: 1.0.
    pub time_scale: f32,
    /// Seed for machine and actor GUIDs. `None` seeds from the OS.
    pub id_seed: Option<u64>,
    /// Simulation time at start-up, in seconds. Default: 0.0.
    pub start_sim_time: f64,
}

impl Default for GameManagerConfig {
    fn default() -> Self {
        Self {
            machine_name: "simgm".to_string(),
            host_name: "localhost".to_string(),
            ip_address: "127.0.0.1".to_string(),
            port: 0,
            max_queued_messages: 65536,
            max_removal_passes: 16,
            time_scale: 1.0,
            id_seed: None,
            start_sim_time: 0.0,
        }
    }
}

impl GameManagerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine_name.is_empty() {
            return Err(ConfigError::EmptyMachineName);
        }
        if self.max_queued_messages == 0 {
            return Err(ConfigError::QueueCapacityZero);
        }
        if self.max_removal_passes == 0 {
            return Err(ConfigError::RemovalPassesZero);
        }
        validate_time_scale(self.time_scale)?;
        if !self.start_sim_time.is_finite() || self.start_sim_time < 0.0 {
            return Err(ConfigError::InvalidStartTime {
                value: self.start_sim_time,
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_time_scale(scale: f32) -> Result<(), ConfigError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ConfigError::InvalidTimeScale { value: scale });
    }
    Ok(())
}

// ── ConfigError ────────────────────────────────────────────────────

/// Invalid [`GameManagerConfig`] value.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// `machine_name` is empty.
    #[error("machine name must not be empty")]
    EmptyMachineName,
    /// `max_queued_messages` is zero.
    #[error("message queue capacity must be at least 1")]
    QueueCapacityZero,
    /// `max_removal_passes` is zero.
    #[error("at least one removal pass is required")]
    RemovalPassesZero,
    /// Time scale is NaN, infinite, zero or negative.
    #[error("invalid time scale {value}")]
    InvalidTimeScale {
        /// The rejected value.
        value: f32,
    },
    /// Start time is NaN, infinite or negative.
    #[error("invalid start sim time {value}")]
    InvalidStartTime {
        /// The rejected value.
        value: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GameManagerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let cfg = GameManagerConfig {
            max_queued_messages: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::QueueCapacityZero));
    }

    #[test]
    fn bad_time_scales_are_rejected() {
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let cfg = GameManagerConfig {
                time_scale: scale,
                ..Default::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::InvalidTimeScale { .. })
            ));
        }
    }

    #[test]
    fn empty_machine_name_is_rejected() {
        let cfg = GameManagerConfig {
            machine_name: String::new(),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyMachineName));
    }
}
