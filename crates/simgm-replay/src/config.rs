//! Server logger configuration and validation.

use thiserror::Error;

use simgm_core::{ActorId, MessageTypeId};

use crate::store::is_valid_log_name;

/// Log name used when a record or playback request names none.
pub const DEFAULT_LOG_NAME: &str = "default";

/// Startup configuration for a [`ServerLogger`](crate::ServerLogger).
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    /// Log used when a state change request carries an empty
    /// `LogFileName`. Default: [`DEFAULT_LOG_NAME`].
    pub log_name: String,
    /// Message types never recorded.
    pub ignored_types: Vec<MessageTypeId>,
    /// Actors whose messages are never recorded.
    pub ignored_actors: Vec<ActorId>,
    /// Record tick messages as well. Default: false; ticks are produced by
    /// every step and are never played back.
    pub record_tick_messages: bool,
    /// Pause the game manager once playback runs out of messages.
    /// Default: true.
    pub pause_at_end: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_name: DEFAULT_LOG_NAME.to_string(),
            ignored_types: Vec::new(),
            ignored_actors: Vec::new(),
            record_tick_messages: false,
            pause_at_end: true,
        }
    }
}

impl LoggerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), LoggerConfigError> {
        if !is_valid_log_name(&self.log_name) {
            return Err(LoggerConfigError::InvalidLogName {
                name: self.log_name.clone(),
            });
        }
        if self.ignored_actors.iter().any(|a| a.is_null()) {
            return Err(LoggerConfigError::NullIgnoredActor);
        }
        Ok(())
    }
}

/// Invalid [`LoggerConfig`] value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoggerConfigError {
    /// The default log name is empty or contains a path separator.
    #[error("invalid default log name {name:?}")]
    InvalidLogName {
        /// Offending name.
        name: String,
    },
    /// The null actor id cannot be ignored.
    #[error("ignored actor list contains the null actor id")]
    NullIgnoredActor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LoggerConfig::default().validate().unwrap();
    }

    #[test]
    fn log_name_must_be_a_plain_name() {
        for name in ["", "a/b", "..", "c\\d"] {
            let cfg = LoggerConfig {
                log_name: name.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(cfg.validate(), Err(LoggerConfigError::InvalidLogName { .. })),
                "{name:?}"
            );
        }
    }

    #[test]
    fn null_actor_cannot_be_ignored() {
        let cfg = LoggerConfig {
            ignored_actors: vec![ActorId::NULL],
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(LoggerConfigError::NullIgnoredActor));
    }
}
