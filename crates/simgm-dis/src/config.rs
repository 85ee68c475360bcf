//! DIS exercise configuration and validation.

use thiserror::Error;

use crate::pdu::Endian;

/// Actor type instantiated for remote entities whose DIS entity type has
/// no mapping.
pub const DEFAULT_REMOTE_ACTOR_TYPE: &str = "dis.Entity";

// ── DisConfig ──────────────────────────────────────────────────────

/// Startup configuration for a [`DisComponent`](crate::DisComponent).
#[derive(Clone, Debug)]
pub struct DisConfig {
    /// Exercise id stamped on outgoing PDUs. Incoming PDUs of other
    /// exercises are dropped. Default: 1.
    pub exercise_id: u8,
    /// Site id of locally owned entities. Default: 1.
    pub site_id: u16,
    /// Application id of locally owned entities. Default: 1.
    pub application_id: u16,
    /// Protocol version stamped on outgoing PDUs. Default: 6 (IEEE 1278.1a).
    pub protocol_version: u8,
    /// Byte order of outgoing and incoming PDUs. Default: big-endian.
    pub endian: Endian,
    /// Force id written into outgoing entity state. Default: 1 (friendly).
    pub force_id: u8,
    /// Actor type name for remote entities of unmapped DIS entity types.
    /// Default: [`DEFAULT_REMOTE_ACTOR_TYPE`].
    pub remote_actor_type: String,
}

impl Default for DisConfig {
    fn default() -> Self {
        Self {
            exercise_id: 1,
            site_id: 1,
            application_id: 1,
            protocol_version: 6,
            endian: Endian::Big,
            force_id: 1,
            remote_actor_type: DEFAULT_REMOTE_ACTOR_TYPE.to_string(),
        }
    }
}

impl DisConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), DisConfigError> {
        if self.exercise_id == 0 {
            return Err(DisConfigError::InvalidExerciseId);
        }
        for (field, value) in [("site", self.site_id), ("application", self.application_id)] {
            if value == 0 || value == u16::MAX {
                return Err(DisConfigError::ReservedId { field, value });
            }
        }
        if !(1..=7).contains(&self.protocol_version) {
            return Err(DisConfigError::UnsupportedVersion {
                version: self.protocol_version,
            });
        }
        if self.remote_actor_type.is_empty() {
            return Err(DisConfigError::EmptyRemoteActorType);
        }
        Ok(())
    }
}

// ── DisConfigError ─────────────────────────────────────────────────

/// Invalid [`DisConfig`] value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DisConfigError {
    /// Exercise id 0 is not a valid exercise.
    #[error("exercise id must be non-zero")]
    InvalidExerciseId,
    /// Site or application id uses a reserved value (0 or 0xFFFF).
    #[error("{field} id {value} is reserved")]
    ReservedId {
        /// `"site"` or `"application"`.
        field: &'static str,
        /// The rejected value.
        value: u16,
    },
    /// Protocol version outside 1..=7.
    #[error("unsupported DIS protocol version {version}")]
    UnsupportedVersion {
        /// The rejected value.
        version: u8,
    },
    /// No actor type name for remote entities.
    #[error("remote actor type name is empty")]
    EmptyRemoteActorType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DisConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.endian, Endian::Big);
    }

    #[test]
    fn reserved_ids_are_rejected() {
        let cfg = DisConfig {
            application_id: u16::MAX,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(DisConfigError::ReservedId {
                field: "application",
                value: u16::MAX
            })
        );
        let cfg = DisConfig {
            site_id: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(DisConfigError::ReservedId { field: "site", .. })
        ));
    }

    #[test]
    fn exercise_and_version_are_checked() {
        let cfg = DisConfig {
            exercise_id: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(DisConfigError::InvalidExerciseId));
        let cfg = DisConfig {
            protocol_version: 9,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(DisConfigError::UnsupportedVersion { version: 9 })
        );
    }
}
