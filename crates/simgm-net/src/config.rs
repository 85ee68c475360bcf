//! Network bridge configuration and validation.

use thiserror::Error;

use simgm_core::builtin::{INFO_ACTOR_DELETED, INFO_ACTOR_PUBLISHED, INFO_ACTOR_UPDATED};
use simgm_core::MessageTypeId;

/// Which side of a client/server session a bridge plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BridgeRole {
    /// Accepts connection requests from clients.
    #[default]
    Server,
    /// Connects to one or more servers.
    Client,
}

// ── BridgeConfig ───────────────────────────────────────────────────

/// Startup configuration for a [`NetworkBridge`](crate::NetworkBridge).
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Server or client. Default: server.
    pub role: BridgeRole,
    /// Maximum number of accepted clients; 0 means unlimited. Servers only.
    /// Default: 0.
    pub max_clients: usize,
    /// Whether new connection requests are accepted. Servers only.
    /// Default: true.
    pub accept_new_clients: bool,
    /// Locally sourced message types that are forwarded to peers when they
    /// are dispatched. Default: actor published, updated and deleted.
    pub forward_types: Vec<MessageTypeId>,
    /// Seconds of real time between heartbeats. Default: 1.0.
    pub heartbeat_interval: f64,
    /// Seconds of real time after which a silent peer is evicted.
    /// Default: 10.0.
    pub peer_timeout: f64,
    /// Largest accepted frame in bytes. Default: 1 MiB.
    pub max_frame_bytes: usize,
    /// Received messages a filter may hold back with WAIT at once; further
    /// held messages are dropped. Default: 1024.
    pub max_held_messages: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            role: BridgeRole::Server,
            max_clients: 0,
            accept_new_clients: true,
            forward_types: vec![INFO_ACTOR_PUBLISHED, INFO_ACTOR_UPDATED, INFO_ACTOR_DELETED],
            heartbeat_interval: 1.0,
            peer_timeout: 10.0,
            max_frame_bytes: 1 << 20,
            max_held_messages: 1024,
        }
    }
}

impl BridgeConfig {
    /// Default configuration for a client bridge.
    pub fn client() -> Self {
        Self {
            role: BridgeRole::Client,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), BridgeConfigError> {
        if !self.heartbeat_interval.is_finite() || self.heartbeat_interval <= 0.0 {
            return Err(BridgeConfigError::InvalidHeartbeatInterval {
                value: self.heartbeat_interval,
            });
        }
        if !self.peer_timeout.is_finite() || self.peer_timeout <= self.heartbeat_interval {
            return Err(BridgeConfigError::InvalidPeerTimeout {
                value: self.peer_timeout,
                heartbeat: self.heartbeat_interval,
            });
        }
        if self.max_frame_bytes < 64 || u32::try_from(self.max_frame_bytes).is_err() {
            return Err(BridgeConfigError::InvalidFrameLimit {
                value: self.max_frame_bytes,
            });
        }
        if self.max_held_messages == 0 {
            return Err(BridgeConfigError::InvalidHeldLimit);
        }
        Ok(())
    }
}

// ── BridgeConfigError ──────────────────────────────────────────────

/// Invalid [`BridgeConfig`] value.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BridgeConfigError {
    /// Heartbeat interval is NaN, infinite, zero or negative.
    #[error("invalid heartbeat interval {value}")]
    InvalidHeartbeatInterval {
        /// The rejected value.
        value: f64,
    },
    /// Peer timeout is not longer than the heartbeat interval.
    #[error("peer timeout {value} must exceed the heartbeat interval {heartbeat}")]
    InvalidPeerTimeout {
        /// The rejected value.
        value: f64,
        /// The configured heartbeat interval.
        heartbeat: f64,
    },
    /// Frame limit is below 64 bytes or does not fit the `u32` length prefix.
    #[error("invalid frame limit {value}")]
    InvalidFrameLimit {
        /// The rejected value.
        value: usize,
    },
    /// No room to hold back messages.
    #[error("held message limit must be at least 1")]
    InvalidHeldLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        BridgeConfig::default().validate().unwrap();
        assert_eq!(BridgeConfig::client().role, BridgeRole::Client);
    }

    #[test]
    fn timeout_must_exceed_heartbeat() {
        let cfg = BridgeConfig {
            heartbeat_interval: 2.0,
            peer_timeout: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BridgeConfigError::InvalidPeerTimeout { .. })
        ));
    }

    #[test]
    fn bad_heartbeats_are_rejected() {
        for value in [0.0, -1.0, f64::NAN] {
            let cfg = BridgeConfig {
                heartbeat_interval: value,
                ..Default::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(BridgeConfigError::InvalidHeartbeatInterval { .. })
            ));
        }
    }

    #[test]
    fn tiny_frame_limit_is_rejected() {
        let cfg = BridgeConfig {
            max_frame_bytes: 8,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(BridgeConfigError::InvalidFrameLimit { value: 8 })
        );
    }

    #[test]
    fn held_limit_must_be_positive() {
        let cfg = BridgeConfig {
            max_held_messages: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(BridgeConfigError::InvalidHeldLimit));
    }
}
