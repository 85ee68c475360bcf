//! Error types for the PDU codec and the DIS component.

use std::io;

use thiserror::Error;

use simgm_core::{FactoryError, ParamError};
use simgm_engine::{ActorError, GmError};

use crate::config::DisConfigError;

/// Errors raised while encoding or decoding a PDU.
#[derive(Debug, Error)]
pub enum PduError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The bytes do not form a valid PDU.
    #[error("malformed PDU: {detail}")]
    Malformed {
        /// What went wrong.
        detail: String,
    },
    /// The PDU type is not one this codec understands.
    #[error("unsupported PDU type {ty}")]
    UnknownPduType {
        /// PDU type byte from the header.
        ty: u8,
    },
    /// The header length disagrees with the datagram length.
    #[error("PDU header declares {declared} bytes, datagram has {actual}")]
    LengthMismatch {
        /// Length from the header.
        declared: usize,
        /// Bytes actually present.
        actual: usize,
    },
}

impl PduError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        PduError::Malformed {
            detail: detail.into(),
        }
    }
}

/// Errors returned by adapters, sinks and the DIS component.
#[derive(Debug, Error)]
pub enum DisError {
    /// Encoding or decoding a PDU failed.
    #[error(transparent)]
    Pdu(#[from] PduError),
    /// The DIS configuration is invalid.
    #[error(transparent)]
    Config(#[from] DisConfigError),
    /// Reading or writing a message parameter failed.
    #[error(transparent)]
    Param(#[from] ParamError),
    /// A message type is not registered.
    #[error(transparent)]
    Factory(#[from] FactoryError),
    /// A game manager operation failed.
    #[error(transparent)]
    Gm(#[from] GmError),
    /// An actor operation failed.
    #[error(transparent)]
    Actor(#[from] ActorError),
    /// A socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Every local entity number of the site/application pair is in use.
    #[error("no free entity numbers for site {site}, application {application}")]
    EntityIdsExhausted {
        /// Local site id.
        site: u16,
        /// Local application id.
        application: u16,
    },
    /// The sink has no destination address.
    #[error("UDP sink has no target address")]
    NoTarget,
    /// A background thread could not be started.
    #[error("failed to spawn DIS thread: {reason}")]
    ThreadSpawn {
        /// Spawn error text.
        reason: String,
    },
}
