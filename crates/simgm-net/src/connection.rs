//! Connection lifecycle state machine.
//!
//! ```text
//! Disconnected  --ConnectRequested-->     Connecting
//! Disconnected  --Connected (inbound)-->  Connected
//! Connecting    --Connected-->            Connected
//! Connecting    --ConnectFailed/Error-->  Failed
//! Connected     --DisconnectRequested-->  Disconnecting
//! Connected     --Error-->                Failed
//! Disconnecting --Disconnected-->         Disconnected
//! Failed        --Disconnected-->         Disconnected
//! ```
//!
//! A connected link that drops without a disconnect request goes straight
//! back to `Disconnected`.

use std::fmt;

use crate::error::NetError;

/// Lifecycle state of one connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link.
    #[default]
    Disconnected,
    /// An outgoing connection attempt is in progress.
    Connecting,
    /// The link is up.
    Connected,
    /// A graceful close has been requested.
    Disconnecting,
    /// The connection attempt or the link failed.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Inputs that drive [`ConnectionState`] transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// The local side started an outgoing connection.
    ConnectRequested,
    /// The link came up (outgoing attempt succeeded, or a listener
    /// accepted an inbound link).
    Connected,
    /// The outgoing attempt failed.
    ConnectFailed,
    /// The local side asked for a graceful close.
    DisconnectRequested,
    /// The link is gone.
    Disconnected,
    /// The link reported an error.
    Error,
}

impl ConnectionState {
    /// The state reached by applying `event`.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidTransition`] when the event makes no sense in this
    /// state, for example `Connected` while already connected.
    pub fn on(self, event: ConnectionEvent) -> Result<ConnectionState, NetError> {
        use ConnectionEvent as E;
        use ConnectionState as S;
        let next = match (self, event) {
            (S::Disconnected, E::ConnectRequested) => S::Connecting,
            (S::Disconnected | S::Connecting, E::Connected) => S::Connected,
            (S::Connecting, E::ConnectFailed | E::Error) => S::Failed,
            (S::Connecting | S::Connected, E::DisconnectRequested) => S::Disconnecting,
            (S::Connected | S::Disconnecting, E::Error) => S::Failed,
            (S::Connected | S::Disconnecting | S::Failed, E::Disconnected) => S::Disconnected,
            (from, event) => return Err(NetError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Whether frames may be sent.
    pub fn is_open(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Whether the connection has reached a final state.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionEvent as E;
    use ConnectionState as S;

    fn run(events: &[ConnectionEvent]) -> Result<ConnectionState, NetError> {
        events.iter().try_fold(S::Disconnected, |s, &e| s.on(e))
    }

    #[test]
    fn outgoing_lifecycle() {
        assert_eq!(
            run(&[E::ConnectRequested, E::Connected, E::DisconnectRequested, E::Disconnected])
                .unwrap(),
            S::Disconnected
        );
    }

    #[test]
    fn inbound_link_connects_directly() {
        assert_eq!(run(&[E::Connected]).unwrap(), S::Connected);
    }

    #[test]
    fn failures_pass_through_failed() {
        assert_eq!(run(&[E::ConnectRequested, E::ConnectFailed]).unwrap(), S::Failed);
        assert_eq!(
            run(&[E::Connected, E::Error, E::Disconnected]).unwrap(),
            S::Disconnected
        );
    }

    #[test]
    fn abrupt_drop_disconnects() {
        assert_eq!(run(&[E::Connected, E::Disconnected]).unwrap(), S::Disconnected);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert!(matches!(
            run(&[E::Connected, E::Connected]),
            Err(NetError::InvalidTransition {
                from: S::Connected,
                event: E::Connected
            })
        ));
        assert!(S::Disconnected.on(E::DisconnectRequested).is_err());
        assert!(S::Failed.on(E::ConnectRequested).is_err());
    }
}
