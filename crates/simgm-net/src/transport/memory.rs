//! In-process transport over crossbeam channels.
//!
//! A [`MemoryHub`] is a namespace of listener addresses. Every endpoint
//! created from the same hub can connect to every listener on it. Links are
//! pairs of unbounded channels, so frames arrive intact and in order.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{ConnectionId, Transport, TransportEvent};
use crate::error::NetError;

enum Packet {
    Open {
        conn: ConnectionId,
        reply: Sender<Packet>,
        reply_conn: ConnectionId,
    },
    Frame {
        conn: ConnectionId,
        bytes: Vec<u8>,
    },
    Close {
        conn: ConnectionId,
    },
}

#[derive(Default)]
struct HubInner {
    listeners: Mutex<HashMap<String, Sender<Packet>>>,
    next_conn: AtomicU64,
}

/// Shared namespace of in-process listeners.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// An empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that accepts connections on `address`.
    ///
    /// # Errors
    ///
    /// [`NetError::AddressInUse`] if another live transport listens there.
    pub fn listen(&self, address: &str) -> Result<MemoryTransport, NetError> {
        let mut transport = self.endpoint();
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if listeners.contains_key(address) {
            return Err(NetError::AddressInUse {
                address: address.to_string(),
            });
        }
        listeners.insert(address.to_string(), transport.tx.clone());
        transport.address = Some(address.to_string());
        Ok(transport)
    }

    /// A transport that can only open outgoing connections.
    pub fn endpoint(&self) -> MemoryTransport {
        let (tx, rx) = unbounded();
        MemoryTransport {
            hub: self.clone(),
            address: None,
            tx,
            rx,
            routes: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn next_conn(&self) -> ConnectionId {
        ConnectionId(self.inner.next_conn.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn listener(&self, address: &str) -> Option<Sender<Packet>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryHub")
            .field("listeners", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct Route {
    tx: Sender<Packet>,
    remote: ConnectionId,
}

/// One endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    address: Option<String>,
    tx: Sender<Packet>,
    rx: Receiver<Packet>,
    routes: HashMap<ConnectionId, Route>,
    pending: Vec<TransportEvent>,
}

impl MemoryTransport {
    /// Address this transport listens on, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Number of open links.
    pub fn link_count(&self) -> usize {
        self.routes.len()
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, address: &str) -> Result<ConnectionId, NetError> {
        let local = self.hub.next_conn();
        let Some(server) = self.hub.listener(address) else {
            self.pending.push(TransportEvent::ConnectFailed {
                conn: local,
                reason: format!("nothing listens on {address:?}"),
            });
            return Ok(local);
        };
        let remote = self.hub.next_conn();
        let open = Packet::Open {
            conn: remote,
            reply: self.tx.clone(),
            reply_conn: local,
        };
        if server.send(open).is_err() {
            self.pending.push(TransportEvent::ConnectFailed {
                conn: local,
                reason: format!("listener on {address:?} is gone"),
            });
            return Ok(local);
        }
        self.routes.insert(local, Route { tx: server, remote });
        self.pending.push(TransportEvent::Opened {
            conn: local,
            inbound: false,
        });
        Ok(local)
    }

    fn send(&mut self, conn: ConnectionId, frame: &[u8]) -> Result<(), NetError> {
        let route = self
            .routes
            .get(&conn)
            .ok_or(NetError::UnknownConnection { conn })?;
        let packet = Packet::Frame {
            conn: route.remote,
            bytes: frame.to_vec(),
        };
        if route.tx.send(packet).is_err() {
            self.routes.remove(&conn);
            return Err(NetError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "remote endpoint dropped",
            )));
        }
        Ok(())
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(route) = self.routes.remove(&conn) {
            let _ = route.tx.send(Packet::Close { conn: route.remote });
        }
    }

    fn poll(&mut self, events: &mut Vec<TransportEvent>) {
        events.append(&mut self.pending);
        while let Ok(packet) = self.rx.try_recv() {
            match packet {
                Packet::Open {
                    conn,
                    reply,
                    reply_conn,
                } => {
                    self.routes.insert(
                        conn,
                        Route {
                            tx: reply,
                            remote: reply_conn,
                        },
                    );
                    events.push(TransportEvent::Opened {
                        conn,
                        inbound: true,
                    });
                }
                Packet::Frame { conn, bytes } => {
                    // Frames racing a local close are dropped.
                    if self.routes.contains_key(&conn) {
                        events.push(TransportEvent::Frame { conn, bytes });
                    }
                }
                Packet::Close { conn } => {
                    if self.routes.remove(&conn).is_some() {
                        events.push(TransportEvent::Closed { conn });
                    }
                }
            }
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        for (_, route) in self.routes.drain() {
            let _ = route.tx.send(Packet::Close { conn: route.remote });
        }
        if let Some(address) = self.address.take() {
            self.hub
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&address);
        }
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("address", &self.address)
            .field("links", &self.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(t: &mut MemoryTransport) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        t.poll(&mut events);
        events
    }

    #[test]
    fn frames_flow_both_ways_in_order() {
        let hub = MemoryHub::new();
        let mut server = hub.listen("server").unwrap();
        let mut client = hub.endpoint();
        let c = client.connect("server").unwrap();
        client.send(c, b"one").unwrap();
        client.send(c, b"two").unwrap();
        assert_eq!(
            poll(&mut client),
            [TransportEvent::Opened {
                conn: c,
                inbound: false
            }]
        );

        let events = poll(&mut server);
        let TransportEvent::Opened { conn: s, inbound } = events[0] else {
            panic!("expected Opened, got {:?}", events[0]);
        };
        assert!(inbound);
        assert_eq!(
            events[1..],
            [
                TransportEvent::Frame {
                    conn: s,
                    bytes: b"one".to_vec()
                },
                TransportEvent::Frame {
                    conn: s,
                    bytes: b"two".to_vec()
                },
            ]
        );

        server.send(s, b"back").unwrap();
        assert_eq!(
            poll(&mut client),
            [TransportEvent::Frame {
                conn: c,
                bytes: b"back".to_vec()
            }]
        );
    }

    #[test]
    fn connecting_to_nothing_fails_on_poll() {
        let hub = MemoryHub::new();
        let mut client = hub.endpoint();
        let c = client.connect("nowhere").unwrap();
        assert!(matches!(
            poll(&mut client).as_slice(),
            [TransportEvent::ConnectFailed { conn, .. }] if *conn == c
        ));
        assert!(matches!(
            client.send(c, b"x"),
            Err(NetError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn address_is_exclusive_until_dropped() {
        let hub = MemoryHub::new();
        let first = hub.listen("a").unwrap();
        assert!(matches!(hub.listen("a"), Err(NetError::AddressInUse { .. })));
        drop(first);
        assert!(hub.listen("a").is_ok());
    }

    #[test]
    fn close_is_reported_to_the_other_side() {
        let hub = MemoryHub::new();
        let mut server = hub.listen("s").unwrap();
        let mut client = hub.endpoint();
        let c = client.connect("s").unwrap();
        poll(&mut client);
        let s = match poll(&mut server)[0] {
            TransportEvent::Opened { conn, .. } => conn,
            ref other => panic!("unexpected {other:?}"),
        };
        client.close(c);
        assert!(poll(&mut client).is_empty());
        assert_eq!(poll(&mut server), [TransportEvent::Closed { conn: s }]);
        assert_eq!(server.link_count(), 0);
    }
}
