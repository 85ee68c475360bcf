//! TCP transport with length-prefixed frames.
//!
//! Each link has a reader thread that decodes frames and forwards them over
//! a crossbeam channel; [`poll`](Transport::poll) drains that channel on the
//! tick thread. Writes happen on the caller's thread. A listening transport
//! runs one acceptor thread that polls a non-blocking listener and exits
//! when the transport is dropped.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{ConnectionId, Transport, TransportEvent};
use crate::codec::{read_frame, write_frame};
use crate::error::{NetError, WireError};

const ACCEPT_POLL: Duration = Duration::from_millis(10);

enum Internal {
    Opened {
        conn: ConnectionId,
        stream: TcpStream,
        inbound: bool,
    },
    Event(TransportEvent),
}

#[derive(Clone)]
struct Shared {
    tx: Sender<Internal>,
    next_conn: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    max_frame: usize,
}

impl Shared {
    fn next_conn(&self) -> ConnectionId {
        ConnectionId(self.next_conn.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Hand a connected stream to the tick thread and start its reader.
    fn adopt(&self, conn: ConnectionId, stream: TcpStream, inbound: bool) {
        let reader = match stream.try_clone() {
            Ok(r) => r,
            Err(e) => {
                let _ = self.tx.send(Internal::Event(TransportEvent::ConnectFailed {
                    conn,
                    reason: format!("cannot clone socket: {e}"),
                }));
                return;
            }
        };
        let shared = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("simgm-net-read-{}", conn.0))
            .spawn(move || shared.read_loop(conn, reader));
        match spawned {
            Ok(_) => {
                let _ = self.tx.send(Internal::Opened {
                    conn,
                    stream,
                    inbound,
                });
            }
            Err(e) => {
                let _ = self.tx.send(Internal::Event(TransportEvent::ConnectFailed {
                    conn,
                    reason: format!("cannot spawn reader: {e}"),
                }));
            }
        }
    }

    fn read_loop(self, conn: ConnectionId, mut stream: TcpStream) {
        loop {
            let event = match read_frame(&mut stream, self.max_frame) {
                Ok(bytes) => TransportEvent::Frame { conn, bytes },
                Err(WireError::Io(e))
                    if matches!(
                        e.kind(),
                        ErrorKind::UnexpectedEof
                            | ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                    ) || self.shutdown.load(Ordering::Acquire) =>
                {
                    let _ = self.tx.send(Internal::Event(TransportEvent::Closed { conn }));
                    return;
                }
                Err(e) => {
                    let _ = self.tx.send(Internal::Event(TransportEvent::Error {
                        conn,
                        reason: e.to_string(),
                    }));
                    return;
                }
            };
            if self.tx.send(Internal::Event(event)).is_err() {
                return;
            }
        }
    }

    fn accept_loop(self, listener: TcpListener) {
        while !self.shutdown.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        log::warn!("dropping connection from {peer}: {e}");
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    log::debug!("accepted TCP connection from {peer}");
                    self.adopt(self.next_conn(), stream, true);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
    }
}

/// Frame transport over TCP sockets.
pub struct TcpTransport {
    shared: Shared,
    rx: Receiver<Internal>,
    streams: HashMap<ConnectionId, TcpStream>,
    local_addr: Option<SocketAddr>,
    acceptor: Option<JoinHandle<()>>,
}

impl TcpTransport {
    fn with_limit(max_frame: usize) -> Self {
        let (tx, rx) = unbounded();
        Self {
            shared: Shared {
                tx,
                next_conn: Arc::new(AtomicU64::new(0)),
                shutdown: Arc::new(AtomicBool::new(false)),
                max_frame,
            },
            rx,
            streams: HashMap::new(),
            local_addr: None,
            acceptor: None,
        }
    }

    /// A transport that only opens outgoing connections.
    pub fn client(max_frame: usize) -> Self {
        Self::with_limit(max_frame)
    }

    /// A transport listening on `address` (for example `"127.0.0.1:0"`).
    ///
    /// # Errors
    ///
    /// The bind error, or [`NetError::ThreadSpawn`] if the acceptor thread
    /// cannot start.
    pub fn bind(address: &str, max_frame: usize) -> Result<Self, NetError> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        let mut transport = Self::with_limit(max_frame);
        transport.local_addr = Some(listener.local_addr()?);
        let shared = transport.shared.clone();
        let handle = thread::Builder::new()
            .name("simgm-net-accept".into())
            .spawn(move || shared.accept_loop(listener))
            .map_err(|e| NetError::ThreadSpawn {
                reason: e.to_string(),
            })?;
        transport.acceptor = Some(handle);
        log::info!("listening for game managers on {address}");
        Ok(transport)
    }

    /// Bound address of a listening transport.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, address: &str) -> Result<ConnectionId, NetError> {
        let conn = self.shared.next_conn();
        let shared = self.shared.clone();
        let target = address.to_string();
        thread::Builder::new()
            .name("simgm-net-connect".into())
            .spawn(move || match TcpStream::connect(&target) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    shared.adopt(conn, stream, false);
                }
                Err(e) => {
                    let _ = shared.tx.send(Internal::Event(TransportEvent::ConnectFailed {
                        conn,
                        reason: e.to_string(),
                    }));
                }
            })
            .map_err(|e| NetError::ThreadSpawn {
                reason: e.to_string(),
            })?;
        Ok(conn)
    }

    fn send(&mut self, conn: ConnectionId, frame: &[u8]) -> Result<(), NetError> {
        let stream = self
            .streams
            .get_mut(&conn)
            .ok_or(NetError::UnknownConnection { conn })?;
        if let Err(e) = write_frame(stream, frame, self.shared.max_frame) {
            if matches!(e, WireError::Io(_)) {
                if let Some(stream) = self.streams.remove(&conn) {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(stream) = self.streams.remove(&conn) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn poll(&mut self, events: &mut Vec<TransportEvent>) {
        while let Ok(internal) = self.rx.try_recv() {
            match internal {
                Internal::Opened {
                    conn,
                    stream,
                    inbound,
                } => {
                    self.streams.insert(conn, stream);
                    events.push(TransportEvent::Opened { conn, inbound });
                }
                Internal::Event(event) => {
                    let conn = match &event {
                        TransportEvent::Frame { conn, .. } => Some(*conn),
                        TransportEvent::Closed { conn } | TransportEvent::Error { conn, .. } => {
                            let conn = *conn;
                            // Locally closed links are not reported.
                            if self.streams.remove(&conn).is_none() {
                                continue;
                            }
                            None
                        }
                        _ => None,
                    };
                    if let Some(conn) = conn {
                        if !self.streams.contains_key(&conn) {
                            continue;
                        }
                    }
                    events.push(event);
                }
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for (_, stream) in self.streams.drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.acceptor.take() {
            if handle.join().is_err() {
                log::error!("TCP acceptor thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .field("links", &self.streams.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn poll_until(
        t: &mut TcpTransport,
        want: usize,
        timeout: Duration,
    ) -> Vec<TransportEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while events.len() < want && Instant::now() < deadline {
            t.poll(&mut events);
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn loopback_exchange() {
        let mut server = TcpTransport::bind("127.0.0.1:0", 1024).unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let mut client = TcpTransport::client(1024);
        let c = client.connect(&addr).unwrap();

        let opened = poll_until(&mut client, 1, Duration::from_secs(5));
        assert_eq!(
            opened,
            [TransportEvent::Opened {
                conn: c,
                inbound: false
            }]
        );
        client.send(c, b"hello").unwrap();

        let events = poll_until(&mut server, 2, Duration::from_secs(5));
        assert_eq!(events.len(), 2, "{events:?}");
        let TransportEvent::Opened { conn: s, inbound } = events[0] else {
            panic!("expected Opened, got {:?}", events[0]);
        };
        assert!(inbound);
        assert_eq!(
            events[1],
            TransportEvent::Frame {
                conn: s,
                bytes: b"hello".to_vec()
            }
        );

        client.close(c);
        let closed = poll_until(&mut server, 1, Duration::from_secs(5));
        assert_eq!(closed, [TransportEvent::Closed { conn: s }]);
    }

    #[test]
    fn refused_connection_fails() {
        // Bind then drop to find a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .to_string();
        let mut client = TcpTransport::client(1024);
        let c = client.connect(&addr).unwrap();
        let events = poll_until(&mut client, 1, Duration::from_secs(5));
        assert!(matches!(
            events.as_slice(),
            [TransportEvent::ConnectFailed { conn, .. }] if *conn == c
        ));
    }

    #[test]
    fn oversized_frames_are_refused_locally() {
        let mut server = TcpTransport::bind("127.0.0.1:0", 1024).unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let mut client = TcpTransport::client(8);
        let c = client.connect(&addr).unwrap();
        poll_until(&mut client, 1, Duration::from_secs(5));
        assert!(matches!(
            client.send(c, &[0; 16]),
            Err(NetError::Wire(WireError::FrameTooLarge { .. }))
        ));
        // The link survives a refused frame.
        client.send(c, b"ok").unwrap();
        let events = poll_until(&mut server, 2, Duration::from_secs(5));
        assert!(matches!(events.last(), Some(TransportEvent::Frame { bytes, .. }) if bytes == b"ok"));
    }
}
