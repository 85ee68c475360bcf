//! Datagram endpoints for PDUs.
//!
//! A [`PduSink`] sends encoded PDUs and hands received datagrams to the
//! tick thread through [`poll`](PduSink::poll). [`UdpSink`] reads its
//! socket on a background thread and forwards datagrams over a crossbeam
//! channel; [`ChannelSink`] connects two in-process endpoints for tests and
//! single-process setups.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::DisError;

/// Largest datagram the UDP reader accepts.
pub const MAX_DATAGRAM: usize = 8192;

const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Sends PDUs and collects received datagrams.
pub trait PduSink: Send {
    /// Send one encoded PDU.
    fn send(&mut self, datagram: &[u8]) -> Result<(), DisError>;

    /// Append every datagram received since the last poll to `out`.
    fn poll(&mut self, out: &mut Vec<Vec<u8>>);
}

// ── ChannelSink ─────────────────────────────────────────────────────

/// One end of an in-process datagram pipe.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelSink {
    /// Two connected endpoints: what one sends, the other polls.
    pub fn pair() -> (ChannelSink, ChannelSink) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (
            ChannelSink { tx: a_tx, rx: a_rx },
            ChannelSink { tx: b_tx, rx: b_rx },
        )
    }
}

impl PduSink for ChannelSink {
    fn send(&mut self, datagram: &[u8]) -> Result<(), DisError> {
        // A dropped peer behaves like an unreachable host: the datagram is lost.
        let _ = self.tx.send(datagram.to_vec());
        Ok(())
    }

    fn poll(&mut self, out: &mut Vec<Vec<u8>>) {
        out.extend(self.rx.try_iter());
    }
}

// ── UdpSink ─────────────────────────────────────────────────────────

/// UDP endpoint with a background reader thread.
pub struct UdpSink {
    socket: UdpSocket,
    target: Option<SocketAddr>,
    rx: Receiver<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl UdpSink {
    /// Bind `address` (for example `"0.0.0.0:3000"`) and start the reader.
    /// Broadcast is enabled so that the target may be a broadcast address.
    pub fn bind(address: &str) -> Result<Self, DisError> {
        let socket = UdpSocket::bind(address)?;
        socket.set_broadcast(true)?;
        let reader_socket = socket.try_clone()?;
        reader_socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let (tx, rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let reader = thread::Builder::new()
            .name("simgm-dis-recv".into())
            .spawn(move || read_loop(reader_socket, tx, flag))
            .map_err(|e| DisError::ThreadSpawn {
                reason: e.to_string(),
            })?;
        log::info!("DIS endpoint bound to {}", socket.local_addr()?);
        Ok(Self {
            socket,
            target: None,
            rx,
            shutdown,
            reader: Some(reader),
        })
    }

    /// Address outgoing PDUs are sent to.
    pub fn set_target(&mut self, target: SocketAddr) {
        self.target = Some(target);
    }

    /// Builder form of [`set_target`](Self::set_target).
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = Some(target);
        self
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, DisError> {
        Ok(self.socket.local_addr()?)
    }
}

fn read_loop(socket: UdpSocket, tx: Sender<Vec<u8>>, shutdown: Arc<AtomicBool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while !shutdown.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                log::trace!("received {n} byte datagram from {from}");
                if tx.send(buf[..n].to_vec()).is_err() {
                    return;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => log::warn!("DIS receive failed: {e}"),
        }
    }
}

impl PduSink for UdpSink {
    fn send(&mut self, datagram: &[u8]) -> Result<(), DisError> {
        let target = self.target.ok_or(DisError::NoTarget)?;
        self.socket.send_to(datagram, target)?;
        Ok(())
    }

    fn poll(&mut self, out: &mut Vec<Vec<u8>>) {
        out.extend(self.rx.try_iter());
    }
}

impl Drop for UdpSink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::error!("DIS reader thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for UdpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSink")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn poll_until(sink: &mut dyn PduSink, want: usize) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < want && Instant::now() < deadline {
            sink.poll(&mut out);
            thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn channel_pair_is_crossed() {
        let (mut a, mut b) = ChannelSink::pair();
        a.send(b"one").unwrap();
        a.send(b"two").unwrap();
        b.send(b"back").unwrap();
        let mut got = Vec::new();
        b.poll(&mut got);
        assert_eq!(got, [b"one".to_vec(), b"two".to_vec()]);
        got.clear();
        a.poll(&mut got);
        assert_eq!(got, [b"back".to_vec()]);
    }

    #[test]
    fn sending_to_a_dropped_peer_is_not_an_error() {
        let (mut a, b) = ChannelSink::pair();
        drop(b);
        a.send(b"lost").unwrap();
    }

    #[test]
    fn udp_loopback() {
        let mut a = UdpSink::bind("127.0.0.1:0").unwrap();
        let mut b = UdpSink::bind("127.0.0.1:0").unwrap();
        a.set_target(b.local_addr().unwrap());
        a.send(&[1, 2, 3]).unwrap();
        assert_eq!(poll_until(&mut b, 1), [vec![1u8, 2, 3]]);
    }

    #[test]
    fn udp_without_target_fails() {
        let mut a = UdpSink::bind("127.0.0.1:0").unwrap();
        assert!(matches!(a.send(&[0]), Err(DisError::NoTarget)));
    }
}
