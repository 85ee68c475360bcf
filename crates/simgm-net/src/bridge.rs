//! The network bridge component.
//!
//! [`NetworkBridge`] links the local game manager to its peers over a
//! [`Transport`]. Incoming frames are decoded against the local factory on
//! the tick thread during `pre_frame`, so received messages are dispatched
//! in the step in which they are polled. Outgoing traffic has two sources:
//! messages handed to `send_network_message`, which are routed by
//! destination, and locally sourced messages of the configured forward
//! types, which are published to every accepted peer as they are
//! dispatched.
//!
//! # Sessions
//!
//! A client opens a link with [`NetworkBridge::connect`] and sends
//! `NETCLIENT_REQUEST_CONNECTION` as soon as the link is up. The server
//! answers with `NETSERVER_ACCEPT_CONNECTION` or
//! `NETSERVER_REJECT_CONNECTION`. Until a link is accepted only those three
//! message types are let through; everything else is dropped and counted.
//!
//! # Liveness
//!
//! Every `heartbeat_interval` seconds of real time each accepted peer gets a
//! `NET_HEARTBEAT`. The answering `NET_HEARTBEAT_ACK` echoes the send time,
//! which gives the round-trip estimate stored in the peer's
//! [`MachineInfo`]. Any frame counts as a sign of life; links silent for
//! longer than `peer_timeout` are closed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;

use simgm_core::builtin::{
    is_connection_control, INFO_ACTOR_DELETED, INFO_ACTOR_PUBLISHED, INFO_ACTOR_UPDATED,
    INFO_CLIENT_CONNECTED, NETCLIENT_NOTIFY_DISCONNECT, NETCLIENT_REQUEST_CONNECTION,
    NETSERVER_ACCEPT_CONNECTION, NETSERVER_REJECT_CONNECTION, NET_HEARTBEAT, NET_HEARTBEAT_ACK,
};
use simgm_core::{ActorId, MachineId, MachineInfo, Message, ParamValue};
use simgm_engine::{ComponentPriority, ComponentResult, GmComponent, GmContext};

use crate::codec::{from_bytes, to_bytes};
use crate::config::{BridgeConfig, BridgeRole};
use crate::connection::{ConnectionEvent, ConnectionState};
use crate::error::NetError;
use crate::transport::{ConnectionId, Transport, TransportEvent};

/// Name under which a [`NetworkBridge`] registers unless renamed.
pub const NETWORK_BRIDGE_NAME: &str = "NetworkBridge";

// ── Message actions ────────────────────────────────────────────────

/// What to do with a message received from a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageAction {
    /// Inject it into the local queue.
    Send,
    /// Hold it and ask again at the next step.
    Wait,
    /// Discard it.
    Drop,
    /// Discard it and answer the sender with `SERVER_REQUEST_REJECTED`.
    Reject(String),
}

/// Decides the [`MessageAction`] for each received message.
/// Connection-management and heartbeat messages are never filtered.
pub type MessageFilter = Box<dyn FnMut(&Message) -> MessageAction + Send>;

// ── Events ─────────────────────────────────────────────────────────

/// Connection lifecycle notifications, delivered over the channel returned
/// by [`NetworkBridge::subscribe`].
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeEvent {
    /// A link came up.
    Connected {
        /// Connection handle.
        conn: ConnectionId,
        /// Whether the remote side opened it.
        inbound: bool,
    },
    /// An outgoing connection attempt failed.
    ConnectFailed {
        /// Connection handle.
        conn: ConnectionId,
        /// Failure description.
        reason: String,
    },
    /// The session on a link was accepted.
    Accepted {
        /// Connection handle.
        conn: ConnectionId,
        /// The remote machine.
        machine: MachineInfo,
    },
    /// The session on a link was refused.
    Rejected {
        /// Connection handle.
        conn: ConnectionId,
        /// Reason given by the server.
        reason: String,
    },
    /// The link reported an error and was dropped.
    Error {
        /// Connection handle.
        conn: ConnectionId,
        /// Error description.
        reason: String,
    },
    /// The link is gone.
    Disconnected {
        /// Connection handle.
        conn: ConnectionId,
        /// Why it went away.
        reason: DisconnectReason,
    },
}

/// Why a link was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote side closed the link.
    Closed,
    /// The remote side announced its departure.
    Notified,
    /// The local side disconnected.
    Local,
    /// Nothing was heard for longer than the peer timeout.
    TimedOut,
}

// ── Peers ──────────────────────────────────────────────────────────

/// One link and what is known about the machine behind it.
#[derive(Clone, Debug)]
pub struct Peer {
    conn: ConnectionId,
    state: ConnectionState,
    inbound: bool,
    accepted: bool,
    machine: Option<Arc<MachineInfo>>,
    last_heard: f64,
}

impl Peer {
    fn new(conn: ConnectionId, inbound: bool) -> Self {
        Self {
            conn,
            state: ConnectionState::Disconnected,
            inbound,
            accepted: false,
            machine: None,
            last_heard: 0.0,
        }
    }

    /// Connection handle.
    pub fn conn(&self) -> ConnectionId {
        self.conn
    }

    /// Link state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the remote side opened the link.
    pub fn is_inbound(&self) -> bool {
        self.inbound
    }

    /// Whether the session is accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// The remote machine, once it has identified itself.
    pub fn machine(&self) -> Option<&Arc<MachineInfo>> {
        self.machine.as_ref()
    }

    /// Real time at which the last frame arrived.
    pub fn last_heard(&self) -> f64 {
        self.last_heard
    }

    fn machine_id(&self) -> Option<MachineId> {
        self.machine.as_ref().map(|m| m.id)
    }

    fn transition(&mut self, event: ConnectionEvent) {
        match self.state.on(event) {
            Ok(next) => self.state = next,
            Err(e) => log::debug!("link {}: {e}", self.conn),
        }
    }
}

/// Traffic counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Frames written to the transport.
    pub frames_sent: u64,
    /// Frames read from the transport.
    pub frames_received: u64,
    /// Frames that did not decode.
    pub decode_errors: u64,
    /// Messages dropped because their link was not yet accepted.
    pub dropped_unaccepted: u64,
    /// Received messages injected into the local queue.
    pub messages_injected: u64,
    /// Received messages dropped or rejected by the filter.
    pub messages_filtered: u64,
    /// Peers closed for silence.
    pub peers_timed_out: u64,
    /// Messages the filter asked to hold that were dropped because the
    /// held queue was full.
    pub held_overflow: u64,
}

// ── NetworkBridge ──────────────────────────────────────────────────

/// Game manager component that exchanges messages with peers.
pub struct NetworkBridge {
    name: String,
    config: BridgeConfig,
    transport: Box<dyn Transport>,
    peers: IndexMap<ConnectionId, Peer>,
    filter: Option<MessageFilter>,
    held: Vec<Message>,
    published: HashSet<ActorId>,
    events: Vec<Sender<BridgeEvent>>,
    disconnect_requested: bool,
    last_heartbeat: f64,
    polled: Vec<TransportEvent>,
    stats: BridgeStats,
}

impl NetworkBridge {
    /// A bridge over `transport`.
    ///
    /// # Errors
    ///
    /// [`NetError::Config`] if `config` does not validate.
    pub fn new(config: BridgeConfig, transport: impl Transport) -> Result<Self, NetError> {
        config.validate()?;
        Ok(Self {
            name: NETWORK_BRIDGE_NAME.to_string(),
            config,
            transport: Box::new(transport),
            peers: IndexMap::new(),
            filter: None,
            held: Vec::new(),
            published: HashSet::new(),
            events: Vec::new(),
            disconnect_requested: false,
            last_heartbeat: 0.0,
            polled: Vec::new(),
            stats: BridgeStats::default(),
        })
    }

    /// Register under `name` instead of [`NETWORK_BRIDGE_NAME`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Install the filter consulted for every received message.
    pub fn with_filter(
        mut self,
        filter: impl FnMut(&Message) -> MessageAction + Send + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// A channel carrying every later [`BridgeEvent`].
    pub fn subscribe(&mut self) -> Receiver<BridgeEvent> {
        let (tx, rx) = unbounded();
        self.events.push(tx);
        rx
    }

    /// The active configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether new connection requests are accepted. Servers only.
    pub fn set_accept_new_clients(&mut self, accept: bool) {
        self.config.accept_new_clients = accept;
    }

    /// Open a link to a server. The connection request is sent once the
    /// link is up.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectUnsupported`] on a server bridge, or the
    /// transport's error.
    pub fn connect(&mut self, address: &str) -> Result<ConnectionId, NetError> {
        if self.config.role != BridgeRole::Client {
            return Err(NetError::ConnectUnsupported);
        }
        let conn = self.transport.connect(address)?;
        let mut peer = Peer::new(conn, false);
        peer.transition(ConnectionEvent::ConnectRequested);
        self.peers.insert(conn, peer);
        log::info!("connecting to {address} on link {conn}");
        Ok(conn)
    }

    /// Announce departure to every peer and close all links at the start of
    /// the next step.
    pub fn disconnect(&mut self) {
        self.disconnect_requested = true;
    }

    /// Links in the order they were opened.
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Link by handle.
    pub fn peer(&self, conn: ConnectionId) -> Option<&Peer> {
        self.peers.get(&conn)
    }

    /// Link to the machine `id`.
    pub fn peer_for_machine(&self, id: MachineId) -> Option<&Peer> {
        self.peers.values().find(|p| p.machine_id() == Some(id))
    }

    /// Number of accepted sessions.
    pub fn accepted_count(&self) -> usize {
        self.peers.values().filter(|p| p.accepted).count()
    }

    /// Received messages the filter asked to hold.
    pub fn held_messages(&self) -> usize {
        self.held.len()
    }

    /// Traffic counters.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    fn emit(&mut self, event: BridgeEvent) {
        self.events.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn conn_for_machine(&self, id: MachineId) -> Option<ConnectionId> {
        self.peers
            .values()
            .find(|p| p.machine_id() == Some(id))
            .map(|p| p.conn)
    }

    // ── sending ─────────────────────────────────────────────────

    fn send_bytes(&mut self, conn: ConnectionId, bytes: &[u8]) -> bool {
        match self.transport.send(conn, bytes) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                true
            }
            Err(e) => {
                log::warn!("send on link {conn} failed: {e}");
                self.drop_peer(conn);
                self.emit(BridgeEvent::Error {
                    conn,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    fn send_to(&mut self, conn: ConnectionId, msg: &Message) -> ComponentResult {
        let bytes = to_bytes(msg)?;
        self.send_bytes(conn, &bytes);
        Ok(())
    }

    /// Send `msg` where its destination says: nowhere in particular means
    /// every accepted peer (or every server for a connection request), the
    /// local machine means the local queue, anything else means the link to
    /// that machine.
    fn route(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let targets: Vec<ConnectionId> = match msg.destination_id() {
            Some(id) if id == gm.machine_info().id => {
                gm.send_message(msg.clone())?;
                return Ok(());
            }
            Some(id) => match self.conn_for_machine(id) {
                Some(conn) => vec![conn],
                None => {
                    log::debug!(
                        "no link to {id}, dropping {}",
                        gm.factory().type_name(msg.message_type())
                    );
                    return Ok(());
                }
            },
            None if msg.message_type() == NETCLIENT_REQUEST_CONNECTION => self
                .peers
                .values()
                .filter(|p| !p.inbound && p.state.is_open())
                .map(|p| p.conn)
                .collect(),
            None => self
                .peers
                .values()
                .filter(|p| p.accepted)
                .map(|p| p.conn)
                .collect(),
        };
        if targets.is_empty() {
            return Ok(());
        }
        let bytes = to_bytes(msg)?;
        for conn in targets {
            self.send_bytes(conn, &bytes);
        }
        Ok(())
    }

    /// Forward locally dispatched messages of the configured types. Updates
    /// and deletions only go out for actors whose publication went out.
    fn forward(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let ty = msg.message_type();
        if !gm.is_local(msg) || !self.config.forward_types.contains(&ty) {
            return Ok(());
        }
        if msg.destination_id().is_some_and(|d| d == gm.machine_info().id) {
            return Ok(());
        }
        if let Some(about) = msg.about_actor() {
            let go = match ty {
                INFO_ACTOR_PUBLISHED => {
                    self.published.insert(about);
                    true
                }
                INFO_ACTOR_UPDATED => self.published.contains(&about),
                INFO_ACTOR_DELETED => self.published.remove(&about),
                _ => true,
            };
            if !go {
                return Ok(());
            }
        }
        self.route(msg, gm)
    }

    // ── receiving ───────────────────────────────────────────────

    fn handle_transport_event(&mut self, event: TransportEvent, gm: &mut GmContext<'_>) {
        let now = gm.real_time();
        match event {
            TransportEvent::Opened { conn, inbound } => {
                let peer = self
                    .peers
                    .entry(conn)
                    .or_insert_with(|| Peer::new(conn, inbound));
                peer.transition(ConnectionEvent::Connected);
                peer.last_heard = now;
                log::info!(
                    "link {conn} up ({})",
                    if inbound { "inbound" } else { "outbound" }
                );
                self.emit(BridgeEvent::Connected { conn, inbound });
                if !inbound && self.config.role == BridgeRole::Client {
                    if let Err(e) = self.request_connection(conn, gm) {
                        log::warn!("cannot request a session on link {conn}: {e}");
                    }
                }
            }
            TransportEvent::ConnectFailed { conn, reason } => {
                if let Some(peer) = self.peers.get_mut(&conn) {
                    peer.transition(ConnectionEvent::ConnectFailed);
                }
                self.peers.shift_remove(&conn);
                log::warn!("connection attempt {conn} failed: {reason}");
                self.emit(BridgeEvent::ConnectFailed { conn, reason });
            }
            TransportEvent::Frame { conn, bytes } => {
                self.stats.frames_received += 1;
                self.handle_frame(conn, &bytes, gm);
            }
            TransportEvent::Error { conn, reason } => {
                if let Some(peer) = self.peers.get_mut(&conn) {
                    peer.transition(ConnectionEvent::Error);
                }
                log::warn!("link {conn} failed: {reason}");
                self.drop_peer(conn);
                self.emit(BridgeEvent::Error { conn, reason });
            }
            TransportEvent::Closed { conn } => {
                if self.peers.shift_remove(&conn).is_some() {
                    log::info!("link {conn} closed by peer");
                    self.emit(BridgeEvent::Disconnected {
                        conn,
                        reason: DisconnectReason::Closed,
                    });
                }
            }
        }
    }

    fn request_connection(&mut self, conn: ConnectionId, gm: &mut GmContext<'_>) -> ComponentResult {
        let mut msg = gm.create_message(NETCLIENT_REQUEST_CONNECTION)?;
        gm.machine_info().write_to(&mut msg);
        self.send_to(conn, &msg)
    }

    fn handle_frame(&mut self, conn: ConnectionId, bytes: &[u8], gm: &mut GmContext<'_>) {
        let now = gm.real_time();
        let mut msg = match from_bytes(bytes, gm.factory()) {
            Ok(msg) => msg,
            Err(e) => {
                self.stats.decode_errors += 1;
                log::warn!("dropping undecodable frame from link {conn}: {e}");
                return;
            }
        };
        let ty = msg.message_type();
        let Some(peer) = self.peers.get_mut(&conn) else {
            return;
        };
        peer.last_heard = now;
        if !peer.accepted && !is_connection_control(ty) {
            self.stats.dropped_unaccepted += 1;
            log::warn!(
                "dropping {} from link {conn}: session not accepted",
                gm.factory().type_name(ty)
            );
            return;
        }

        // Learn who is on the other end.
        if matches!(ty, NETCLIENT_REQUEST_CONNECTION | NETSERVER_ACCEPT_CONNECTION) {
            if let Some(mut info) = MachineInfo::read_from(&msg) {
                info.touch(now);
                peer.machine = Some(Arc::new(info));
            }
        }
        if peer.machine.is_none() {
            let mut info = MachineInfo::clone(msg.source());
            info.touch(now);
            peer.machine = Some(Arc::new(info));
        }
        if let Some(machine) = &peer.machine {
            if machine.id == msg.source().id {
                msg.set_source(Arc::clone(machine));
            }
        }

        if let Some(dest) = msg.destination_id() {
            if dest != gm.machine_info().id {
                log::debug!(
                    "ignoring {} addressed to another machine",
                    gm.factory().type_name(ty)
                );
                return;
            }
        }

        match ty {
            NET_HEARTBEAT => {
                let sent = msg.get("SentTime").and_then(ParamValue::as_f64).unwrap_or(0.0);
                let result = gm.create_message(NET_HEARTBEAT_ACK).and_then(|mut ack| {
                    ack.set("SentTime", sent)?;
                    Ok(ack)
                });
                match result {
                    Ok(ack) => {
                        if let Err(e) = self.send_to(conn, &ack) {
                            log::warn!("cannot answer heartbeat on link {conn}: {e}");
                        }
                    }
                    Err(e) => log::warn!("cannot build heartbeat ack: {e}"),
                }
                return;
            }
            NET_HEARTBEAT_ACK => {
                let sent = msg.get("SentTime").and_then(ParamValue::as_f64).unwrap_or(now);
                let ping = ((now - sent).max(0.0) * 1000.0).round() as u32;
                if let Some(machine) = peer.machine.as_mut() {
                    Arc::make_mut(machine).update_ping(ping, now);
                }
                log::trace!("link {conn} ping {ping} ms");
                return;
            }
            NETSERVER_ACCEPT_CONNECTION if self.config.role == BridgeRole::Client => {
                peer.accepted = true;
                let machine = MachineInfo::clone(msg.source());
                log::info!("session accepted by {} on link {conn}", machine.name);
                self.emit(BridgeEvent::Accepted { conn, machine });
            }
            NETSERVER_REJECT_CONNECTION if self.config.role == BridgeRole::Client => {
                let reason = msg
                    .get("RejectionMessage")
                    .and_then(ParamValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                log::warn!("session refused on link {conn}: {reason}");
                self.close_peer(conn);
                self.emit(BridgeEvent::Rejected { conn, reason });
            }
            NETCLIENT_NOTIFY_DISCONNECT => {
                log::info!("{} left (link {conn})", msg.source().name);
                self.close_peer(conn);
                self.emit(BridgeEvent::Disconnected {
                    conn,
                    reason: DisconnectReason::Notified,
                });
            }
            _ => {}
        }

        if is_connection_control(ty) || ty == NETCLIENT_NOTIFY_DISCONNECT {
            self.inject(msg, gm);
        } else {
            self.filter_and_inject(msg, gm);
        }
    }

    fn inject(&mut self, msg: Message, gm: &mut GmContext<'_>) {
        match gm.send_message(msg) {
            Ok(()) => self.stats.messages_injected += 1,
            Err(e) => log::warn!("dropping received message: {e}"),
        }
    }

    fn filter_and_inject(&mut self, msg: Message, gm: &mut GmContext<'_>) {
        let action = match self.filter.as_mut() {
            Some(filter) => filter(&msg),
            None => MessageAction::Send,
        };
        match action {
            MessageAction::Send => self.inject(msg, gm),
            MessageAction::Wait if self.held.len() < self.config.max_held_messages => {
                self.held.push(msg)
            }
            MessageAction::Wait => {
                self.stats.held_overflow += 1;
                log::warn!(
                    "held queue full ({}), dropping {} from {}",
                    self.held.len(),
                    gm.factory().type_name(msg.message_type()),
                    msg.source().name
                );
            }
            MessageAction::Drop => {
                self.stats.messages_filtered += 1;
                log::debug!(
                    "filter dropped {} from {}",
                    gm.factory().type_name(msg.message_type()),
                    msg.source().name
                );
            }
            MessageAction::Reject(reason) => {
                self.stats.messages_filtered += 1;
                if let Err(e) = gm.reject_message(&msg, &reason) {
                    log::warn!("cannot reject message: {e}");
                }
            }
        }
    }

    // ── session control ─────────────────────────────────────────

    fn on_connection_request(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let Some(conn) = self.conn_for_machine(msg.source().id) else {
            return Ok(());
        };
        if self.peers.get(&conn).is_some_and(|p| p.accepted) {
            return Ok(());
        }
        let refusal = if !self.config.accept_new_clients {
            Some("server is not accepting new clients")
        } else if self.config.max_clients > 0 && self.accepted_count() >= self.config.max_clients
        {
            Some("server is full")
        } else {
            None
        };

        if let Some(reason) = refusal {
            let mut reply = gm.create_message(NETSERVER_REJECT_CONNECTION)?;
            reply.set("RejectionMessage", reason)?;
            self.send_to(conn, &reply)?;
            log::warn!(
                "refused connection from {} on link {conn}: {reason}",
                msg.source().name
            );
            self.close_peer(conn);
            self.emit(BridgeEvent::Rejected {
                conn,
                reason: reason.to_string(),
            });
            return Ok(());
        }

        let mut reply = gm.create_message(NETSERVER_ACCEPT_CONNECTION)?;
        gm.machine_info().write_to(&mut reply);
        self.send_to(conn, &reply)?;
        let Some(peer) = self.peers.get_mut(&conn) else {
            return Ok(());
        };
        peer.accepted = true;
        let machine = MachineInfo::clone(msg.source());
        log::info!("accepted {} on link {conn}", machine.name);

        let mut announce = gm.create_message(INFO_CLIENT_CONNECTED)?;
        machine.write_to(&mut announce);
        gm.send_message(announce)?;
        self.emit(BridgeEvent::Accepted { conn, machine });
        Ok(())
    }

    /// Close a link from this side.
    fn close_peer(&mut self, conn: ConnectionId) {
        if let Some(mut peer) = self.peers.shift_remove(&conn) {
            peer.transition(ConnectionEvent::DisconnectRequested);
            self.transport.close(conn);
            peer.transition(ConnectionEvent::Disconnected);
        }
    }

    /// Forget a link the transport already lost.
    fn drop_peer(&mut self, conn: ConnectionId) {
        if self.peers.shift_remove(&conn).is_some() {
            self.transport.close(conn);
        }
    }

    fn disconnect_all(&mut self, gm: &mut GmContext<'_>) {
        let conns: Vec<ConnectionId> = self.peers.keys().copied().collect();
        if conns.is_empty() {
            return;
        }
        match gm.create_message(NETCLIENT_NOTIFY_DISCONNECT) {
            Ok(mut notice) => {
                gm.machine_info().write_to(&mut notice);
                let accepted: Vec<ConnectionId> = self
                    .peers
                    .values()
                    .filter(|p| p.accepted)
                    .map(|p| p.conn)
                    .collect();
                match to_bytes(&notice) {
                    Ok(bytes) => {
                        for conn in accepted {
                            self.send_bytes(conn, &bytes);
                        }
                    }
                    Err(e) => log::warn!("cannot encode disconnect notice: {e}"),
                }
            }
            Err(e) => log::warn!("cannot build disconnect notice: {e}"),
        }
        for conn in conns {
            if self.peers.contains_key(&conn) {
                self.close_peer(conn);
                self.emit(BridgeEvent::Disconnected {
                    conn,
                    reason: DisconnectReason::Local,
                });
            }
        }
        log::info!("disconnected from all peers");
    }

    // ── liveness ────────────────────────────────────────────────

    fn heartbeat(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        let now = gm.real_time();
        if now - self.last_heartbeat < self.config.heartbeat_interval {
            return Ok(());
        }
        self.last_heartbeat = now;
        let targets: Vec<ConnectionId> = self
            .peers
            .values()
            .filter(|p| p.accepted)
            .map(|p| p.conn)
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        let mut beat = gm.create_message(NET_HEARTBEAT)?;
        beat.set("SentTime", now)?;
        let bytes = to_bytes(&beat)?;
        for conn in targets {
            self.send_bytes(conn, &bytes);
        }
        Ok(())
    }

    fn evict_silent(&mut self, now: f64) {
        let timeout = self.config.peer_timeout;
        let silent: Vec<ConnectionId> = self
            .peers
            .values()
            .filter(|p| p.state.is_open() && now - p.last_heard > timeout)
            .map(|p| p.conn)
            .collect();
        for conn in silent {
            log::warn!("link {conn} silent for more than {timeout}s, closing");
            self.stats.peers_timed_out += 1;
            self.close_peer(conn);
            self.emit(BridgeEvent::Disconnected {
                conn,
                reason: DisconnectReason::TimedOut,
            });
        }
    }
}

impl GmComponent for NetworkBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Higher
    }

    fn on_added_to_gm(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        self.last_heartbeat = gm.real_time();
        log::info!(
            "network bridge {:?} added as {:?}",
            self.name,
            self.config.role
        );
        Ok(())
    }

    fn on_removed_from_gm(&mut self, gm: &mut GmContext<'_>) {
        self.disconnect_all(gm);
    }

    fn pre_frame(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        if self.disconnect_requested {
            self.disconnect_requested = false;
            self.disconnect_all(gm);
        }

        for msg in std::mem::take(&mut self.held) {
            self.filter_and_inject(msg, gm);
        }

        let mut polled = std::mem::take(&mut self.polled);
        self.transport.poll(&mut polled);
        for event in polled.drain(..) {
            self.handle_transport_event(event, gm);
        }
        self.polled = polled;

        self.heartbeat(gm)?;
        self.evict_silent(gm.real_time());
        Ok(())
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        if gm.is_local(msg) {
            return self.forward(msg, gm);
        }
        if msg.message_type() == NETCLIENT_REQUEST_CONNECTION
            && self.config.role == BridgeRole::Server
        {
            return self.on_connection_request(msg, gm);
        }
        Ok(())
    }

    fn dispatch_network_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        self.route(msg, gm)
    }
}

impl fmt::Debug for NetworkBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkBridge")
            .field("name", &self.name)
            .field("role", &self.config.role)
            .field("peers", &self.peers.len())
            .field("held", &self.held.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryHub;

    #[test]
    fn servers_cannot_connect() {
        let hub = MemoryHub::new();
        let mut bridge = NetworkBridge::new(BridgeConfig::default(), hub.endpoint()).unwrap();
        assert!(matches!(
            bridge.connect("anywhere"),
            Err(NetError::ConnectUnsupported)
        ));
    }

    #[test]
    fn invalid_config_is_refused() {
        let hub = MemoryHub::new();
        let cfg = BridgeConfig {
            peer_timeout: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            NetworkBridge::new(cfg, hub.endpoint()),
            Err(NetError::Config(_))
        ));
    }

    #[test]
    fn connect_registers_a_connecting_peer() {
        let hub = MemoryHub::new();
        let _server = hub.listen("srv").unwrap();
        let mut bridge = NetworkBridge::new(BridgeConfig::client(), hub.endpoint()).unwrap();
        let conn = bridge.connect("srv").unwrap();
        let peer = bridge.peer(conn).unwrap();
        assert_eq!(peer.state(), ConnectionState::Connecting);
        assert!(!peer.is_accepted());
        assert!(!peer.is_inbound());
        assert_eq!(bridge.accepted_count(), 0);
    }

    #[test]
    fn events_reach_every_subscriber() {
        let hub = MemoryHub::new();
        let mut bridge = NetworkBridge::new(BridgeConfig::client(), hub.endpoint()).unwrap();
        let a = bridge.subscribe();
        let b = bridge.subscribe();
        drop(b);
        bridge.emit(BridgeEvent::Rejected {
            conn: ConnectionId(1),
            reason: "full".into(),
        });
        assert_eq!(a.try_iter().count(), 1);
        assert_eq!(bridge.events.len(), 1);
    }
}
