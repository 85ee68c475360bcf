//! Built-in message types shared by every game manager.
//!
//! Ids are stable and part of the wire contract. Application types start at
//! [`MessageTypeId::FIRST_USER`].

use crate::error::FactoryError;
use crate::factory::{MessageFactory, MessageType, PrototypeBuilder};
use crate::id::MessageTypeId;
use crate::param::{MessageParameter, ParamType};

// ── Ticks ───────────────────────────────────────────────────────

/// Local simulation tick, delivered to components and local actors.
pub const TICK_LOCAL: MessageTypeId = MessageTypeId(1);
/// Remote tick, delivered to components and remote (mirrored) actors.
pub const TICK_REMOTE: MessageTypeId = MessageTypeId(2);
/// End of frame, delivered to components only.
pub const TICK_END_OF_FRAME: MessageTypeId = MessageTypeId(3);

// ── Info ────────────────────────────────────────────────────────

/// A timer fired.
pub const INFO_TIMER_ELAPSED: MessageTypeId = MessageTypeId(10);
/// A local actor entered the world.
pub const INFO_ACTOR_CREATED: MessageTypeId = MessageTypeId(11);
/// A local actor was published to remote peers.
pub const INFO_ACTOR_PUBLISHED: MessageTypeId = MessageTypeId(12);
/// An actor was deleted.
pub const INFO_ACTOR_DELETED: MessageTypeId = MessageTypeId(13);
/// An actor's properties changed.
pub const INFO_ACTOR_UPDATED: MessageTypeId = MessageTypeId(14);
/// A network client connected to this server.
pub const INFO_CLIENT_CONNECTED: MessageTypeId = MessageTypeId(15);
/// The simulation paused.
pub const INFO_PAUSED: MessageTypeId = MessageTypeId(17);
/// The simulation resumed.
pub const INFO_RESUMED: MessageTypeId = MessageTypeId(18);
/// The simulation restarted.
pub const INFO_RESTARTED: MessageTypeId = MessageTypeId(19);
/// Sim time or time scale changed.
pub const INFO_TIME_CHANGED: MessageTypeId = MessageTypeId(20);
/// An application-defined named game event.
pub const INFO_GAME_EVENT: MessageTypeId = MessageTypeId(21);

// ── Commands and requests ───────────────────────────────────────

/// Pause the simulation.
pub const COMMAND_PAUSE: MessageTypeId = MessageTypeId(51);
/// Resume the simulation.
pub const COMMAND_RESUME: MessageTypeId = MessageTypeId(52);
/// Ask the authority to pause.
pub const REQUEST_PAUSE: MessageTypeId = MessageTypeId(81);
/// Ask the authority to resume.
pub const REQUEST_RESUME: MessageTypeId = MessageTypeId(82);
/// A request was rejected; the causing message is the request.
pub const SERVER_REQUEST_REJECTED: MessageTypeId = MessageTypeId(110);

// ── Network control ─────────────────────────────────────────────

/// Client asks a server for a connection.
pub const NETCLIENT_REQUEST_CONNECTION: MessageTypeId = MessageTypeId(150);
/// Client announces it is disconnecting.
pub const NETCLIENT_NOTIFY_DISCONNECT: MessageTypeId = MessageTypeId(151);
/// Server accepts a connection request.
pub const NETSERVER_ACCEPT_CONNECTION: MessageTypeId = MessageTypeId(152);
/// Server rejects a connection request.
pub const NETSERVER_REJECT_CONNECTION: MessageTypeId = MessageTypeId(153);
/// Presence probe carrying the sender's real time.
pub const NET_HEARTBEAT: MessageTypeId = MessageTypeId(156);
/// Echo of a [`NET_HEARTBEAT`].
pub const NET_HEARTBEAT_ACK: MessageTypeId = MessageTypeId(157);

// ── Logger ──────────────────────────────────────────────────────

/// Logger status report.
pub const LOG_INFO_STATUS: MessageTypeId = MessageTypeId(200);
/// Switch the logger to playback.
pub const LOG_REQ_CHANGESTATE_PLAYBACK: MessageTypeId = MessageTypeId(201);
/// Switch the logger to record.
pub const LOG_REQ_CHANGESTATE_RECORD: MessageTypeId = MessageTypeId(202);
/// Switch the logger to idle.
pub const LOG_REQ_CHANGESTATE_IDLE: MessageTypeId = MessageTypeId(203);
/// Insert a named tag into the current recording.
pub const LOG_REQ_INSERT_TAG: MessageTypeId = MessageTypeId(204);
/// Insert a keyframe marker into the current recording.
pub const LOG_REQ_CAPTURE_KEYFRAME: MessageTypeId = MessageTypeId(205);

/// Whether `id` is one of the three tick types.
pub fn is_tick(id: MessageTypeId) -> bool {
    matches!(id, TICK_LOCAL | TICK_REMOTE | TICK_END_OF_FRAME)
}

/// Whether `id` is a connection-management message. These are the only
/// messages a network peer may send before its connection is accepted.
pub fn is_connection_control(id: MessageTypeId) -> bool {
    matches!(
        id,
        NETCLIENT_REQUEST_CONNECTION | NETSERVER_ACCEPT_CONNECTION | NETSERVER_REJECT_CONNECTION
    )
}

// ── Schemas ─────────────────────────────────────────────────────

fn empty() -> Vec<MessageParameter> {
    Vec::new()
}

fn tick() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("DeltaSimTime", ParamType::Float),
        MessageParameter::new("DeltaRealTime", ParamType::Float),
        MessageParameter::new("SimTimeScale", ParamType::Float),
        MessageParameter::new("SimulationTime", ParamType::Double),
    ]
}

fn timer_elapsed() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("TimerName", ParamType::String),
        MessageParameter::new("LateTime", ParamType::Float),
    ]
}

fn actor_update() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("Name", ParamType::String),
        MessageParameter::new("ActorTypeName", ParamType::String),
        MessageParameter::new("ActorTypeCategory", ParamType::String),
        MessageParameter::new("UpdatedProperties", ParamType::Group),
    ]
}

fn machine_info() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("Name", ParamType::String),
        MessageParameter::new("UniqueId", ParamType::String),
        MessageParameter::new("HostName", ParamType::String),
        MessageParameter::new("IpAddress", ParamType::String),
        MessageParameter::new("Port", ParamType::UnsignedInt),
        MessageParameter::new("Ping", ParamType::UnsignedInt),
    ]
}

fn restarted() -> Vec<MessageParameter> {
    vec![MessageParameter::new("Reason", ParamType::String)]
}

fn time_changed() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("RealTime", ParamType::Double),
        MessageParameter::new("SimulationTime", ParamType::Double),
        MessageParameter::new("TimeScale", ParamType::Float),
    ]
}

fn game_event() -> Vec<MessageParameter> {
    vec![MessageParameter::new("EventName", ParamType::String)]
}

fn rejected() -> Vec<MessageParameter> {
    vec![MessageParameter::new("Cause", ParamType::String)]
}

fn reject_connection() -> Vec<MessageParameter> {
    vec![MessageParameter::new("RejectionMessage", ParamType::String)]
}

fn heartbeat() -> Vec<MessageParameter> {
    vec![MessageParameter::new("SentTime", ParamType::Double)]
}

fn log_status() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("StateEnum", ParamType::String),
        MessageParameter::new("CurrentSimTime", ParamType::Double),
        MessageParameter::new("LogFile", ParamType::String),
        MessageParameter::new("CurrentRecordDuration", ParamType::Double),
        MessageParameter::new("NumRecordedMessages", ParamType::UnsignedInt),
    ]
}

fn log_file() -> Vec<MessageParameter> {
    vec![MessageParameter::new("LogFileName", ParamType::String)]
}

fn log_marker() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("Name", ParamType::String),
        MessageParameter::new("Description", ParamType::String),
    ]
}

const BUILTINS: &[(MessageTypeId, &str, PrototypeBuilder)] = &[
    (TICK_LOCAL, "TICK_LOCAL", tick),
    (TICK_REMOTE, "TICK_REMOTE", tick),
    (TICK_END_OF_FRAME, "TICK_END_OF_FRAME", tick),
    (INFO_TIMER_ELAPSED, "INFO_TIMER_ELAPSED", timer_elapsed),
    (INFO_ACTOR_CREATED, "INFO_ACTOR_CREATED", actor_update),
    (INFO_ACTOR_PUBLISHED, "INFO_ACTOR_PUBLISHED", actor_update),
    (INFO_ACTOR_DELETED, "INFO_ACTOR_DELETED", empty),
    (INFO_ACTOR_UPDATED, "INFO_ACTOR_UPDATED", actor_update),
    (INFO_CLIENT_CONNECTED, "INFO_CLIENT_CONNECTED", machine_info),
    (INFO_PAUSED, "INFO_PAUSED", empty),
    (INFO_RESUMED, "INFO_RESUMED", empty),
    (INFO_RESTARTED, "INFO_RESTARTED", restarted),
    (INFO_TIME_CHANGED, "INFO_TIME_CHANGED", time_changed),
    (INFO_GAME_EVENT, "INFO_GAME_EVENT", game_event),
    (COMMAND_PAUSE, "COMMAND_PAUSE", empty),
    (COMMAND_RESUME, "COMMAND_RESUME", empty),
    (REQUEST_PAUSE, "REQUEST_PAUSE", empty),
    (REQUEST_RESUME, "REQUEST_RESUME", empty),
    (SERVER_REQUEST_REJECTED, "SERVER_REQUEST_REJECTED", rejected),
    (
        NETCLIENT_REQUEST_CONNECTION,
        "NETCLIENT_REQUEST_CONNECTION",
        machine_info,
    ),
    (
        NETCLIENT_NOTIFY_DISCONNECT,
        "NETCLIENT_NOTIFY_DISCONNECT",
        machine_info,
    ),
    (
        NETSERVER_ACCEPT_CONNECTION,
        "NETSERVER_ACCEPT_CONNECTION",
        machine_info,
    ),
    (
        NETSERVER_REJECT_CONNECTION,
        "NETSERVER_REJECT_CONNECTION",
        reject_connection,
    ),
    (NET_HEARTBEAT, "NET_HEARTBEAT", heartbeat),
    (NET_HEARTBEAT_ACK, "NET_HEARTBEAT_ACK", heartbeat),
    (LOG_INFO_STATUS, "LOG_INFO_STATUS", log_status),
    (
        LOG_REQ_CHANGESTATE_PLAYBACK,
        "LOG_REQ_CHANGESTATE_PLAYBACK",
        log_file,
    ),
    (LOG_REQ_CHANGESTATE_RECORD, "LOG_REQ_CHANGESTATE_RECORD", log_file),
    (LOG_REQ_CHANGESTATE_IDLE, "LOG_REQ_CHANGESTATE_IDLE", empty),
    (LOG_REQ_INSERT_TAG, "LOG_REQ_INSERT_TAG", log_marker),
    (LOG_REQ_CAPTURE_KEYFRAME, "LOG_REQ_CAPTURE_KEYFRAME", log_marker),
];

/// Register every built-in type with `factory`. Safe to call repeatedly.
pub fn register_builtins(factory: &mut MessageFactory) -> Result<(), FactoryError> {
    for &(id, name, builder) in BUILTINS {
        factory.register(MessageType::new(id, name), builder)?;
    }
    Ok(())
}
