//! The server logger component.
//!
//! [`ServerLogger`] is driven entirely by messages:
//!
//! | request | from IDLE | from RECORD | from PLAYBACK |
//! |---------|-----------|-------------|---------------|
//! | `LOG_REQ_CHANGESTATE_RECORD`   | start recording | status to requester | rejected |
//! | `LOG_REQ_CHANGESTATE_PLAYBACK` | start playback  | rejected | status to requester |
//! | `LOG_REQ_CHANGESTATE_IDLE`     | status to requester | close the log | stop playback |
//! | `LOG_REQ_INSERT_TAG`           | rejected | tag written | rejected |
//! | `LOG_REQ_CAPTURE_KEYFRAME`     | rejected | keyframe written | rejected |
//!
//! Every state change is announced to all with `LOG_INFO_STATUS`.
//!
//! While recording, every dispatched message except ticks, logger traffic
//! and the configured ignore lists is appended to the log with the sim
//! time of its dispatch. During playback, recorded messages are sent back
//! into the game manager from `pre_frame` once the sim time elapsed since
//! playback started reaches their offset in the recording. Played-back
//! messages carry a synthetic logger machine as their source, so actors
//! from the log are mirrored as remote actors.

use std::io::{Read, Write};
use std::sync::Arc;

use indexmap::IndexSet;

use simgm_core::builtin::{
    is_tick, COMMAND_PAUSE, COMMAND_RESUME, INFO_ACTOR_CREATED, INFO_ACTOR_DELETED,
    INFO_ACTOR_UPDATED, INFO_TIMER_ELAPSED, LOG_INFO_STATUS, LOG_REQ_CAPTURE_KEYFRAME,
    LOG_REQ_CHANGESTATE_IDLE, LOG_REQ_CHANGESTATE_PLAYBACK, LOG_REQ_CHANGESTATE_RECORD,
    LOG_REQ_INSERT_TAG, REQUEST_PAUSE, REQUEST_RESUME, TICK_LOCAL,
};
use simgm_core::{ActorId, MachineId, MachineInfo, Message, MessageTypeId};
use simgm_engine::{ComponentPriority, ComponentResult, GmComponent, GmContext};

use crate::config::LoggerConfig;
use crate::error::LogError;
use crate::reader::LogReader;
use crate::status::{LogStatus, LoggerState};
use crate::store::{is_valid_log_name, LogStore};
use crate::types::{LogEntry, LogIndex, LogTag, RecordedMessage};
use crate::writer::LogWriter;

/// Name under which [`ServerLogger`] registers.
pub const SERVER_LOGGER_NAME: &str = "ServerLoggerComponent";

/// Name of the keyframe written when a recording starts.
pub const FIRST_KEYFRAME_NAME: &str = "Default First Keyframe";

/// Machine id stamped as the source of played-back messages.
pub const PLAYBACK_MACHINE_ID: MachineId = MachineId((0x004c_4f47 << 96) | 1);

/// Machine name stamped as the source of played-back messages.
pub const PLAYBACK_MACHINE_NAME: &str = "ServerLogger";

fn is_logger_traffic(ty: MessageTypeId) -> bool {
    (LOG_INFO_STATUS.0..=LOG_REQ_CAPTURE_KEYFRAME.0).contains(&ty.0)
}

/// Types that are recorded but never re-injected.
fn skipped_on_playback(ty: MessageTypeId) -> bool {
    is_tick(ty)
        || is_logger_traffic(ty)
        || matches!(
            ty,
            COMMAND_PAUSE | COMMAND_RESUME | REQUEST_PAUSE | REQUEST_RESUME | INFO_TIMER_ELAPSED
        )
}

/// Types re-injected locally only; the remote side derives them itself.
fn local_only_on_playback(ty: MessageTypeId) -> bool {
    matches!(ty, INFO_ACTOR_CREATED | INFO_ACTOR_UPDATED | INFO_ACTOR_DELETED)
}

type Writer = LogWriter<Box<dyn Write + Send>>;
type Reader = LogReader<Box<dyn Read + Send>>;

/// Active playback session.
struct Playback {
    reader: Reader,
    /// Recording time of the first keyframe (or first message).
    log_start: f64,
    /// Game manager sim time when playback started.
    started_at: f64,
    next: Option<RecordedMessage>,
}

/// Records dispatched messages into a [`LogStore`] and plays them back.
pub struct ServerLogger {
    config: LoggerConfig,
    store: Box<dyn LogStore>,
    ignored_types: IndexSet<MessageTypeId>,
    ignored_actors: IndexSet<ActorId>,
    state: LoggerState,
    log_file: String,
    sim_time: f64,
    record_duration: f64,
    num_messages: u32,
    writer: Option<Writer>,
    playback: Option<Playback>,
    source: Arc<MachineInfo>,
}

impl ServerLogger {
    /// Idle logger over `store`.
    ///
    /// # Errors
    ///
    /// [`LogError::Config`] when `config` does not validate.
    pub fn new(config: LoggerConfig, store: Box<dyn LogStore>) -> Result<Self, LogError> {
        config.validate()?;
        Ok(Self {
            ignored_types: config.ignored_types.iter().copied().collect(),
            ignored_actors: config.ignored_actors.iter().copied().collect(),
            log_file: config.log_name.clone(),
            config,
            store,
            state: LoggerState::Idle,
            sim_time: 0.0,
            record_duration: 0.0,
            num_messages: 0,
            writer: None,
            playback: None,
            source: Arc::new(MachineInfo::new(PLAYBACK_MACHINE_ID, PLAYBACK_MACHINE_NAME)),
        })
    }

    /// Current state.
    pub fn state(&self) -> LoggerState {
        self.state
    }

    /// Snapshot of the logger, as sent in `LOG_INFO_STATUS`.
    pub fn status(&self) -> LogStatus {
        LogStatus {
            state: self.state,
            current_sim_time: self.sim_time,
            log_file: self.log_file.clone(),
            record_duration: self.record_duration,
            num_messages: self.num_messages,
        }
    }

    /// Startup configuration.
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// The backing log store.
    pub fn store(&self) -> &dyn LogStore {
        self.store.as_ref()
    }

    /// Mutable log store, for listing or deleting logs.
    pub fn store_mut(&mut self) -> &mut dyn LogStore {
        self.store.as_mut()
    }

    /// Never record messages of type `ty`. Returns false if already ignored.
    pub fn ignore_type(&mut self, ty: MessageTypeId) -> bool {
        self.ignored_types.insert(ty)
    }

    /// Record messages of type `ty` again.
    pub fn unignore_type(&mut self, ty: MessageTypeId) -> bool {
        self.ignored_types.shift_remove(&ty)
    }

    /// Never record messages sent by or about `actor`.
    pub fn ignore_actor(&mut self, actor: ActorId) -> bool {
        self.ignored_actors.insert(actor)
    }

    /// Record messages sent by or about `actor` again.
    pub fn unignore_actor(&mut self, actor: ActorId) -> bool {
        self.ignored_actors.shift_remove(&actor)
    }

    /// Ignored message types, in insertion order.
    pub fn ignored_types(&self) -> impl Iterator<Item = MessageTypeId> + '_ {
        self.ignored_types.iter().copied()
    }

    /// Ignored actors, in insertion order.
    pub fn ignored_actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.ignored_actors.iter().copied()
    }

    /// Tags, keyframes and totals of the stored log `name`.
    pub fn log_index(&self, name: &str) -> Result<LogIndex, LogError> {
        LogReader::open(self.store.open(name)?)?.index()
    }

    fn should_record(&self, msg: &Message) -> bool {
        let ty = msg.message_type();
        if is_logger_traffic(ty) || self.ignored_types.contains(&ty) {
            return false;
        }
        if is_tick(ty) && !self.config.record_tick_messages {
            return false;
        }
        let ignored = |a: Option<ActorId>| a.is_some_and(|a| self.ignored_actors.contains(&a));
        !(ignored(msg.about_actor()) || ignored(msg.sending_actor()))
    }

    fn requested_log_name(&self, msg: &Message) -> String {
        match msg.get("LogFileName").and_then(|v| v.as_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.config.log_name.clone(),
        }
    }

    // ── status ──────────────────────────────────────────────────

    fn status_message(&self, gm: &GmContext<'_>) -> Result<Message, LogError> {
        let mut msg = gm.create_message(LOG_INFO_STATUS)?;
        self.status().write_to(&mut msg)?;
        Ok(msg)
    }

    /// Announce the current status locally and to the network.
    fn broadcast_status(&self, gm: &mut GmContext<'_>) -> Result<(), LogError> {
        let msg = self.status_message(gm)?;
        gm.send_network_message(msg.clone());
        gm.send_message(msg)?;
        Ok(())
    }

    /// Answer `request` with the current status, addressed to its sender.
    fn reply_status(&self, request: &Message, gm: &mut GmContext<'_>) -> Result<(), LogError> {
        let mut msg = self.status_message(gm)?;
        msg.set_destination(Some(Arc::clone(request.source())));
        if gm.is_local(request) {
            gm.send_message(msg)?;
        } else {
            gm.send_network_message(msg);
        }
        Ok(())
    }

    fn reject(
        &self,
        request: &Message,
        operation: &'static str,
        gm: &mut GmContext<'_>,
    ) -> Result<(), LogError> {
        let reason = LogError::InvalidState {
            operation,
            state: self.state.verb(),
        };
        self.reject_with(request, &reason, gm)
    }

    fn reject_with(
        &self,
        request: &Message,
        reason: &LogError,
        gm: &mut GmContext<'_>,
    ) -> Result<(), LogError> {
        log::warn!("logger request rejected: {reason}");
        gm.reject_message(request, &reason.to_string())?;
        Ok(())
    }

    // ── state changes ───────────────────────────────────────────

    fn handle_request(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> Result<(), LogError> {
        match msg.message_type() {
            LOG_REQ_CHANGESTATE_RECORD => match self.state {
                LoggerState::Idle => {
                    let name = self.requested_log_name(msg);
                    match self.start_record(&name, gm.sim_time()) {
                        Ok(()) => self.broadcast_status(gm),
                        Err(e) => self.reject_with(msg, &e, gm),
                    }
                }
                LoggerState::Record => self.reply_status(msg, gm),
                LoggerState::Playback => self.reject(msg, "record", gm),
            },
            LOG_REQ_CHANGESTATE_PLAYBACK => match self.state {
                LoggerState::Idle => {
                    let name = self.requested_log_name(msg);
                    match self.start_playback(&name, gm.sim_time()) {
                        Ok(()) => self.broadcast_status(gm),
                        Err(e) => self.reject_with(msg, &e, gm),
                    }
                }
                LoggerState::Playback => self.reply_status(msg, gm),
                LoggerState::Record => self.reject(msg, "play back", gm),
            },
            LOG_REQ_CHANGESTATE_IDLE => match self.state {
                LoggerState::Idle => self.reply_status(msg, gm),
                LoggerState::Record | LoggerState::Playback => {
                    self.stop()?;
                    self.broadcast_status(gm)
                }
            },
            LOG_REQ_INSERT_TAG | LOG_REQ_CAPTURE_KEYFRAME => {
                let ty = msg.message_type();
                if self.writer.is_none() {
                    let operation = if ty == LOG_REQ_INSERT_TAG {
                        "insert a tag"
                    } else {
                        "capture a keyframe"
                    };
                    return self.reject(msg, operation, gm);
                }
                let Some(writer) = self.writer.as_mut() else {
                    return Ok(());
                };
                let name = msg.get("Name").and_then(|v| v.as_str()).unwrap_or_default();
                let description = msg
                    .get("Description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if ty == LOG_REQ_INSERT_TAG {
                    writer.write_tag(&LogTag {
                        name: name.to_string(),
                        description: description.to_string(),
                        sim_time: gm.sim_time(),
                    })?;
                    log::debug!("tag {name:?} at {}", gm.sim_time());
                } else {
                    let kf = writer.write_keyframe(name, description, gm.sim_time())?;
                    log::debug!("keyframe {name:?} after {} messages", kf.message_index);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn start_record(&mut self, name: &str, now: f64) -> Result<(), LogError> {
        if !is_valid_log_name(name) {
            return Err(LogError::InvalidLogName {
                name: name.to_string(),
            });
        }
        let mut writer = LogWriter::new(self.store.create(name)?)?;
        writer.write_keyframe(FIRST_KEYFRAME_NAME, "", now)?;
        self.writer = Some(writer);
        self.log_file = name.to_string();
        self.record_duration = 0.0;
        self.num_messages = 0;
        self.state = LoggerState::Record;
        log::info!("recording to log {name:?} at sim time {now}");
        Ok(())
    }

    fn start_playback(&mut self, name: &str, now: f64) -> Result<(), LogError> {
        let mut reader = LogReader::open(self.store.open(name)?)?;
        let mut log_start = None;
        let mut next = None;
        while let Some(entry) = reader.next_entry()? {
            match entry {
                LogEntry::Keyframe(k) => {
                    log_start.get_or_insert(k.sim_time);
                }
                LogEntry::Tag(t) => {
                    log_start.get_or_insert(t.sim_time);
                }
                LogEntry::Message(m) => {
                    log_start.get_or_insert(m.sim_time);
                    next = Some(m);
                    break;
                }
                LogEntry::End(_) => break,
            }
        }
        self.playback = Some(Playback {
            reader,
            log_start: log_start.unwrap_or_default(),
            started_at: now,
            next,
        });
        self.log_file = name.to_string();
        self.record_duration = 0.0;
        self.num_messages = 0;
        self.state = LoggerState::Playback;
        log::info!("playing back log {name:?} from sim time {now}");
        Ok(())
    }

    /// Close the recording or playback and go idle.
    fn stop(&mut self) -> Result<(), LogError> {
        if let Some(writer) = self.writer.take() {
            let written = writer.messages_written();
            writer.finish(self.record_duration)?;
            log::info!(
                "closed log {:?}: {written} messages over {}s",
                self.log_file,
                self.record_duration
            );
        }
        if self.playback.take().is_some() {
            log::info!(
                "stopped playback of {:?} after {} messages",
                self.log_file,
                self.num_messages
            );
        }
        self.state = LoggerState::Idle;
        Ok(())
    }

    // ── recording and playback ──────────────────────────────────

    fn record(&mut self, msg: &Message) -> Result<(), LogError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_message(msg, self.sim_time)?;
            self.num_messages = self.num_messages.saturating_add(1);
        }
        Ok(())
    }

    /// Send every recorded message whose offset has been reached. Returns
    /// whether the log is exhausted.
    fn play_due(&mut self, gm: &mut GmContext<'_>) -> Result<bool, LogError> {
        let Some(pb) = self.playback.as_mut() else {
            return Ok(false);
        };
        let elapsed = gm.sim_time() - pb.started_at;
        self.record_duration = elapsed;
        loop {
            if pb.next.is_none() {
                pb.next = pb.reader.next_message()?;
            }
            let Some(next) = pb.next.as_ref() else {
                return Ok(true);
            };
            if next.sim_time - pb.log_start > elapsed {
                return Ok(false);
            }
            let Some(recorded) = pb.next.take() else {
                return Ok(false);
            };
            let ty = match recorded.type_id() {
                Some(ty) if !skipped_on_playback(ty) => ty,
                _ => continue,
            };
            let mut msg = match recorded.decode(gm.factory()) {
                Ok(msg) => msg,
                Err(e) => {
                    log::warn!("skipping unreadable message in {:?}: {e}", self.log_file);
                    continue;
                }
            };
            msg.set_source(Arc::clone(&self.source));
            msg.set_timestamp(gm.sim_time());
            if !local_only_on_playback(ty) {
                gm.send_network_message(msg.clone());
            }
            gm.send_message(msg)?;
            self.num_messages = self.num_messages.saturating_add(1);
        }
    }

    fn finish_playback(&mut self, gm: &mut GmContext<'_>) -> Result<(), LogError> {
        log::info!("end of log {:?}", self.log_file);
        self.stop()?;
        if self.config.pause_at_end {
            gm.request_pause(true);
        }
        self.broadcast_status(gm)
    }
}

impl GmComponent for ServerLogger {
    fn name(&self) -> &str {
        SERVER_LOGGER_NAME
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Lowest
    }

    fn on_added_to_gm(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        self.sim_time = gm.sim_time();
        log::info!("server logger ready, default log {:?}", self.config.log_name);
        Ok(())
    }

    fn on_removed_from_gm(&mut self, _gm: &mut GmContext<'_>) {
        if let Err(e) = self.stop() {
            log::warn!("failed to close log {:?}: {e}", self.log_file);
        }
    }

    fn pre_frame(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        self.sim_time = gm.sim_time();
        if self.state != LoggerState::Playback {
            return Ok(());
        }
        match self.play_due(gm) {
            Ok(false) => Ok(()),
            Ok(true) => Ok(self.finish_playback(gm)?),
            Err(e) => {
                log::warn!("playback of {:?} failed: {e}", self.log_file);
                self.stop()?;
                self.broadcast_status(gm)?;
                Err(e.into())
            }
        }
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let ty = msg.message_type();
        if ty == TICK_LOCAL {
            self.sim_time = gm.sim_time();
            if self.state == LoggerState::Record {
                let delta = msg.get("DeltaSimTime").and_then(|v| v.as_f32());
                self.record_duration += f64::from(delta.unwrap_or_default());
            }
        }
        if self.state == LoggerState::Record && self.should_record(msg) {
            self.record(msg)?;
        }
        if is_logger_traffic(ty) {
            self.handle_request(msg, gm)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServerLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLogger")
            .field("state", &self.state)
            .field("log_file", &self.log_file)
            .field("num_messages", &self.num_messages)
            .field("ignored_types", &self.ignored_types.len())
            .field("ignored_actors", &self.ignored_actors.len())
            .finish_non_exhaustive()
    }
}
