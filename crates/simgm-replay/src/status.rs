//! Logger state and the `LOG_INFO_STATUS` report.

use std::fmt;

use simgm_core::Message;

use crate::error::LogError;

/// Operating state of a [`ServerLogger`](crate::ServerLogger).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoggerState {
    /// Neither recording nor playing back.
    #[default]
    Idle,
    /// Recording dispatched messages into a log.
    Record,
    /// Re-injecting messages from a log.
    Playback,
}

impl LoggerState {
    /// Name carried in the `StateEnum` parameter of a status message.
    pub fn as_str(self) -> &'static str {
        match self {
            LoggerState::Idle => "LOGGER_STATE_IDLE",
            LoggerState::Record => "LOGGER_STATE_RECORD",
            LoggerState::Playback => "LOGGER_STATE_PLAYBACK",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOGGER_STATE_IDLE" => Some(LoggerState::Idle),
            "LOGGER_STATE_RECORD" => Some(LoggerState::Record),
            "LOGGER_STATE_PLAYBACK" => Some(LoggerState::Playback),
            _ => None,
        }
    }

    pub(crate) fn verb(self) -> &'static str {
        match self {
            LoggerState::Idle => "idle",
            LoggerState::Record => "recording",
            LoggerState::Playback => "playing back",
        }
    }
}

impl fmt::Display for LoggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a logger, as broadcast in `LOG_INFO_STATUS`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogStatus {
    /// Current state.
    pub state: LoggerState,
    /// Simulation time when the snapshot was taken.
    pub current_sim_time: f64,
    /// Name of the active (or last used) log.
    pub log_file: String,
    /// Simulation time recorded (or played back) so far.
    pub record_duration: f64,
    /// Messages recorded (or played back) so far.
    pub num_messages: u32,
}

impl LogStatus {
    /// Fill the parameters of a `LOG_INFO_STATUS` message.
    pub fn write_to(&self, msg: &mut Message) -> Result<(), LogError> {
        msg.set("StateEnum", self.state.as_str())?;
        msg.set("CurrentSimTime", self.current_sim_time)?;
        msg.set("LogFile", self.log_file.as_str())?;
        msg.set("CurrentRecordDuration", self.record_duration)?;
        msg.set("NumRecordedMessages", self.num_messages)?;
        Ok(())
    }

    /// Read a `LOG_INFO_STATUS` message. Missing or unknown values fall
    /// back to defaults; `None` only if the state is unrecognised.
    pub fn read_from(msg: &Message) -> Option<Self> {
        let state = LoggerState::parse(msg.get("StateEnum")?.as_str()?)?;
        Some(Self {
            state,
            current_sim_time: msg
                .get("CurrentSimTime")
                .and_then(|v| v.as_f64())
                .unwrap_or_default(),
            log_file: msg
                .get("LogFile")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            record_duration: msg
                .get("CurrentRecordDuration")
                .and_then(|v| v.as_f64())
                .unwrap_or_default(),
            num_messages: msg
                .get("NumRecordedMessages")
                .and_then(|v| v.as_u32())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgm_core::builtin::{register_builtins, LOG_INFO_STATUS};
    use simgm_core::{MachineId, MachineInfo, MessageFactory};

    #[test]
    fn state_names() {
        for s in [LoggerState::Idle, LoggerState::Record, LoggerState::Playback] {
            assert_eq!(LoggerState::parse(s.as_str()), Some(s));
        }
        assert_eq!(LoggerState::parse("LOGGER_STATE_PAUSED"), None);
        assert_eq!(LoggerState::default().to_string(), "LOGGER_STATE_IDLE");
    }

    #[test]
    fn status_message_parameters() {
        let mut f = MessageFactory::new(MachineInfo::new(MachineId(3), "srv"));
        register_builtins(&mut f).unwrap();
        let status = LogStatus {
            state: LoggerState::Record,
            current_sim_time: 12.5,
            log_file: "exercise".to_string(),
            record_duration: 4.0,
            num_messages: 17,
        };
        let mut msg = f.create(LOG_INFO_STATUS).unwrap();
        status.write_to(&mut msg).unwrap();
        assert_eq!(
            msg.get("StateEnum").and_then(|v| v.as_str()),
            Some("LOGGER_STATE_RECORD")
        );
        assert_eq!(LogStatus::read_from(&msg), Some(status));
    }

    #[test]
    fn unknown_state_is_unreadable() {
        let mut f = MessageFactory::new(MachineInfo::new(MachineId(3), "srv"));
        register_builtins(&mut f).unwrap();
        let mut msg = f.create(LOG_INFO_STATUS).unwrap();
        msg.set("StateEnum", "LOGGER_STATE_BROKEN").unwrap();
        assert_eq!(LogStatus::read_from(&msg), None);
    }
}
