//! Entries of a message log.

use simgm_core::{Message, MessageFactory, MessageTypeId};
use simgm_net::codec;

use crate::error::LogError;

/// A message as stored in a log: its encoded bytes and the simulation
/// time at which it was dispatched.
///
/// Messages are kept encoded until needed, so that a log can be scanned
/// and filtered by type without a message factory.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedMessage {
    /// Simulation time of dispatch, in seconds.
    pub sim_time: f64,
    /// The message in the game manager wire encoding.
    pub bytes: Vec<u8>,
}

impl RecordedMessage {
    /// Encode `msg` for the log.
    pub fn encode(msg: &Message, sim_time: f64) -> Result<Self, LogError> {
        Ok(Self {
            sim_time,
            bytes: codec::to_bytes(msg)?,
        })
    }

    /// Message type id, read without decoding the message.
    pub fn type_id(&self) -> Option<MessageTypeId> {
        codec::peek_type_id(&self.bytes)
    }

    /// Decode the message against `factory`.
    pub fn decode(&self, factory: &MessageFactory) -> Result<Message, LogError> {
        Ok(codec::from_bytes(&self.bytes, factory)?)
    }
}

/// A named point in a recording.
#[derive(Clone, Debug, PartialEq)]
pub struct LogTag {
    /// Tag name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Simulation time the tag was inserted at.
    pub sim_time: f64,
}

/// A keyframe marker. `message_index` counts the messages recorded before
/// the keyframe, so playback can start from it.
#[derive(Clone, Debug, PartialEq)]
pub struct LogKeyframe {
    /// Keyframe name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Simulation time the keyframe was captured at.
    pub sim_time: f64,
    /// Number of messages recorded before this keyframe.
    pub message_index: u64,
}

/// Trailer written when a recording is closed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogEnd {
    /// Simulation time spent recording, in seconds.
    pub record_duration: f64,
    /// Number of messages in the log.
    pub message_count: u64,
}

/// One entry of a message log.
#[derive(Clone, Debug, PartialEq)]
pub enum LogEntry {
    /// A recorded message.
    Message(RecordedMessage),
    /// A tag.
    Tag(LogTag),
    /// A keyframe marker.
    Keyframe(LogKeyframe),
    /// End of the recording.
    End(LogEnd),
}

/// Tags, keyframes and totals of a log, gathered without decoding any
/// message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogIndex {
    /// Tags in recording order.
    pub tags: Vec<LogTag>,
    /// Keyframes in recording order.
    pub keyframes: Vec<LogKeyframe>,
    /// Messages present in the log.
    pub message_count: u64,
    /// Trailer, if the recording was closed cleanly.
    pub end: Option<LogEnd>,
}

impl LogIndex {
    /// Whether the recording was closed cleanly.
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// Recorded duration; zero for a recording that was never closed.
    pub fn record_duration(&self) -> f64 {
        self.end.map_or(0.0, |e| e.record_duration)
    }
}
