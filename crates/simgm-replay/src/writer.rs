//! Message log writer.
//!
//! [`LogWriter`] streams entries to any `Write` sink. The header is written
//! immediately on construction; [`finish`](LogWriter::finish) writes the
//! trailer.

use std::io::Write;

use simgm_core::Message;

use crate::codec::{encode_entry, encode_header};
use crate::error::LogError;
use crate::types::{LogEnd, LogEntry, LogKeyframe, LogTag, RecordedMessage};

/// Writes a message log to a byte stream.
///
/// # Examples
///
/// ```
/// use simgm_core::builtin::{register_builtins, INFO_GAME_EVENT};
/// use simgm_core::{MachineId, MachineInfo, MessageFactory};
/// use simgm_replay::{LogEntry, LogReader, LogWriter};
///
/// let mut factory = MessageFactory::new(MachineInfo::new(MachineId(1), "gm"));
/// register_builtins(&mut factory).unwrap();
/// let mut event = factory.create(INFO_GAME_EVENT).unwrap();
/// event.set("EventName", "contact").unwrap();
///
/// let mut writer = LogWriter::new(Vec::new()).unwrap();
/// writer.write_message(&event, 1.5).unwrap();
/// let bytes = writer.finish(2.0).unwrap();
///
/// let mut reader = LogReader::open(bytes.as_slice()).unwrap();
/// let recorded = reader.next_message().unwrap().unwrap();
/// assert_eq!(recorded.sim_time, 1.5);
/// let back = recorded.decode(&factory).unwrap();
/// assert_eq!(back.get("EventName").and_then(|v| v.as_str()), Some("contact"));
/// assert!(matches!(reader.next_entry().unwrap(), Some(LogEntry::End(_))));
/// assert!(reader.is_complete());
/// ```
pub struct LogWriter<W: Write> {
    writer: W,
    messages_written: u64,
}

impl<W: Write> LogWriter<W> {
    /// Create a log writer, immediately writing the header.
    pub fn new(mut writer: W) -> Result<Self, LogError> {
        encode_header(&mut writer)?;
        Ok(Self {
            writer,
            messages_written: 0,
        })
    }

    /// Record `msg` as dispatched at `sim_time`.
    pub fn write_message(&mut self, msg: &Message, sim_time: f64) -> Result<(), LogError> {
        let recorded = RecordedMessage::encode(msg, sim_time)?;
        self.write_recorded(&recorded)
    }

    /// Append an already encoded message.
    pub fn write_recorded(&mut self, recorded: &RecordedMessage) -> Result<(), LogError> {
        encode_entry(&mut self.writer, &LogEntry::Message(recorded.clone()))?;
        self.messages_written += 1;
        Ok(())
    }

    /// Append a tag.
    pub fn write_tag(&mut self, tag: &LogTag) -> Result<(), LogError> {
        encode_entry(&mut self.writer, &LogEntry::Tag(tag.clone()))
    }

    /// Append a keyframe marker at the current message position and return
    /// it.
    pub fn write_keyframe(
        &mut self,
        name: &str,
        description: &str,
        sim_time: f64,
    ) -> Result<LogKeyframe, LogError> {
        let keyframe = LogKeyframe {
            name: name.to_string(),
            description: description.to_string(),
            sim_time,
            message_index: self.messages_written,
        };
        encode_entry(&mut self.writer, &LogEntry::Keyframe(keyframe.clone()))?;
        Ok(keyframe)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of messages written so far.
    pub fn messages_written(&self) -> u64 {
        self.messages_written
    }

    /// Return the underlying sink without writing the trailer. The log
    /// reads back as a recording that was never closed.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write the trailer, flush, and return the underlying sink.
    pub fn finish(mut self, record_duration: f64) -> Result<W, LogError> {
        encode_entry(
            &mut self.writer,
            &LogEntry::End(LogEnd {
                record_duration,
                message_count: self.messages_written,
            }),
        )?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> std::fmt::Debug for LogWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("messages_written", &self.messages_written)
            .finish_non_exhaustive()
    }
}
