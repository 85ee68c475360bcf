//! Message log reader.
//!
//! [`LogReader`] reads entries from any `Read` source. The header is
//! validated on construction.

use std::io::Read;

use crate::codec::{decode_entry, decode_header};
use crate::error::LogError;
use crate::types::{LogEnd, LogEntry, LogIndex, RecordedMessage};

/// Reads a message log from a byte stream.
pub struct LogReader<R: Read> {
    reader: R,
    version: (u8, u8),
    end: Option<LogEnd>,
    messages_read: u64,
}

impl<R: Read> LogReader<R> {
    /// Open a log stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, LogError> {
        let version = decode_header(&mut reader)?;
        Ok(Self {
            reader,
            version,
            end: None,
            messages_read: 0,
        })
    }

    /// `(major, minor)` format version of the log.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Read the next entry. Returns `None` after the trailer or at the end
    /// of an unfinished log. The trailer itself is returned once.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>, LogError> {
        if self.end.is_some() {
            return Ok(None);
        }
        let entry = decode_entry(&mut self.reader)?;
        match &entry {
            Some(LogEntry::Message(_)) => self.messages_read += 1,
            Some(LogEntry::End(end)) => self.end = Some(*end),
            _ => {}
        }
        Ok(entry)
    }

    /// Read up to the next recorded message, skipping tags and keyframes.
    pub fn next_message(&mut self) -> Result<Option<RecordedMessage>, LogError> {
        while let Some(entry) = self.next_entry()? {
            if let LogEntry::Message(m) = entry {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    /// Whether the trailer has been read.
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// Number of messages read so far.
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Read the remaining entries, collecting tags, keyframes and totals.
    pub fn index(mut self) -> Result<LogIndex, LogError> {
        let mut index = LogIndex::default();
        while let Some(entry) = self.next_entry()? {
            match entry {
                LogEntry::Message(_) => index.message_count += 1,
                LogEntry::Tag(t) => index.tags.push(t),
                LogEntry::Keyframe(k) => index.keyframes.push(k),
                LogEntry::End(e) => index.end = Some(e),
            }
        }
        Ok(index)
    }

    /// Convert into an entry iterator.
    pub fn entries(self) -> EntryIter<R> {
        EntryIter {
            reader: self,
            done: false,
        }
    }
}

impl<R: Read> std::fmt::Debug for LogReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader")
            .field("version", &self.version)
            .field("messages_read", &self.messages_read)
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

/// Iterator adapter over log entries.
pub struct EntryIter<R: Read> {
    reader: LogReader<R>,
    done: bool,
}

impl<R: Read> Iterator for EntryIter<R> {
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogTag;
    use crate::writer::LogWriter;
    use simgm_core::builtin::{register_builtins, INFO_GAME_EVENT};
    use simgm_core::{MachineId, MachineInfo, MessageFactory};

    fn factory() -> MessageFactory {
        let mut f = MessageFactory::new(MachineInfo::new(MachineId(7), "rec"));
        register_builtins(&mut f).unwrap();
        f
    }

    fn event(f: &MessageFactory, name: &str) -> simgm_core::Message {
        let mut msg = f.create(INFO_GAME_EVENT).unwrap();
        msg.set("EventName", name).unwrap();
        msg
    }

    fn sample_log(f: &MessageFactory) -> Vec<u8> {
        let mut w = LogWriter::new(Vec::new()).unwrap();
        w.write_keyframe("first", "", 0.0).unwrap();
        w.write_message(&event(f, "a"), 0.5).unwrap();
        w.write_tag(&LogTag {
            name: "mark".to_string(),
            description: "between".to_string(),
            sim_time: 0.75,
        })
        .unwrap();
        w.write_message(&event(f, "b"), 1.0).unwrap();
        w.write_keyframe("second", "", 1.0).unwrap();
        w.write_message(&event(f, "c"), 1.5).unwrap();
        assert_eq!(w.messages_written(), 3);
        w.finish(2.0).unwrap()
    }

    #[test]
    fn messages_come_back_in_order() {
        let f = factory();
        let bytes = sample_log(&f);
        let mut r = LogReader::open(bytes.as_slice()).unwrap();
        let mut names = Vec::new();
        while let Some(m) = r.next_message().unwrap() {
            assert_eq!(m.type_id(), Some(INFO_GAME_EVENT));
            let msg = m.decode(&f).unwrap();
            names.push(msg.get("EventName").unwrap().as_str().unwrap().to_string());
            assert_eq!(msg.source().id, MachineId(7));
        }
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(r.messages_read(), 3);
        assert!(r.is_complete());
    }

    #[test]
    fn index_collects_markers() {
        let f = factory();
        let bytes = sample_log(&f);
        let index = LogReader::open(bytes.as_slice()).unwrap().index().unwrap();
        assert_eq!(index.message_count, 3);
        assert_eq!(index.tags.len(), 1);
        assert_eq!(index.tags[0].name, "mark");
        let kf: Vec<_> = index
            .keyframes
            .iter()
            .map(|k| (k.name.as_str(), k.message_index))
            .collect();
        assert_eq!(kf, [("first", 0), ("second", 2)]);
        assert!(index.is_complete());
        assert_eq!(index.record_duration(), 2.0);
    }

    #[test]
    fn unfinished_log_is_readable() {
        let f = factory();
        let mut w = LogWriter::new(Vec::new()).unwrap();
        w.write_message(&event(&f, "only"), 0.1).unwrap();
        let bytes = w.into_inner();
        let index = LogReader::open(bytes.as_slice()).unwrap().index().unwrap();
        assert_eq!(index.message_count, 1);
        assert!(!index.is_complete());
        assert_eq!(index.record_duration(), 0.0);
    }

    #[test]
    fn entry_iterator_stops_at_trailer() {
        let f = factory();
        let mut bytes = sample_log(&f);
        // Bytes after the trailer are never read.
        bytes.extend([0xFF, 0xFF]);
        let entries: Vec<_> = LogReader::open(bytes.as_slice())
            .unwrap()
            .entries()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 7);
        assert!(matches!(entries.last(), Some(LogEntry::End(e)) if e.message_count == 3));
    }

    #[test]
    fn truncated_log_errors() {
        let f = factory();
        let mut bytes = sample_log(&f);
        bytes.truncate(bytes.len() - 4);
        let result: Result<Vec<_>, _> = LogReader::open(bytes.as_slice())
            .unwrap()
            .entries()
            .collect();
        assert!(matches!(result, Err(LogError::MalformedEntry { .. })));
    }
}
