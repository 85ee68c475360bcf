//! Binary encode/decode for message logs.
//!
//! All integers are little-endian and strings are `u32` length-prefixed,
//! as in the game manager wire format, whose primitives this module
//! reuses. A log is laid out as:
//!
//! ```text
//! [MAGIC "GMLOGMSGDB"] [MAJOR u8] [MINOR u8]
//! [entry] [entry] ... [END entry]
//! ```
//!
//! Every entry starts with a one-byte kind:
//!
//! | kind | body                                                         |
//! |------|--------------------------------------------------------------|
//! | `1` MESSAGE  | `f64` sim time, `u32` length, encoded message        |
//! | `2` TAG      | name, description, `f64` sim time                    |
//! | `3` KEYFRAME | name, description, `f64` sim time, `u64` message index |
//! | `4` END      | `f64` record duration, `u64` message count           |
//!
//! A log without an END entry is a recording that was never closed; its
//! entries remain readable.

use std::io::{ErrorKind, Read, Write};

use simgm_net::codec::{
    read_f64_le, read_str, read_u32_le, read_u64_le, read_u8, write_f64_le, write_str,
    write_u32_le, write_u64_le, write_u8,
};

use crate::error::LogError;
use crate::types::{LogEnd, LogEntry, LogKeyframe, LogTag, RecordedMessage};
use crate::{MAGIC, MAJOR_VERSION, MINOR_VERSION};

/// Entry kind of a recorded message.
pub const ENTRY_MESSAGE: u8 = 1;
/// Entry kind of a tag.
pub const ENTRY_TAG: u8 = 2;
/// Entry kind of a keyframe marker.
pub const ENTRY_KEYFRAME: u8 = 3;
/// Entry kind of the trailer.
pub const ENTRY_END: u8 = 4;

/// Largest encoded message the decoder accepts.
pub const MAX_MESSAGE_BYTES: usize = 16 << 20;

// ── Header ──────────────────────────────────────────────────────

/// Write the magic bytes and the current format version.
pub fn encode_header(w: &mut dyn Write) -> Result<(), LogError> {
    w.write_all(&MAGIC)?;
    write_u8(w, MAJOR_VERSION)?;
    write_u8(w, MINOR_VERSION)?;
    Ok(())
}

/// Read and validate the header, returning the `(major, minor)` version.
///
/// Logs with the current major version and a minor version no newer than
/// this build are accepted.
pub fn decode_header(r: &mut dyn Read) -> Result<(u8, u8), LogError> {
    let mut magic = [0u8; MAGIC.len()];
    match r.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(LogError::InvalidMagic),
        Err(e) => return Err(e.into()),
    }
    if magic != MAGIC {
        return Err(LogError::InvalidMagic);
    }
    let major = read_u8(r).map_err(LogError::truncated)?;
    let minor = read_u8(r).map_err(LogError::truncated)?;
    if major != MAJOR_VERSION || minor > MINOR_VERSION {
        return Err(LogError::UnsupportedVersion { major, minor });
    }
    Ok((major, minor))
}

// ── Entries ─────────────────────────────────────────────────────

/// Encode one entry.
pub fn encode_entry(w: &mut dyn Write, entry: &LogEntry) -> Result<(), LogError> {
    match entry {
        LogEntry::Message(m) => {
            let len = u32::try_from(m.bytes.len())
                .ok()
                .filter(|&n| n as usize <= MAX_MESSAGE_BYTES)
                .ok_or_else(|| {
                    LogError::malformed(format!("message of {} bytes", m.bytes.len()))
                })?;
            write_u8(w, ENTRY_MESSAGE)?;
            write_f64_le(w, m.sim_time)?;
            write_u32_le(w, len)?;
            w.write_all(&m.bytes)?;
        }
        LogEntry::Tag(t) => {
            write_u8(w, ENTRY_TAG)?;
            write_str(w, &t.name)?;
            write_str(w, &t.description)?;
            write_f64_le(w, t.sim_time)?;
        }
        LogEntry::Keyframe(k) => {
            write_u8(w, ENTRY_KEYFRAME)?;
            write_str(w, &k.name)?;
            write_str(w, &k.description)?;
            write_f64_le(w, k.sim_time)?;
            write_u64_le(w, k.message_index)?;
        }
        LogEntry::End(e) => {
            write_u8(w, ENTRY_END)?;
            write_f64_le(w, e.record_duration)?;
            write_u64_le(w, e.message_count)?;
        }
    }
    Ok(())
}

/// Decode one entry, or `None` at a clean end of stream.
pub fn decode_entry(r: &mut dyn Read) -> Result<Option<LogEntry>, LogError> {
    // A clean end of stream falls between entries; anything shorter than a
    // whole entry after its kind byte is truncation.
    let mut kind = [0u8; 1];
    loop {
        match r.read(&mut kind) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LogError::Io(e)),
        }
    }
    let entry = match kind[0] {
        ENTRY_MESSAGE => {
            let sim_time = read_f64_le(r).map_err(LogError::truncated)?;
            let len = read_u32_le(r).map_err(LogError::truncated)? as usize;
            if len > MAX_MESSAGE_BYTES {
                return Err(LogError::malformed(format!("message of {len} bytes")));
            }
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => LogError::malformed("truncated message"),
                _ => LogError::Io(e),
            })?;
            LogEntry::Message(RecordedMessage { sim_time, bytes })
        }
        ENTRY_TAG => LogEntry::Tag(LogTag {
            name: read_str(r).map_err(LogError::truncated)?,
            description: read_str(r).map_err(LogError::truncated)?,
            sim_time: read_f64_le(r).map_err(LogError::truncated)?,
        }),
        ENTRY_KEYFRAME => LogEntry::Keyframe(LogKeyframe {
            name: read_str(r).map_err(LogError::truncated)?,
            description: read_str(r).map_err(LogError::truncated)?,
            sim_time: read_f64_le(r).map_err(LogError::truncated)?,
            message_index: read_u64_le(r).map_err(LogError::truncated)?,
        }),
        ENTRY_END => LogEntry::End(LogEnd {
            record_duration: read_f64_le(r).map_err(LogError::truncated)?,
            message_count: read_u64_le(r).map_err(LogError::truncated)?,
        }),
        other => {
            return Err(LogError::malformed(format!("unknown entry kind {other}")));
        }
    };
    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> LogEntry {
        LogEntry::Tag(LogTag {
            name: name.to_string(),
            description: "about".to_string(),
            sim_time: 2.5,
        })
    }

    // ── header ──────────────────────────────────────────────────

    #[test]
    fn header_layout() {
        let mut buf = Vec::new();
        encode_header(&mut buf).unwrap();
        assert_eq!(&buf[..10], b"GMLOGMSGDB");
        assert_eq!(buf[10..], [MAJOR_VERSION, MINOR_VERSION]);
        assert_eq!(
            decode_header(&mut buf.as_slice()).unwrap(),
            (MAJOR_VERSION, MINOR_VERSION)
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert!(matches!(
            decode_header(&mut b"GMLOGXXXXX\x01\x00".as_slice()),
            Err(LogError::InvalidMagic)
        ));
        assert!(matches!(
            decode_header(&mut b"GML".as_slice()),
            Err(LogError::InvalidMagic)
        ));
    }

    #[test]
    fn other_major_versions_are_rejected() {
        let mut buf = MAGIC.to_vec();
        buf.extend([MAJOR_VERSION + 1, 0]);
        assert!(matches!(
            decode_header(&mut buf.as_slice()),
            Err(LogError::UnsupportedVersion { .. })
        ));
        let mut newer_minor = MAGIC.to_vec();
        newer_minor.extend([MAJOR_VERSION, MINOR_VERSION + 1]);
        assert!(matches!(
            decode_header(&mut newer_minor.as_slice()),
            Err(LogError::UnsupportedVersion { major, .. }) if major == MAJOR_VERSION
        ));
    }

    // ── entries ─────────────────────────────────────────────────

    #[test]
    fn entries_decode_in_order_then_end_of_stream() {
        let entries = vec![
            tag("start"),
            LogEntry::Message(RecordedMessage {
                sim_time: 1.0,
                bytes: vec![1, 2, 3],
            }),
            LogEntry::Keyframe(LogKeyframe {
                name: "kf".to_string(),
                description: String::new(),
                sim_time: 1.5,
                message_index: 1,
            }),
            LogEntry::End(LogEnd {
                record_duration: 3.0,
                message_count: 1,
            }),
        ];
        let mut buf = Vec::new();
        for e in &entries {
            encode_entry(&mut buf, e).unwrap();
        }
        let mut r = buf.as_slice();
        for e in &entries {
            assert_eq!(decode_entry(&mut r).unwrap().as_ref(), Some(e));
        }
        assert!(decode_entry(&mut r).unwrap().is_none());
    }

    #[test]
    fn truncated_entry_is_malformed() {
        let mut buf = Vec::new();
        encode_entry(&mut buf, &tag("cut")).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            decode_entry(&mut buf.as_slice()),
            Err(LogError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn truncated_message_is_malformed() {
        let mut buf = Vec::new();
        let msg = LogEntry::Message(RecordedMessage {
            sim_time: 0.0,
            bytes: vec![9; 20],
        });
        encode_entry(&mut buf, &msg).unwrap();
        buf.truncate(buf.len() - 5);
        assert!(matches!(
            decode_entry(&mut buf.as_slice()),
            Err(LogError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn unknown_kind_is_malformed() {
        assert!(matches!(
            decode_entry(&mut [9u8].as_slice()),
            Err(LogError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn oversized_message_length_is_rejected_before_allocating() {
        let mut buf = vec![ENTRY_MESSAGE];
        buf.extend(0f64.to_le_bytes());
        buf.extend(u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_entry(&mut buf.as_slice()),
            Err(LogError::MalformedEntry { .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
                let mut r = bytes.as_slice();
                while let Ok(Some(_)) = decode_entry(&mut r) {}
            }

            #[test]
            fn tags_survive(name in "[a-zA-Z0-9 ]{0,24}", t in -1.0e6f64..1.0e6) {
                let entry = LogEntry::Tag(LogTag {
                    name: name.clone(),
                    description: name,
                    sim_time: t,
                });
                let mut buf = Vec::new();
                encode_entry(&mut buf, &entry).unwrap();
                prop_assert_eq!(decode_entry(&mut buf.as_slice()).unwrap(), Some(entry));
            }
        }
    }
}
