//! Binary encode/decode for messages exchanged between game managers.
//!
//! All integers are little-endian. Strings are length-prefixed with a `u32`
//! length. One encoded message is laid out as:
//!
//! | field              | encoding                                          |
//! |--------------------|---------------------------------------------------|
//! | version            | `u8` ([`WIRE_VERSION`])                           |
//! | type id            | `u16`                                             |
//! | schema fingerprint | `u32`                                             |
//! | source             | `u128` machine id, string name                    |
//! | destination        | `u8` flag, then `u128` id and string name         |
//! | timestamp          | `f64`                                             |
//! | sending actor      | `u8` flag, then `u128`                            |
//! | about actor        | `u8` flag, then `u128`                            |
//! | parameters         | `u16` count, then `u16` index, `u8` tag, value    |
//! | causing message    | `u8` flag, then a nested message without version  |
//!
//! GROUP values are a `u32` child count followed by `(name, tag, value)`
//! triples. The decoder validates every type tag against the receiving
//! factory's prototype and rejects anything it cannot account for.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use simgm_core::{
    ActorId, MachineId, MachineInfo, Message, MessageFactory, MessageParameter, MessageTypeId,
    ParamGroup, ParamType, ParamValue,
};

use crate::error::WireError;

/// Version byte at the start of every encoded message.
pub const WIRE_VERSION: u8 = 1;

/// Longest string the decoder accepts.
pub const MAX_STRING_BYTES: usize = 1 << 20;

/// Deepest nesting of groups and causing messages the decoder accepts.
pub const MAX_NESTING: usize = 16;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), WireError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u16.
pub fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u128.
pub fn write_u128_le(w: &mut dyn Write, v: u128) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f32.
pub fn write_f32_le(w: &mut dyn Write, v: f32) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), WireError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string.
pub fn write_str(w: &mut dyn Write, s: &str) -> Result<(), WireError> {
    let len = u32::try_from(s.len())
        .map_err(|_| WireError::malformed(format!("string of {} bytes", s.len())))?;
    write_u32_le(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, WireError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u16.
pub fn read_u16_le(r: &mut dyn Read) -> Result<u16, WireError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, WireError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, WireError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian u128.
pub fn read_u128_le(r: &mut dyn Read) -> Result<u128, WireError> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    Ok(u128::from_le_bytes(buf))
}

/// Read a little-endian f32.
pub fn read_f32_le(r: &mut dyn Read) -> Result<f32, WireError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, WireError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string of at most [`MAX_STRING_BYTES`].
pub fn read_str(r: &mut dyn Read) -> Result<String, WireError> {
    let len = read_u32_le(r)? as usize;
    if len > MAX_STRING_BYTES {
        return Err(WireError::malformed(format!("string length {len}")));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| WireError::malformed(format!("invalid UTF-8 string: {e}")))
}

fn write_flag(w: &mut dyn Write, present: bool) -> Result<(), WireError> {
    write_u8(w, u8::from(present))
}

fn read_flag(r: &mut dyn Read) -> Result<bool, WireError> {
    match read_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WireError::malformed(format!("presence flag {other}"))),
    }
}

// ── Values ──────────────────────────────────────────────────────

fn write_floats(w: &mut dyn Write, v: &[f32]) -> Result<(), WireError> {
    for &c in v {
        write_f32_le(w, c)?;
    }
    Ok(())
}

fn read_floats<const N: usize>(r: &mut dyn Read) -> Result<[f32; N], WireError> {
    let mut out = [0.0f32; N];
    for c in &mut out {
        *c = read_f32_le(r)?;
    }
    Ok(out)
}

/// Encode one parameter value (without its type tag).
pub fn write_value(w: &mut dyn Write, value: &ParamValue) -> Result<(), WireError> {
    match value {
        ParamValue::Boolean(v) => write_u8(w, u8::from(*v)),
        ParamValue::Int(v) => {
            w.write_all(&v.to_le_bytes())?;
            Ok(())
        }
        ParamValue::UnsignedInt(v) => write_u32_le(w, *v),
        ParamValue::Long(v) => {
            w.write_all(&v.to_le_bytes())?;
            Ok(())
        }
        ParamValue::Float(v) => write_f32_le(w, *v),
        ParamValue::Double(v) => write_f64_le(w, *v),
        ParamValue::String(v) => write_str(w, v),
        ParamValue::Vec2(v) => write_floats(w, v),
        ParamValue::Vec3(v) => write_floats(w, v),
        ParamValue::Vec4(v) => write_floats(w, v),
        ParamValue::ActorId(v) => write_u128_le(w, v.0),
        ParamValue::Group(children) => {
            let count = u32::try_from(children.len())
                .map_err(|_| WireError::malformed("group too large"))?;
            write_u32_le(w, count)?;
            for child in children.values() {
                write_str(w, child.name())?;
                write_u8(w, child.param_type().tag())?;
                write_value(w, child.value())?;
            }
            Ok(())
        }
    }
}

/// Decode one value of type `ty`.
pub fn read_value(r: &mut dyn Read, ty: ParamType, depth: usize) -> Result<ParamValue, WireError> {
    Ok(match ty {
        ParamType::Boolean => match read_u8(r)? {
            0 => ParamValue::Boolean(false),
            1 => ParamValue::Boolean(true),
            other => return Err(WireError::malformed(format!("boolean byte {other}"))),
        },
        ParamType::Int => ParamValue::Int(read_u32_le(r)? as i32),
        ParamType::UnsignedInt => ParamValue::UnsignedInt(read_u32_le(r)?),
        ParamType::Long => ParamValue::Long(read_u64_le(r)? as i64),
        ParamType::Float => ParamValue::Float(read_f32_le(r)?),
        ParamType::Double => ParamValue::Double(read_f64_le(r)?),
        ParamType::String => ParamValue::String(read_str(r)?),
        ParamType::Vec2 => ParamValue::Vec2(read_floats(r)?),
        ParamType::Vec3 => ParamValue::Vec3(read_floats(r)?),
        ParamType::Vec4 => ParamValue::Vec4(read_floats(r)?),
        ParamType::ActorId => ParamValue::ActorId(ActorId(read_u128_le(r)?)),
        ParamType::Group => {
            if depth >= MAX_NESTING {
                return Err(WireError::malformed("groups nested too deeply"));
            }
            let count = read_u32_le(r)?;
            let mut group = ParamGroup::new();
            for _ in 0..count {
                let name = read_str(r)?;
                let child_ty = read_tag(r)?;
                let value = read_value(r, child_ty, depth + 1)?;
                if group
                    .insert(name.clone(), MessageParameter::with_value(name.as_str(), value))
                    .is_some()
                {
                    return Err(WireError::malformed(format!(
                        "duplicate group child {name:?}"
                    )));
                }
            }
            ParamValue::Group(group)
        }
    })
}

fn read_tag(r: &mut dyn Read) -> Result<ParamType, WireError> {
    let tag = read_u8(r)?;
    ParamType::from_tag(tag).ok_or_else(|| WireError::malformed(format!("unknown type tag {tag}")))
}

// ── Messages ────────────────────────────────────────────────────

fn write_machine(w: &mut dyn Write, machine: &MachineInfo) -> Result<(), WireError> {
    write_u128_le(w, machine.id.0)?;
    write_str(w, &machine.name)
}

fn read_machine(r: &mut dyn Read) -> Result<MachineInfo, WireError> {
    let id = MachineId(read_u128_le(r)?);
    let name = read_str(r)?;
    Ok(MachineInfo::new(id, name))
}

fn write_actor(w: &mut dyn Write, actor: Option<ActorId>) -> Result<(), WireError> {
    write_flag(w, actor.is_some())?;
    if let Some(id) = actor {
        write_u128_le(w, id.0)?;
    }
    Ok(())
}

fn read_actor(r: &mut dyn Read) -> Result<Option<ActorId>, WireError> {
    Ok(if read_flag(r)? {
        Some(ActorId(read_u128_le(r)?))
    } else {
        None
    })
}

fn write_body(w: &mut dyn Write, msg: &Message) -> Result<(), WireError> {
    write_u16_le(w, msg.message_type().0)?;
    write_u32_le(w, msg.schema_fingerprint())?;
    write_machine(w, msg.source())?;
    write_flag(w, msg.destination().is_some())?;
    if let Some(dest) = msg.destination() {
        write_machine(w, dest)?;
    }
    write_f64_le(w, msg.timestamp())?;
    write_actor(w, msg.sending_actor())?;
    write_actor(w, msg.about_actor())?;

    let count = u16::try_from(msg.param_count())
        .map_err(|_| WireError::malformed("too many parameters"))?;
    write_u16_le(w, count)?;
    for (index, p) in msg.params().enumerate() {
        // `count` fits in u16, so every index does too.
        write_u16_le(w, index as u16)?;
        write_u8(w, p.param_type().tag())?;
        write_value(w, p.value())?;
    }

    write_flag(w, msg.causing_message().is_some())?;
    if let Some(cause) = msg.causing_message() {
        write_body(w, cause)?;
    }
    Ok(())
}

fn read_body(r: &mut dyn Read, factory: &MessageFactory, depth: usize) -> Result<Message, WireError> {
    if depth >= MAX_NESTING {
        return Err(WireError::malformed("causing messages nested too deeply"));
    }
    let id = MessageTypeId(read_u16_le(r)?);
    let fingerprint = read_u32_le(r)?;
    let mut msg = factory
        .create(id)
        .map_err(|_| WireError::UnknownMessageType { id })?;
    let expected = msg.schema_fingerprint();
    if fingerprint != expected {
        return Err(WireError::SchemaMismatch {
            id,
            expected,
            found: fingerprint,
        });
    }

    msg.set_source(Arc::new(read_machine(r)?));
    if read_flag(r)? {
        msg.set_destination(Some(Arc::new(read_machine(r)?)));
    }
    msg.set_timestamp(read_f64_le(r)?);
    msg.set_sending_actor(read_actor(r)?);
    msg.set_about_actor(read_actor(r)?);

    let count = read_u16_le(r)? as usize;
    if count != msg.param_count() {
        return Err(WireError::malformed(format!(
            "{} carries {count} parameters, expected {}",
            factory.type_name(id),
            msg.param_count()
        )));
    }
    let mut seen = vec![false; count];
    for _ in 0..count {
        let index = read_u16_le(r)? as usize;
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(WireError::malformed(format!(
                    "parameter index {index} repeated"
                )))
            }
            None => return Err(WireError::malformed(format!("parameter index {index}"))),
        }
        let ty = read_tag(r)?;
        let param = msg
            .param_at_mut(index)
            .ok_or_else(|| WireError::malformed(format!("parameter index {index}")))?;
        if param.param_type() != ty {
            return Err(WireError::malformed(format!(
                "parameter {:?} tagged {ty}, declared {}",
                param.name(),
                param.param_type()
            )));
        }
        let value = read_value(r, ty, depth)?;
        param
            .set(value)
            .map_err(|e| WireError::malformed(e.to_string()))?;
    }

    if read_flag(r)? {
        let cause = read_body(r, factory, depth + 1)?;
        msg.set_causing_message(Some(cause));
    }
    Ok(msg)
}

/// Encode `msg`, including its causing chain.
pub fn encode_message(w: &mut dyn Write, msg: &Message) -> Result<(), WireError> {
    write_u8(w, WIRE_VERSION)?;
    write_body(w, msg)
}

/// Decode one message, creating it from `factory`'s prototype.
///
/// Source and destination come back as bare [`MachineInfo`] records holding
/// only the id and name; callers that track peers replace them with their
/// own records.
pub fn decode_message(r: &mut dyn Read, factory: &MessageFactory) -> Result<Message, WireError> {
    let version = read_u8(r)?;
    if version != WIRE_VERSION {
        return Err(WireError::malformed(format!("wire version {version}")));
    }
    read_body(r, factory, 0)
}

/// Encode `msg` into a fresh buffer.
pub fn to_bytes(msg: &Message) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    encode_message(&mut buf, msg)?;
    Ok(buf)
}

/// Decode a buffer holding exactly one message.
pub fn from_bytes(bytes: &[u8], factory: &MessageFactory) -> Result<Message, WireError> {
    let mut cursor = bytes;
    let msg = decode_message(&mut cursor, factory).map_err(|e| match e {
        WireError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            WireError::malformed("truncated message")
        }
        other => other,
    })?;
    if !cursor.is_empty() {
        return Err(WireError::malformed(format!(
            "{} trailing bytes",
            cursor.len()
        )));
    }
    Ok(msg)
}

/// Message type id of an encoded message, without decoding the rest.
pub fn peek_type_id(bytes: &[u8]) -> Option<MessageTypeId> {
    let raw: [u8; 2] = bytes.get(1..3)?.try_into().ok()?;
    Some(MessageTypeId(u16::from_le_bytes(raw)))
}

// ── Framing ─────────────────────────────────────────────────────

/// Write a `u32` length-prefixed frame.
pub fn write_frame(w: &mut dyn Write, payload: &[u8], max: usize) -> Result<(), WireError> {
    if payload.len() > max {
        return Err(WireError::FrameTooLarge {
            len: payload.len(),
            max,
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge {
        len: payload.len(),
        max,
    })?;
    write_u32_le(w, len)?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Read one `u32` length-prefixed frame of at most `max` bytes.
pub fn read_frame(r: &mut dyn Read, max: usize) -> Result<Vec<u8>, WireError> {
    let len = read_u32_le(r)? as usize;
    if len > max {
        return Err(WireError::FrameTooLarge { len, max });
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgm_core::builtin::{register_builtins, SERVER_REQUEST_REJECTED};
    use simgm_core::{MessageType, ParamType};

    const SAMPLE: MessageTypeId = MessageTypeId(1000);

    fn sample_schema() -> Vec<MessageParameter> {
        vec![
            MessageParameter::new("flag", ParamType::Boolean),
            MessageParameter::new("count", ParamType::Int),
            MessageParameter::new("big", ParamType::Long),
            MessageParameter::new("name", ParamType::String),
            MessageParameter::new("pos", ParamType::Vec3),
            MessageParameter::new("target", ParamType::ActorId),
            MessageParameter::new("extra", ParamType::Group),
        ]
    }

    fn other_schema() -> Vec<MessageParameter> {
        vec![MessageParameter::new("count", ParamType::Double)]
    }

    fn factory(machine: u128) -> MessageFactory {
        let mut f = MessageFactory::new(MachineInfo::new(MachineId(machine), "m"));
        register_builtins(&mut f).unwrap();
        f.register(MessageType::new(SAMPLE, "SAMPLE"), sample_schema)
            .unwrap();
        f
    }

    fn sample(f: &MessageFactory) -> Message {
        let mut msg = f.create(SAMPLE).unwrap();
        msg.set("flag", true).unwrap();
        msg.set("count", -7).unwrap();
        msg.set("big", i64::MIN).unwrap();
        msg.set("name", "tank \u{1F680}").unwrap();
        msg.set("pos", [1.0f32, -2.5, 3.25]).unwrap();
        msg.set("target", ActorId(0xabc)).unwrap();
        let mut group = ParamGroup::new();
        group.insert("hp".into(), MessageParameter::with_value("hp", 90u32));
        msg.set("extra", group).unwrap();
        msg.set_timestamp(12.5);
        msg.set_about_actor(Some(ActorId(9)));
        msg
    }

    // ── messages ────────────────────────────────────────────────

    #[test]
    fn decode_with_fresh_factory_reproduces_message() {
        let sender = factory(1);
        let msg = sample(&sender);
        let bytes = to_bytes(&msg).unwrap();
        let decoded = from_bytes(&bytes, &factory(2)).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.source().id, MachineId(1));
        assert_eq!(decoded.source().name, "m");
    }

    #[test]
    fn causing_message_travels_after_parent() {
        let f = factory(1);
        let cause = sample(&f);
        let mut rejection = f.create(SERVER_REQUEST_REJECTED).unwrap();
        rejection.set("Cause", "no").unwrap();
        rejection.set_causing_message(Some(cause.clone()));
        rejection.set_destination(Some(Arc::new(MachineInfo::new(MachineId(5), "dst"))));
        let decoded = from_bytes(&to_bytes(&rejection).unwrap(), &f).unwrap();
        assert_eq!(decoded.causing_message(), Some(&cause));
        assert_eq!(decoded.destination_id(), Some(MachineId(5)));
    }

    #[test]
    fn unknown_type_is_reported() {
        let bytes = to_bytes(&sample(&factory(1))).unwrap();
        let mut bare = MessageFactory::new(MachineInfo::new(MachineId(2), "bare"));
        register_builtins(&mut bare).unwrap();
        assert!(matches!(
            from_bytes(&bytes, &bare),
            Err(WireError::UnknownMessageType { id }) if id == SAMPLE
        ));
    }

    #[test]
    fn repeated_parameter_index_is_malformed() {
        let f = factory(1);
        let msg = f.create(SAMPLE).unwrap();
        let mut frame = Vec::new();
        write_u8(&mut frame, WIRE_VERSION).unwrap();
        write_u16_le(&mut frame, SAMPLE.0).unwrap();
        write_u32_le(&mut frame, msg.schema_fingerprint()).unwrap();
        write_machine(&mut frame, msg.source()).unwrap();
        write_flag(&mut frame, false).unwrap();
        write_f64_le(&mut frame, 0.0).unwrap();
        write_actor(&mut frame, None).unwrap();
        write_actor(&mut frame, None).unwrap();
        write_u16_le(&mut frame, msg.param_count() as u16).unwrap();
        for _ in 0..msg.param_count() {
            write_u16_le(&mut frame, 0).unwrap();
            write_u8(&mut frame, ParamType::Boolean.tag()).unwrap();
            write_value(&mut frame, &ParamValue::Boolean(true)).unwrap();
        }
        write_flag(&mut frame, false).unwrap();
        assert!(matches!(
            from_bytes(&frame, &f),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let bytes = to_bytes(&sample(&factory(1))).unwrap();
        let mut other = MessageFactory::new(MachineInfo::new(MachineId(2), "other"));
        other
            .register(MessageType::new(SAMPLE, "SAMPLE"), other_schema)
            .unwrap();
        assert!(matches!(
            from_bytes(&bytes, &other),
            Err(WireError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn truncation_and_trailing_bytes_are_malformed() {
        let f = factory(1);
        let mut bytes = to_bytes(&sample(&f)).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            from_bytes(truncated, &f),
            Err(WireError::MalformedMessage { .. })
        ));
        bytes.push(0);
        assert!(matches!(
            from_bytes(&bytes, &f),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn corrupted_type_tag_is_malformed() {
        let f = factory(1);
        let mut msg = f.create(SAMPLE).unwrap();
        msg.set("flag", true).unwrap();
        let mut bytes = to_bytes(&msg).unwrap();
        // The first parameter's tag follows its u16 index; locate it by
        // re-encoding the envelope prefix.
        let mut prefix = Vec::new();
        write_u8(&mut prefix, WIRE_VERSION).unwrap();
        write_u16_le(&mut prefix, SAMPLE.0).unwrap();
        write_u32_le(&mut prefix, msg.schema_fingerprint()).unwrap();
        write_machine(&mut prefix, msg.source()).unwrap();
        write_flag(&mut prefix, false).unwrap();
        write_f64_le(&mut prefix, msg.timestamp()).unwrap();
        write_actor(&mut prefix, None).unwrap();
        write_actor(&mut prefix, None).unwrap();
        let tag_at = prefix.len() + 2 + 2;
        assert_eq!(bytes[tag_at], ParamType::Boolean.tag());
        bytes[tag_at] = ParamType::Double.tag();
        assert!(matches!(
            from_bytes(&bytes, &f),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn peek_reads_type_id() {
        let bytes = to_bytes(&sample(&factory(1))).unwrap();
        assert_eq!(peek_type_id(&bytes), Some(SAMPLE));
        assert_eq!(peek_type_id(&bytes[..2]), None);
    }

    // ── framing ─────────────────────────────────────────────────

    #[test]
    fn frames_respect_the_limit() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello", 16).unwrap();
        assert_eq!(read_frame(&mut buf.as_slice(), 16).unwrap(), b"hello");
        assert!(matches!(
            read_frame(&mut buf.as_slice(), 4),
            Err(WireError::FrameTooLarge { len: 5, max: 4 })
        ));
        assert!(matches!(
            write_frame(&mut Vec::new(), &[0; 32], 16),
            Err(WireError::FrameTooLarge { len: 32, max: 16 })
        ));
    }

    #[test]
    fn oversized_string_length_is_rejected() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, (MAX_STRING_BYTES + 1) as u32).unwrap();
        assert!(matches!(
            read_str(&mut buf.as_slice()),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn scalar_values_survive_the_wire(
                count in any::<i32>(),
                big in any::<i64>(),
                name in ".{0,40}",
                x in -1.0e6f32..1.0e6,
                target in any::<u128>(),
                flag in any::<bool>(),
            ) {
                let f = factory(3);
                let mut msg = f.create(SAMPLE).unwrap();
                msg.set("flag", flag).unwrap();
                msg.set("count", count).unwrap();
                msg.set("big", big).unwrap();
                msg.set("name", name.as_str()).unwrap();
                msg.set("pos", [x, 0.0, -x]).unwrap();
                msg.set("target", ActorId(target)).unwrap();
                let decoded = from_bytes(&to_bytes(&msg).unwrap(), &f).unwrap();
                prop_assert_eq!(decoded, msg);
            }

            #[test]
            fn garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
                let f = factory(4);
                let _ = from_bytes(&bytes, &f);
            }
        }
    }
}
