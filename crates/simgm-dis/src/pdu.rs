//! Encode/decode for the DIS PDUs the runtime exchanges.
//!
//! Every PDU starts with a 12-byte header:
//!
//! | offset | field            | encoding |
//! |--------|------------------|----------|
//! | 0      | protocol version | `u8`     |
//! | 1      | exercise id      | `u8`     |
//! | 2      | PDU type         | `u8`     |
//! | 3      | protocol family  | `u8`     |
//! | 4      | timestamp        | `u32`    |
//! | 8      | length           | `u16`    |
//! | 10     | padding          | `u16`    |
//!
//! Supported bodies are Entity State (type 1, 144 bytes without
//! articulation records), Create Entity (type 11) and Remove Entity
//! (type 12, both 28 bytes). Multi-byte fields use the configured
//! [`Endian`]; standard DIS is big-endian.

use std::io::{Cursor, Read, Write};

use crate::error::PduError;

/// Length of the PDU header.
pub const HEADER_LEN: usize = 12;

/// Length of an Entity State PDU without articulation records.
pub const ENTITY_STATE_LEN: usize = 144;

/// Length of a Create Entity or Remove Entity PDU.
pub const ENTITY_REQUEST_LEN: usize = 28;

/// Length of one articulation parameter record.
pub const ARTICULATION_RECORD_LEN: usize = 16;

/// Characters in an entity marking.
pub const MARKING_CHARS: usize = 11;

/// Byte order of multi-byte PDU fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Network byte order, as the DIS standard requires.
    #[default]
    Big,
    /// Little-endian, for simulators that skip the byte swap.
    Little,
}

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), PduError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a u16 in `endian` order.
pub fn write_u16(w: &mut dyn Write, endian: Endian, v: u16) -> Result<(), PduError> {
    match endian {
        Endian::Big => w.write_all(&v.to_be_bytes())?,
        Endian::Little => w.write_all(&v.to_le_bytes())?,
    }
    Ok(())
}

/// Write a u32 in `endian` order.
pub fn write_u32(w: &mut dyn Write, endian: Endian, v: u32) -> Result<(), PduError> {
    match endian {
        Endian::Big => w.write_all(&v.to_be_bytes())?,
        Endian::Little => w.write_all(&v.to_le_bytes())?,
    }
    Ok(())
}

/// Write a u64 in `endian` order.
pub fn write_u64(w: &mut dyn Write, endian: Endian, v: u64) -> Result<(), PduError> {
    match endian {
        Endian::Big => w.write_all(&v.to_be_bytes())?,
        Endian::Little => w.write_all(&v.to_le_bytes())?,
    }
    Ok(())
}

/// Write an f32 in `endian` order.
pub fn write_f32(w: &mut dyn Write, endian: Endian, v: f32) -> Result<(), PduError> {
    write_u32(w, endian, v.to_bits())
}

/// Write an f64 in `endian` order.
pub fn write_f64(w: &mut dyn Write, endian: Endian, v: f64) -> Result<(), PduError> {
    write_u64(w, endian, v.to_bits())
}

// ── Primitive readers ───────────────────────────────────────────

fn read_array<const N: usize>(r: &mut dyn Read) -> Result<[u8; N], PduError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)
        .map_err(|_| PduError::malformed("unexpected end of PDU"))?;
    Ok(buf)
}

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, PduError> {
    Ok(read_array::<1>(r)?[0])
}

/// Read a u16 in `endian` order.
pub fn read_u16(r: &mut dyn Read, endian: Endian) -> Result<u16, PduError> {
    let buf = read_array(r)?;
    Ok(match endian {
        Endian::Big => u16::from_be_bytes(buf),
        Endian::Little => u16::from_le_bytes(buf),
    })
}

/// Read a u32 in `endian` order.
pub fn read_u32(r: &mut dyn Read, endian: Endian) -> Result<u32, PduError> {
    let buf = read_array(r)?;
    Ok(match endian {
        Endian::Big => u32::from_be_bytes(buf),
        Endian::Little => u32::from_le_bytes(buf),
    })
}

/// Read a u64 in `endian` order.
pub fn read_u64(r: &mut dyn Read, endian: Endian) -> Result<u64, PduError> {
    let buf = read_array(r)?;
    Ok(match endian {
        Endian::Big => u64::from_be_bytes(buf),
        Endian::Little => u64::from_le_bytes(buf),
    })
}

/// Read an f32 in `endian` order.
pub fn read_f32(r: &mut dyn Read, endian: Endian) -> Result<f32, PduError> {
    read_u32(r, endian).map(f32::from_bits)
}

/// Read an f64 in `endian` order.
pub fn read_f64(r: &mut dyn Read, endian: Endian) -> Result<f64, PduError> {
    read_u64(r, endian).map(f64::from_bits)
}

fn write_vec3_f32(w: &mut dyn Write, endian: Endian, v: [f32; 3]) -> Result<(), PduError> {
    for c in v {
        write_f32(w, endian, c)?;
    }
    Ok(())
}

fn read_vec3_f32(r: &mut dyn Read, endian: Endian) -> Result<[f32; 3], PduError> {
    Ok([
        read_f32(r, endian)?,
        read_f32(r, endian)?,
        read_f32(r, endian)?,
    ])
}

// ── Timestamps ──────────────────────────────────────────────────

const UNITS_PER_HOUR: f64 = 2_147_483_648.0;

/// Relative DIS timestamp for `seconds` of sim time: units of 3600/2^31
/// seconds past the hour, shifted left one bit with the absolute flag
/// cleared.
pub fn timestamp_from_seconds(seconds: f64) -> u32 {
    let past_hour = seconds.rem_euclid(3600.0);
    let units = (past_hour / 3600.0 * UNITS_PER_HOUR) as u32;
    units.min(0x7FFF_FFFF) << 1
}

/// Seconds past the hour encoded in a DIS timestamp.
pub fn timestamp_to_seconds(timestamp: u32) -> f64 {
    f64::from(timestamp >> 1) / UNITS_PER_HOUR * 3600.0
}

// ── Header ──────────────────────────────────────────────────────

/// Supported PDU types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PduType {
    /// Entity State, type 1.
    EntityState,
    /// Create Entity, type 11.
    CreateEntity,
    /// Remove Entity, type 12.
    RemoveEntity,
}

impl PduType {
    /// Numeric type byte.
    pub fn code(self) -> u8 {
        match self {
            PduType::EntityState => 1,
            PduType::CreateEntity => 11,
            PduType::RemoveEntity => 12,
        }
    }

    /// Protocol family: entity information (1) or simulation management (5).
    pub fn family(self) -> u8 {
        match self {
            PduType::EntityState => 1,
            PduType::CreateEntity | PduType::RemoveEntity => 5,
        }
    }
}

impl TryFrom<u8> for PduType {
    type Error = PduError;

    fn try_from(ty: u8) -> Result<Self, PduError> {
        match ty {
            1 => Ok(PduType::EntityState),
            11 => Ok(PduType::CreateEntity),
            12 => Ok(PduType::RemoveEntity),
            _ => Err(PduError::UnknownPduType { ty }),
        }
    }
}

/// A decoded PDU header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PduHeader {
    /// Protocol version.
    pub protocol_version: u8,
    /// Exercise the PDU belongs to.
    pub exercise_id: u8,
    /// PDU type.
    pub pdu_type: PduType,
    /// Protocol family.
    pub family: u8,
    /// DIS timestamp.
    pub timestamp: u32,
    /// Total PDU length in bytes, header included.
    pub length: u16,
}

/// Header fields stamped onto every outgoing PDU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderStamp {
    /// Protocol version.
    pub protocol_version: u8,
    /// Exercise id.
    pub exercise_id: u8,
    /// DIS timestamp.
    pub timestamp: u32,
}

/// Exercise id of a datagram, read without decoding it.
pub fn peek_exercise_id(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    bytes.get(1).copied()
}

// ── Records ─────────────────────────────────────────────────────

/// DIS entity identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    /// Site number.
    pub site: u16,
    /// Application number within the site.
    pub application: u16,
    /// Entity number within the application.
    pub entity: u16,
}

impl EntityId {
    /// Wildcard id addressing every entity of every application.
    pub const ALL: EntityId = EntityId {
        site: u16::MAX,
        application: u16::MAX,
        entity: u16::MAX,
    };

    /// New id.
    pub fn new(site: u16, application: u16, entity: u16) -> Self {
        Self {
            site,
            application,
            entity,
        }
    }

    /// Whether the id belongs to the given site and application.
    pub fn is_from(&self, site: u16, application: u16) -> bool {
        self.site == site && self.application == application
    }

    fn write(&self, w: &mut dyn Write, endian: Endian) -> Result<(), PduError> {
        write_u16(w, endian, self.site)?;
        write_u16(w, endian, self.application)?;
        write_u16(w, endian, self.entity)
    }

    fn read(r: &mut dyn Read, endian: Endian) -> Result<Self, PduError> {
        Ok(Self {
            site: read_u16(r, endian)?,
            application: read_u16(r, endian)?,
            entity: read_u16(r, endian)?,
        })
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.site, self.application, self.entity)
    }
}

/// DIS entity type record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EntityType {
    /// Entity kind (platform, munition, ...).
    pub kind: u8,
    /// Domain (land, air, ...).
    pub domain: u8,
    /// Country code.
    pub country: u16,
    /// Category.
    pub category: u8,
    /// Subcategory.
    pub subcategory: u8,
    /// Specific.
    pub specific: u8,
    /// Extra.
    pub extra: u8,
}

impl EntityType {
    fn write(&self, w: &mut dyn Write, endian: Endian) -> Result<(), PduError> {
        write_u8(w, self.kind)?;
        write_u8(w, self.domain)?;
        write_u16(w, endian, self.country)?;
        write_u8(w, self.category)?;
        write_u8(w, self.subcategory)?;
        write_u8(w, self.specific)?;
        write_u8(w, self.extra)
    }

    fn read(r: &mut dyn Read, endian: Endian) -> Result<Self, PduError> {
        Ok(Self {
            kind: read_u8(r)?,
            domain: read_u8(r)?,
            country: read_u16(r, endian)?,
            category: read_u8(r)?,
            subcategory: read_u8(r)?,
            specific: read_u8(r)?,
            extra: read_u8(r)?,
        })
    }
}

/// Entity marking: a character set byte and up to eleven characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marking {
    /// Character set; 1 is ASCII.
    pub charset: u8,
    /// Marking text without padding.
    pub text: String,
}

impl Default for Marking {
    fn default() -> Self {
        Self {
            charset: 1,
            text: String::new(),
        }
    }
}

impl Marking {
    /// ASCII marking from the first eleven ASCII characters of `text`.
    pub fn ascii(text: &str) -> Self {
        Self {
            charset: 1,
            text: text
                .chars()
                .filter(|c| c.is_ascii() && *c != '\0')
                .take(MARKING_CHARS)
                .collect(),
        }
    }

    fn write(&self, w: &mut dyn Write) -> Result<(), PduError> {
        let mut chars = [0u8; MARKING_CHARS];
        for (slot, b) in chars.iter_mut().zip(self.text.bytes()) {
            *slot = b;
        }
        write_u8(w, self.charset)?;
        w.write_all(&chars)?;
        Ok(())
    }

    fn read(r: &mut dyn Read) -> Result<Self, PduError> {
        let charset = read_u8(r)?;
        let chars: [u8; MARKING_CHARS] = read_array(r)?;
        let end = chars.iter().position(|b| *b == 0).unwrap_or(MARKING_CHARS);
        Ok(Self {
            charset,
            text: String::from_utf8_lossy(&chars[..end]).into_owned(),
        })
    }
}

/// Dead reckoning parameters of an entity state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeadReckoning {
    /// Algorithm number; 1 is static.
    pub algorithm: u8,
    /// Linear acceleration, m/s².
    pub linear_acceleration: [f32; 3],
    /// Angular velocity, rad/s.
    pub angular_velocity: [f32; 3],
}

impl Default for DeadReckoning {
    fn default() -> Self {
        Self {
            algorithm: 1,
            linear_acceleration: [0.0; 3],
            angular_velocity: [0.0; 3],
        }
    }
}

impl DeadReckoning {
    fn write(&self, w: &mut dyn Write, endian: Endian) -> Result<(), PduError> {
        write_u8(w, self.algorithm)?;
        w.write_all(&[0u8; 15])?;
        write_vec3_f32(w, endian, self.linear_acceleration)?;
        write_vec3_f32(w, endian, self.angular_velocity)
    }

    fn read(r: &mut dyn Read, endian: Endian) -> Result<Self, PduError> {
        let algorithm = read_u8(r)?;
        let _other: [u8; 15] = read_array(r)?;
        Ok(Self {
            algorithm,
            linear_acceleration: read_vec3_f32(r, endian)?,
            angular_velocity: read_vec3_f32(r, endian)?,
        })
    }
}

// ── PDU bodies ──────────────────────────────────────────────────

/// Entity State PDU body. Articulation records are skipped on decode and
/// never written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityStatePdu {
    /// Entity the state describes.
    pub entity_id: EntityId,
    /// Force the entity belongs to.
    pub force_id: u8,
    /// Entity type.
    pub entity_type: EntityType,
    /// Type other forces should perceive.
    pub alternative_type: EntityType,
    /// Linear velocity, m/s.
    pub linear_velocity: [f32; 3],
    /// World location, metres.
    pub location: [f64; 3],
    /// Orientation as psi, theta, phi, radians.
    pub orientation: [f32; 3],
    /// Appearance bit field.
    pub appearance: u32,
    /// Dead reckoning parameters.
    pub dead_reckoning: DeadReckoning,
    /// Marking.
    pub marking: Marking,
    /// Capabilities bit field.
    pub capabilities: u32,
}

impl EntityStatePdu {
    fn write(&self, w: &mut dyn Write, endian: Endian) -> Result<(), PduError> {
        self.entity_id.write(w, endian)?;
        write_u8(w, self.force_id)?;
        write_u8(w, 0)?;
        self.entity_type.write(w, endian)?;
        self.alternative_type.write(w, endian)?;
        write_vec3_f32(w, endian, self.linear_velocity)?;
        for c in self.location {
            write_f64(w, endian, c)?;
        }
        write_vec3_f32(w, endian, self.orientation)?;
        write_u32(w, endian, self.appearance)?;
        self.dead_reckoning.write(w, endian)?;
        self.marking.write(w)?;
        write_u32(w, endian, self.capabilities)
    }

    fn read(r: &mut dyn Read, endian: Endian, declared: usize) -> Result<Self, PduError> {
        let entity_id = EntityId::read(r, endian)?;
        let force_id = read_u8(r)?;
        let articulations = usize::from(read_u8(r)?);
        let expected = ENTITY_STATE_LEN + articulations * ARTICULATION_RECORD_LEN;
        if declared != expected {
            return Err(PduError::malformed(format!(
                "entity state with {articulations} articulations is {expected} bytes, header says {declared}"
            )));
        }
        let entity_type = EntityType::read(r, endian)?;
        let alternative_type = EntityType::read(r, endian)?;
        let linear_velocity = read_vec3_f32(r, endian)?;
        let location = [
            read_f64(r, endian)?,
            read_f64(r, endian)?,
            read_f64(r, endian)?,
        ];
        let orientation = read_vec3_f32(r, endian)?;
        let appearance = read_u32(r, endian)?;
        let dead_reckoning = DeadReckoning::read(r, endian)?;
        let marking = Marking::read(r)?;
        let capabilities = read_u32(r, endian)?;
        for _ in 0..articulations {
            let _record: [u8; ARTICULATION_RECORD_LEN] = read_array(r)?;
        }
        Ok(Self {
            entity_id,
            force_id,
            entity_type,
            alternative_type,
            linear_velocity,
            location,
            orientation,
            appearance,
            dead_reckoning,
            marking,
            capabilities,
        })
    }
}

/// Create Entity / Remove Entity PDU body.
///
/// The originating id names the entity the request is about; the receiving
/// id is the addressed simulation manager, [`EntityId::ALL`] for everyone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRequestPdu {
    /// Entity the request concerns.
    pub originating_id: EntityId,
    /// Addressee.
    pub receiving_id: EntityId,
    /// Request number, unique per sender.
    pub request_id: u32,
}

impl EntityRequestPdu {
    fn write(&self, w: &mut dyn Write, endian: Endian) -> Result<(), PduError> {
        self.originating_id.write(w, endian)?;
        self.receiving_id.write(w, endian)?;
        write_u32(w, endian, self.request_id)
    }

    fn read(r: &mut dyn Read, endian: Endian) -> Result<Self, PduError> {
        Ok(Self {
            originating_id: EntityId::read(r, endian)?,
            receiving_id: EntityId::read(r, endian)?,
            request_id: read_u32(r, endian)?,
        })
    }
}

/// A decoded PDU body.
#[derive(Clone, Debug, PartialEq)]
pub enum Pdu {
    /// Entity State.
    EntityState(EntityStatePdu),
    /// Create Entity.
    CreateEntity(EntityRequestPdu),
    /// Remove Entity.
    RemoveEntity(EntityRequestPdu),
}

impl Pdu {
    /// Type of this PDU.
    pub fn pdu_type(&self) -> PduType {
        match self {
            Pdu::EntityState(_) => PduType::EntityState,
            Pdu::CreateEntity(_) => PduType::CreateEntity,
            Pdu::RemoveEntity(_) => PduType::RemoveEntity,
        }
    }

    /// Encoded length, header included.
    pub fn encoded_len(&self) -> usize {
        match self {
            Pdu::EntityState(_) => ENTITY_STATE_LEN,
            Pdu::CreateEntity(_) | Pdu::RemoveEntity(_) => ENTITY_REQUEST_LEN,
        }
    }
}

// ── Encode / decode ─────────────────────────────────────────────

/// Encode `pdu` with a header built from `stamp`.
pub fn encode(pdu: &Pdu, stamp: &HeaderStamp, endian: Endian) -> Result<Vec<u8>, PduError> {
    let len = pdu.encoded_len();
    let ty = pdu.pdu_type();
    let mut buf = Vec::with_capacity(len);
    write_u8(&mut buf, stamp.protocol_version)?;
    write_u8(&mut buf, stamp.exercise_id)?;
    write_u8(&mut buf, ty.code())?;
    write_u8(&mut buf, ty.family())?;
    write_u32(&mut buf, endian, stamp.timestamp)?;
    write_u16(&mut buf, endian, len as u16)?;
    write_u16(&mut buf, endian, 0)?;
    match pdu {
        Pdu::EntityState(body) => body.write(&mut buf, endian)?,
        Pdu::CreateEntity(body) | Pdu::RemoveEntity(body) => body.write(&mut buf, endian)?,
    }
    debug_assert_eq!(buf.len(), len);
    Ok(buf)
}

/// Decode one datagram holding exactly one PDU.
///
/// # Errors
///
/// [`PduError::UnknownPduType`] for types other than the supported three,
/// [`PduError::LengthMismatch`] when the header length differs from the
/// datagram length, and [`PduError::Malformed`] for truncated or
/// inconsistent bodies.
pub fn decode(bytes: &[u8], endian: Endian) -> Result<(PduHeader, Pdu), PduError> {
    if bytes.len() < HEADER_LEN {
        return Err(PduError::malformed(format!(
            "{} bytes is shorter than a PDU header",
            bytes.len()
        )));
    }
    let mut r = Cursor::new(bytes);
    let protocol_version = read_u8(&mut r)?;
    let exercise_id = read_u8(&mut r)?;
    let pdu_type = PduType::try_from(read_u8(&mut r)?)?;
    let family = read_u8(&mut r)?;
    let timestamp = read_u32(&mut r, endian)?;
    let length = read_u16(&mut r, endian)?;
    let _padding = read_u16(&mut r, endian)?;
    let declared = usize::from(length);
    if declared != bytes.len() {
        return Err(PduError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let header = PduHeader {
        protocol_version,
        exercise_id,
        pdu_type,
        family,
        timestamp,
        length,
    };
    let pdu = match pdu_type {
        PduType::EntityState => Pdu::EntityState(EntityStatePdu::read(&mut r, endian, declared)?),
        PduType::CreateEntity | PduType::RemoveEntity => {
            if declared != ENTITY_REQUEST_LEN {
                return Err(PduError::malformed(format!(
                    "entity request is {ENTITY_REQUEST_LEN} bytes, header says {declared}"
                )));
            }
            let body = EntityRequestPdu::read(&mut r, endian)?;
            if pdu_type == PduType::CreateEntity {
                Pdu::CreateEntity(body)
            } else {
                Pdu::RemoveEntity(body)
            }
        }
    };
    Ok((header, pdu))
}
