//! Strongly-typed identifiers and the GUID generator.

use std::fmt;
use std::str::FromStr;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::IdParseError;

/// Format a 128-bit value in the canonical 8-4-4-4-12 GUID layout.
fn fmt_guid(v: u128, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        (v >> 96) as u32,
        (v >> 80) as u16,
        (v >> 64) as u16,
        (v >> 48) as u16,
        v & 0xffff_ffff_ffff
    )
}

/// Parse a GUID string, with or without hyphens.
fn parse_guid(s: &str) -> Result<u128, IdParseError> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 {
        return Err(IdParseError::BadLength {
            input: s.to_string(),
        });
    }
    u128::from_str_radix(&hex, 16).map_err(|_| IdParseError::BadDigit {
        input: s.to_string(),
    })
}

/// Unique identity of an actor.
///
/// `ActorId::NULL` (all zero bits) is reserved and never refers to a live
/// actor; the game manager rejects it on insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u128);

impl ActorId {
    /// The reserved null id.
    pub const NULL: ActorId = ActorId(0);

    /// Whether this is the reserved null id.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_guid(self.0, f)
    }
}

impl From<u128> for ActorId {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

impl FromStr for ActorId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_guid(s).map(Self)
    }
}

/// Unique identity of one game manager instance (a simulation peer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(pub u128);

impl MachineId {
    /// The reserved null id, used before a machine has been assigned one.
    pub const NULL: MachineId = MachineId(0);

    /// Whether this is the reserved null id.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_guid(self.0, f)
    }
}

impl From<u128> for MachineId {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

impl FromStr for MachineId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_guid(s).map(Self)
    }
}

/// Numeric tag of a message type.
///
/// Ids below [`MessageTypeId::FIRST_USER`] are reserved for the built-in
/// types in [`crate::builtin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTypeId(pub u16);

impl MessageTypeId {
    /// First id available to application-defined message types.
    pub const FIRST_USER: MessageTypeId = MessageTypeId(1000);

    /// Whether this id lies in the application range.
    pub fn is_user(self) -> bool {
        self >= Self::FIRST_USER
    }
}

impl fmt::Display for MessageTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for MessageTypeId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Monotonically increasing tick counter.
///
/// Incremented each time a game manager executes one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Source of fresh 128-bit GUIDs for actors and machines.
///
/// Backed by a ChaCha8 stream. A seeded generator yields the same id
/// sequence on every run, which keeps recorded sessions reproducible.
pub struct UidGenerator {
    rng: ChaCha8Rng,
}

impl UidGenerator {
    /// Deterministic generator for the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the operating system.
    pub fn from_os() -> Self {
        Self {
            rng: ChaCha8Rng::from_os_rng(),
        }
    }

    fn next_u128(&mut self) -> u128 {
        loop {
            let hi = self.rng.next_u64() as u128;
            let lo = self.rng.next_u64() as u128;
            let v = (hi << 64) | lo;
            if v != 0 {
                return v;
            }
        }
    }

    /// Next actor id. Never returns [`ActorId::NULL`].
    pub fn next_actor_id(&mut self) -> ActorId {
        ActorId(self.next_u128())
    }

    /// Next machine id. Never returns [`MachineId::NULL`].
    pub fn next_machine_id(&mut self) -> MachineId {
        MachineId(self.next_u128())
    }
}

impl fmt::Debug for UidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UidGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_display_layout() {
        let id = ActorId(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0011-223344556677");
    }

    #[test]
    fn guid_parses_with_and_without_hyphens() {
        let id = ActorId(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        assert_eq!("01234567-89ab-cdef-0011-223344556677".parse::<ActorId>(), Ok(id));
        assert_eq!("0123456789abcdef0011223344556677".parse::<ActorId>(), Ok(id));
    }

    #[test]
    fn guid_parse_rejects_garbage() {
        assert!(matches!(
            "1234".parse::<MachineId>(),
            Err(IdParseError::BadLength { .. })
        ));
        assert!(matches!(
            "zz234567-89ab-cdef-0011-223344556677".parse::<MachineId>(),
            Err(IdParseError::BadDigit { .. })
        ));
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let mut a = UidGenerator::seeded(7);
        let mut b = UidGenerator::seeded(7);
        for _ in 0..16 {
            let id = a.next_actor_id();
            assert!(!id.is_null());
            assert_eq!(id, b.next_actor_id());
        }
    }

    #[test]
    fn user_type_range() {
        assert!(!MessageTypeId(21).is_user());
        assert!(MessageTypeId(1000).is_user());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn guid_text_round_trips(raw in any::<u128>()) {
                let id = ActorId(raw);
                prop_assert_eq!(id.to_string().parse::<ActorId>(), Ok(id));
                let machine = MachineId(raw);
                prop_assert_eq!(machine.to_string().parse::<MachineId>(), Ok(machine));
            }

            #[test]
            fn generated_ids_are_distinct(seed in any::<u64>()) {
                let mut g = UidGenerator::seeded(seed);
                let a = g.next_actor_id();
                let b = g.next_actor_id();
                prop_assert_ne!(a, b);
            }
        }
    }
}
