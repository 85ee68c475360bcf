//! FNV-1a hashing for message schema fingerprints.
//!
//! These hashes are not cryptographically secure. They exist so that two
//! peers (or a log and its reader) can cheaply detect that they disagree
//! about a message layout.

use crate::param::ParamType;

/// FNV-1a offset basis for 64-bit.
pub const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Feed a single byte into an FNV-1a hash state.
#[inline]
pub fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// Feed a byte slice into an FNV-1a hash state.
#[inline]
pub fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// Fingerprint of an ordered `(name, type)` schema.
///
/// Name bytes and the type tag are folded in per parameter, with a
/// separator byte so that `("ab", x), ("c", y)` and `("a", x), ("bc", y)`
/// hash differently. The 64-bit state is folded down to 32 bits.
pub fn schema_fingerprint<'a>(schema: impl IntoIterator<Item = (&'a str, ParamType)>) -> u32 {
    let mut hash = FNV_OFFSET;
    for (name, ty) in schema {
        hash = fnv1a_bytes(hash, name.as_bytes());
        hash = fnv1a_byte(hash, 0);
        hash = fnv1a_byte(hash, ty.tag());
    }
    (hash ^ (hash >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_type_matter() {
        let a = schema_fingerprint([("x", ParamType::Int), ("y", ParamType::Float)]);
        let b = schema_fingerprint([("y", ParamType::Float), ("x", ParamType::Int)]);
        let c = schema_fingerprint([("x", ParamType::Int), ("y", ParamType::Double)]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn name_boundaries_matter() {
        let a = schema_fingerprint([("ab", ParamType::Int), ("c", ParamType::Int)]);
        let b = schema_fingerprint([("a", ParamType::Int), ("bc", ParamType::Int)]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_schema_is_stable() {
        assert_eq!(
            schema_fingerprint(std::iter::empty()),
            schema_fingerprint(Vec::new())
        );
    }
}
