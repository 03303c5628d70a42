//! Fast hasher implementation dedicated to `i64` keys.
//!
//! The multiplicative hashing scheme follows the one of the
//! [`intmap`](https://github.com/JesperAxelsson/rust-intmap) crate, with
//! the high half of the product folded back so that packed score pairs
//! differing only in their first score still spread over buckets.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::hash::Hasher;

const MULTIPLIER: u64 = 11400714819323198549;

/// The fast integer map type used to accumulate score weights.
pub type IntMap<V> = HashMap<i64, V, IntHasherBuilder>;

#[derive(Debug, Default, Clone)]
pub struct IntHasher {
    state: u64,
}

impl Hasher for IntHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state.rotate_left(8) ^ b as u64).wrapping_mul(MULTIPLIER);
        }
    }

    fn write_i64(&mut self, i: i64) {
        let h = MULTIPLIER.wrapping_mul(i as u64);
        self.state = h ^ (h >> 32);
    }
}

#[derive(Debug, Default, Clone)]
pub struct IntHasherBuilder;

impl BuildHasher for IntHasherBuilder {
    type Hasher = IntHasher;
    fn build_hasher(&self) -> Self::Hasher {
        IntHasher::default()
    }
}

/// Pack a pair of 32-bit scores into a single map key.
#[inline]
pub fn pack(first: i64, second: i64) -> i64 {
    debug_assert!(first >= i32::MIN as i64 && first <= i32::MAX as i64);
    debug_assert!(second >= i32::MIN as i64 && second <= i32::MAX as i64);
    (first << 32) | (second as u32 as i64)
}

/// Unpack a map key into the pair of scores it was built from.
#[inline]
pub fn unpack(key: i64) -> (i64, i64) {
    (key >> 32, key as i32 as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_unpack() {
        for &(a, b) in &[(0, 0), (1, -1), (-5, 7), (i32::MAX as i64, i32::MIN as i64)] {
            assert_eq!(unpack(pack(a, b)), (a, b));
        }
    }

    #[test]
    fn packed_keys_spread() {
        let hash = |k: i64| {
            let mut h = IntHasherBuilder.build_hasher();
            h.write_i64(k);
            h.finish()
        };
        assert_ne!(hash(pack(1, 0)), hash(pack(2, 0)));
    }
}
