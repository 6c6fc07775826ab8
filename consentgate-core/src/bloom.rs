//! Bloom filter geometry and bit addressing.
//!
//! Every replica must map an item to the same bit positions, so the hashing
//! here is deterministic and independent of process state (no random seeds).
//!
//! ## Sizing
//!
//! For `n` expected insertions and target false-positive rate `p`:
//! - `m = ceil(-n * ln(p) / ln(2)^2)` bits
//! - `k = max(1, round(m / n * ln(2)))` hash functions
//!
//! Bit positions use double hashing, `h_i(x) = h1(x) + i * h2(x) mod m`,
//! with `h1` and `h2` taken from the first 16 bytes of a BLAKE3 digest.

use crate::StoreError;
use serde::{Deserialize, Serialize};

/// Upper bound on the bit array size (2 GiB of bits).
pub const MAX_BITS: u64 = 1 << 34;

/// Size parameters of a Bloom filter, derived from capacity and target
/// false-positive rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomGeometry {
    pub capacity: u64,
    pub false_probability: f64,
    pub num_bits: u64,
    pub num_hashes: u32,
}

impl BloomGeometry {
    /// Compute the optimal geometry for `capacity` items at `false_probability`.
    pub fn with_accuracy(capacity: u64, false_probability: f64) -> Result<Self, StoreError> {
        if capacity == 0 {
            return Err(StoreError::InvalidParameters {
                reason: "capacity must be greater than zero".to_string(),
            });
        }
        if !(false_probability > 0.0 && false_probability < 1.0) {
            return Err(StoreError::InvalidParameters {
                reason: format!(
                    "false probability must be in (0, 1), got {}",
                    false_probability
                ),
            });
        }

        let n = capacity as f64;
        let ln2 = std::f64::consts::LN_2;
        let bits = (-n * false_probability.ln() / (ln2 * ln2)).ceil();
        if bits > MAX_BITS as f64 {
            return Err(StoreError::InvalidParameters {
                reason: format!("bit array of {} bits exceeds {}", bits, MAX_BITS),
            });
        }
        let num_bits = (bits as u64).max(1);
        let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;

        Ok(Self {
            capacity,
            false_probability,
            num_bits,
            num_hashes,
        })
    }

    /// Bit positions touched by `item`. Always yields `num_hashes` values.
    pub fn bit_indices(&self, item: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let (h1, h2) = hash_pair(item);
        (0..self.num_hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    /// Expected false-positive rate after `inserted` distinct insertions.
    pub fn estimated_false_positive_rate(&self, inserted: u64) -> f64 {
        let k = self.num_hashes as f64;
        let exponent = -k * inserted as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    /// Whether this geometry was derived from `capacity` and `false_probability`.
    pub fn same_parameters(&self, capacity: u64, false_probability: f64) -> bool {
        self.capacity == capacity
            && (self.false_probability - false_probability).abs() < f64::EPSILON
    }
}

fn hash_pair(item: &[u8]) -> (u64, u64) {
    let digest = blake3::hash(item);
    let bytes = digest.as_bytes();
    let mut lo = [0u8; 8];
    let mut hi = [0u8; 8];
    lo.copy_from_slice(&bytes[0..8]);
    hi.copy_from_slice(&bytes[8..16]);
    // odd h2: probes stay distinct when m is a power of two
    (u64::from_le_bytes(lo), u64::from_le_bytes(hi) | 1)
}

/// Packed bit array backing an in-process filter.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomBits {
    words: Vec<u64>,
    len: u64,
}

impl BloomBits {
    pub fn new(len: u64) -> Self {
        let words = len.div_ceil(64) as usize;
        Self {
            words: vec![0u64; words],
            len,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Set a bit, returning whether it was previously clear.
    pub fn set(&mut self, index: u64) -> bool {
        let (word, mask) = self.locate(index);
        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    pub fn get(&self, index: u64) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word] & mask != 0
    }

    pub fn count_ones(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    fn locate(&self, index: u64) -> (usize, u64) {
        debug_assert!(index < self.len, "bit index {index} out of range {}", self.len);
        ((index / 64) as usize, 1u64 << (index % 64))
    }
}

impl std::fmt::Debug for BloomBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomBits")
            .field("len", &self.len)
            .field("set_bits", &self.count_ones())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_for_reference_parameters() {
        let geometry = BloomGeometry::with_accuracy(1000, 0.01).unwrap();
        assert_eq!(geometry.num_bits, 9586);
        assert_eq!(geometry.num_hashes, 7);
    }

    #[test]
    fn test_geometry_rejects_invalid_parameters() {
        assert!(BloomGeometry::with_accuracy(0, 0.01).is_err());
        assert!(BloomGeometry::with_accuracy(10, 0.0).is_err());
        assert!(BloomGeometry::with_accuracy(10, 1.0).is_err());
        assert!(BloomGeometry::with_accuracy(10, f64::NAN).is_err());
        assert!(BloomGeometry::with_accuracy(u64::MAX, 1e-9).is_err());
    }

    #[test]
    fn test_bit_indices_are_deterministic_and_in_range() {
        let geometry = BloomGeometry::with_accuracy(1000, 0.01).unwrap();
        let first: Vec<u64> = geometry.bit_indices(b"RSSMRA85T10A562S").collect();
        let second: Vec<u64> = geometry.bit_indices(b"RSSMRA85T10A562S").collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), geometry.num_hashes as usize);
        assert!(first.iter().all(|i| *i < geometry.num_bits));
    }

    #[test]
    fn test_bits_set_reports_change() {
        let mut bits = BloomBits::new(130);
        assert!(bits.is_empty());
        assert!(bits.set(129));
        assert!(!bits.set(129));
        assert!(bits.get(129));
        assert!(!bits.get(128));
        assert_eq!(bits.count_ones(), 1);
    }

    #[test]
    fn test_estimated_rate_grows_with_insertions() {
        let geometry = BloomGeometry::with_accuracy(1000, 0.01).unwrap();
        let at_capacity = geometry.estimated_false_positive_rate(1000);
        let over_capacity = geometry.estimated_false_positive_rate(5000);
        assert!(at_capacity < 0.0125);
        assert!(over_capacity > at_capacity);
    }
}
