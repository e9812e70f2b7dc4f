//! Dense per-document bitsets.
//!
//! Used for the live-docs bitmap (`.liv`, §6.1): a dense bitset of length
//! `max_doc`, bit=1 meaning the document is live (not deleted). Absence of
//! a `.liv` file for a segment means "all docs are live" and is modeled by
//! [`Bits::all_live`] rather than materializing a bitset.

use std::sync::Arc;

use crate::error::Result;

/// Random access to a per-document boolean. `MatchAllBits` and
/// `FixedBitSet` both implement this; scorers and collectors only ever see
/// `&dyn Bits`, never the concrete live-docs representation.
pub trait Bits: Send + Sync {
    /// Whether document `index` is live. `index` must be `< len()`.
    fn get(&self, index: usize) -> Result<bool>;

    /// Number of documents this bitset covers.
    fn len(&self) -> usize;
}

pub type BitsRef = Arc<dyn Bits>;

/// A `Bits` that reports every document live without materializing
/// anything — the common case for freshly-flushed, undeleted segments.
pub struct MatchAllBits {
    len: usize,
}

impl MatchAllBits {
    pub fn new(len: usize) -> MatchAllBits {
        MatchAllBits { len }
    }
}

impl Bits for MatchAllBits {
    fn get(&self, index: usize) -> Result<bool> {
        debug_assert!(index < self.len);
        Ok(true)
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// A `Bits` that reports every document dead. Used for the exclusion
/// scorer's sibling when an entire clause matches nothing.
pub struct MatchNoBits {
    len: usize,
}

impl MatchNoBits {
    pub fn new(len: usize) -> MatchNoBits {
        MatchNoBits { len }
    }
}

impl Bits for MatchNoBits {
    fn get(&self, _index: usize) -> Result<bool> {
        Ok(false)
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// A dense, fixed-length bitset backed by 64-bit words, matching the
/// `.liv` on-disk layout (little-endian `u64` words, bit=1 ⇒ live) so it
/// can be read directly from a mapped byte slice without per-bit decoding.
#[derive(Clone, Debug)]
pub struct FixedBitSet {
    words: Vec<u64>,
    num_bits: usize,
}

impl FixedBitSet {
    pub fn new(num_bits: usize) -> FixedBitSet {
        FixedBitSet {
            words: vec![0u64; Self::num_words(num_bits)],
            num_bits,
        }
    }

    /// A bitset with every bit set to `1`, with ghost bits past `num_bits`
    /// left at zero as the format requires.
    pub fn all_set(num_bits: usize) -> FixedBitSet {
        let mut bs = FixedBitSet {
            words: vec![!0u64; Self::num_words(num_bits)],
            num_bits,
        };
        bs.clear_ghost_bits();
        bs
    }

    fn num_words(num_bits: usize) -> usize {
        (num_bits + 63) / 64
    }

    /// Construct directly from the on-disk words (already validated by
    /// the caller to be the right length); ghost bits are asserted zero.
    pub fn from_words(words: Vec<u64>, num_bits: usize) -> Result<FixedBitSet> {
        if words.len() != Self::num_words(num_bits) {
            bail!(crate::ErrorKind::CorruptIndex(format!(
                "live-docs word count {} does not match num_bits {}",
                words.len(),
                num_bits
            )));
        }
        let bs = FixedBitSet { words, num_bits };
        if bs.ghost_bits_set() {
            bail!(crate::ErrorKind::CorruptIndex(
                "live-docs bitset has non-zero ghost bits past max_doc".to_string()
            ));
        }
        Ok(bs)
    }

    fn ghost_bits_set(&self) -> bool {
        let rem = self.num_bits % 64;
        if rem == 0 {
            return false;
        }
        if let Some(&last) = self.words.last() {
            let mask = !0u64 << rem;
            return last & mask != 0;
        }
        false
    }

    fn clear_ghost_bits(&mut self) {
        let rem = self.num_bits % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= !(!0u64 << rem);
            }
        }
    }

    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.num_bits);
        self.words[index >> 6] &= !(1u64 << (index & 63));
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Count of set bits, i.e. the number of live documents.
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl Bits for FixedBitSet {
    fn get(&self, index: usize) -> Result<bool> {
        debug_assert!(index < self.num_bits);
        Ok(self.words[index >> 6] & (1u64 << (index & 63)) != 0)
    }

    fn len(&self) -> usize {
        self.num_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let mut bs = FixedBitSet::new(130);
        bs.set(0);
        bs.set(63);
        bs.set(64);
        bs.set(129);
        for i in 0..130 {
            let expect = i == 0 || i == 63 || i == 64 || i == 129;
            assert_eq!(bs.get(i).unwrap(), expect);
        }
        assert_eq!(bs.cardinality(), 4);
    }

    #[test]
    fn test_all_set_clears_ghost_bits() {
        let bs = FixedBitSet::all_set(70);
        assert_eq!(bs.cardinality(), 70);
        // word 1 holds bits 64..128; only 64..70 should be live.
        assert_eq!(bs.words()[1], 0b0011_1111);
    }

    #[test]
    fn test_from_words_rejects_ghost_bits() {
        let bad = vec![0u64, 1u64];
        assert!(FixedBitSet::from_words(bad, 65).is_err());
    }

    #[test]
    fn test_match_all_and_no_bits() {
        let all = MatchAllBits::new(5);
        let none = MatchNoBits::new(5);
        for i in 0..5 {
            assert!(all.get(i).unwrap());
            assert!(!none.get(i).unwrap());
        }
    }
}
