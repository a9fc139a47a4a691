//! Fixed-size bit vector over 64-bit words.
//!
//! Bits at index `>= size` are never set, so whole-word scans only need a
//! bound check on the final candidate index.

use crate::error::{Error, Result};

const WORD_BITS: usize = 64;

#[inline]
fn word_of(bit: usize) -> usize {
    bit / WORD_BITS
}

#[inline]
fn offset_of(bit: usize) -> u32 {
    (bit % WORD_BITS) as u32
}

/// Mask with bits `0..=offset` set.
#[inline]
fn mask_upto(offset: u32) -> u64 {
    if offset == 63 {
        u64::MAX
    } else {
        (1u64 << (offset + 1)) - 1
    }
}

/// Mask with bits `offset..64` set.
#[inline]
fn mask_from(offset: u32) -> u64 {
    u64::MAX << offset
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bitset {
    size: usize,
    words: Vec<u64>,
}

impl Bitset {
    /// Create a bitset of `size` bits, all clear.
    pub fn new(size: usize) -> Result<Self> {
        let nwords = size.div_ceil(WORD_BITS);
        let mut words = Vec::new();
        words.try_reserve_exact(nwords)?;
        words.resize(nwords, 0);
        Ok(Self { size, words })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Clear every bit.
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    #[inline]
    fn check(&self, bit: usize) -> Result<()> {
        if bit >= self.size {
            return Err(Error::OutOfRange {
                index: bit,
                size: self.size,
            });
        }
        Ok(())
    }

    pub fn set(&mut self, bit: usize) -> Result<()> {
        self.check(bit)?;
        self.words[word_of(bit)] |= 1u64 << offset_of(bit);
        Ok(())
    }

    pub fn clear(&mut self, bit: usize) -> Result<()> {
        self.check(bit)?;
        self.words[word_of(bit)] &= !(1u64 << offset_of(bit));
        Ok(())
    }

    pub fn is_set(&self, bit: usize) -> Result<bool> {
        self.check(bit)?;
        Ok(self.words[word_of(bit)] & (1u64 << offset_of(bit)) != 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest set bit at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.scan_forward(from, |w| w)
    }

    /// Lowest clear bit at or after `from`, never past the end of the set.
    pub fn next_clear_bit(&self, from: usize) -> Option<usize> {
        self.scan_forward(from, |w| !w)
    }

    /// Highest set bit at or before `from`. `from` past the end is clamped.
    pub fn prev_set_bit(&self, from: usize) -> Option<usize> {
        self.scan_backward(from, |w| w)
    }

    /// Highest clear bit at or before `from`. `from` past the end is clamped.
    pub fn prev_clear_bit(&self, from: usize) -> Option<usize> {
        self.scan_backward(from, |w| !w)
    }

    fn scan_forward(&self, from: usize, view: impl Fn(u64) -> u64) -> Option<usize> {
        if from >= self.size {
            return None;
        }
        let mut w = word_of(from);
        let mut word = view(self.words[w]) & mask_from(offset_of(from));
        loop {
            if word != 0 {
                let bit = w * WORD_BITS + word.trailing_zeros() as usize;
                // Inverted views expose the unused tail of the last word.
                return (bit < self.size).then_some(bit);
            }
            w += 1;
            if w == self.words.len() {
                return None;
            }
            word = view(self.words[w]);
        }
    }

    fn scan_backward(&self, from: usize, view: impl Fn(u64) -> u64) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        let from = from.min(self.size - 1);
        let mut w = word_of(from);
        let mut word = view(self.words[w]) & mask_upto(offset_of(from));
        loop {
            if word != 0 {
                return Some(w * WORD_BITS + (63 - word.leading_zeros() as usize));
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            word = view(self.words[w]);
        }
    }

    /// Iterate over set bits in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.next_set_bit(0);
        core::iter::from_fn(move || {
            let bit = next?;
            next = self.next_set_bit(bit + 1);
            Some(bit)
        })
    }

    /// Compare the first `len` bits of two sets.
    ///
    /// Panics if `len` exceeds the size of either set.
    pub fn eq_prefix(&self, other: &Bitset, len: usize) -> bool {
        assert!(
            len <= self.size && len <= other.size,
            "prefix length {len} exceeds bitset size"
        );
        let full = len / WORD_BITS;
        if self.words[..full] != other.words[..full] {
            return false;
        }
        let rem = offset_of(len);
        if rem == 0 {
            return true;
        }
        let mask = (1u64 << rem) - 1;
        self.words[full] & mask == other.words[full] & mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(size: usize, bits: impl IntoIterator<Item = usize>) -> Bitset {
        let mut b = Bitset::new(size).unwrap();
        for i in bits {
            b.set(i).unwrap();
        }
        b
    }

    /// Invariant: word storage is `ceil(size / 64)` and starts zeroed.
    #[test]
    fn init_sizes_words() {
        for (size, words) in [(1, 1), (64, 1), (65, 2), (1025, 17), (0, 0)] {
            let b = Bitset::new(size).unwrap();
            assert_eq!(b.size(), size);
            assert_eq!(b.words.len(), words);
            assert!(b.words.iter().all(|w| *w == 0));
        }
    }

    #[test]
    fn set_and_clear_track_words() {
        let size = 1025;
        let mut b = Bitset::new(size).unwrap();
        for i in 0..size {
            assert_eq!(b.is_set(i), Ok(false));
        }
        for i in 0..size {
            b.set(i).unwrap();
        }
        for i in 0..size {
            assert_eq!(b.is_set(i), Ok(true));
        }
        assert!(b.words[..16].iter().all(|w| *w == u64::MAX));
        assert_eq!(b.words[16], 1);

        for i in 0..size {
            b.clear(i).unwrap();
        }
        assert!(b.words.iter().all(|w| *w == 0));

        for i in (0..size).step_by(64) {
            b.set(i).unwrap();
        }
        assert!(b.words.iter().all(|w| *w == 1));
        assert_eq!(b.count_ones(), 17);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut b = Bitset::new(11).unwrap();
        let err = Error::OutOfRange { index: 11, size: 11 };
        assert_eq!(b.set(11), Err(err));
        assert_eq!(b.clear(11), Err(err));
        assert_eq!(b.is_set(11), Err(err));
        assert!(b.set(10).is_ok());
    }

    #[test]
    fn prev_set_bit() {
        let mut b = Bitset::new(1001).unwrap();
        assert_eq!(b.prev_set_bit(1000), None);
        assert_eq!(b.prev_set_bit(499), None);
        assert_eq!(b.prev_set_bit(1), None);

        for i in 0..500 {
            b.set(i).unwrap();
        }
        assert_eq!(b.prev_set_bit(1000), Some(499));
        assert_eq!(b.prev_set_bit(500), Some(499));
        assert_eq!(b.prev_set_bit(499), Some(499));

        b.clear(499).unwrap();
        assert_eq!(b.prev_set_bit(1000), Some(498));
        assert_eq!(b.prev_set_bit(500), Some(498));
        assert_eq!(b.prev_set_bit(499), Some(498));

        b.set(510).unwrap();
        assert_eq!(b.prev_set_bit(1000), Some(510));
        assert_eq!(b.prev_set_bit(500), Some(498));
        assert_eq!(b.prev_set_bit(499), Some(498));
    }

    #[test]
    fn next_set_bit() {
        let mut b = Bitset::new(1001).unwrap();
        assert_eq!(b.next_set_bit(1000), None);
        assert_eq!(b.next_set_bit(499), None);
        assert_eq!(b.next_set_bit(0), None);

        for i in 500..1001 {
            b.set(i).unwrap();
        }
        assert_eq!(b.next_set_bit(1), Some(500));
        assert_eq!(b.next_set_bit(500), Some(500));
        assert_eq!(b.next_set_bit(501), Some(501));

        b.clear(500).unwrap();
        assert_eq!(b.next_set_bit(1), Some(501));
        assert_eq!(b.next_set_bit(500), Some(501));

        b.set(10).unwrap();
        assert_eq!(b.next_set_bit(1), Some(10));
        assert_eq!(b.next_set_bit(500), Some(501));
        assert_eq!(b.next_set_bit(1001), None);
    }

    #[test]
    fn prev_clear_bit() {
        let mut b = filled(1001, 0..500);
        assert_eq!(b.prev_clear_bit(1000), Some(1000));
        assert_eq!(b.prev_clear_bit(500), Some(500));
        assert_eq!(b.prev_clear_bit(499), None);

        b.clear(499).unwrap();
        assert_eq!(b.prev_clear_bit(499), Some(499));

        b.clear(10).unwrap();
        assert_eq!(b.prev_clear_bit(1000), Some(1000));
        assert_eq!(b.prev_clear_bit(498), Some(10));
        assert_eq!(b.prev_clear_bit(10), Some(10));
        assert_eq!(b.prev_clear_bit(9), None);
    }

    /// Invariant: the unused tail of the last word never reads as clear.
    #[test]
    fn next_clear_bit_stops_at_size() {
        let mut b = filled(1001, 500..1001);
        assert_eq!(b.next_clear_bit(0), Some(0));
        assert_eq!(b.next_clear_bit(499), Some(499));
        assert_eq!(b.next_clear_bit(500), None);

        b.set(0).unwrap();
        assert_eq!(b.next_clear_bit(0), Some(1));
        assert_eq!(b.next_clear_bit(500), None);

        b.clear(1000).unwrap();
        assert_eq!(b.next_clear_bit(0), Some(1));
        assert_eq!(b.next_clear_bit(500), Some(1000));
    }

    #[test]
    fn empty_bitset_scans_return_none() {
        let b = Bitset::new(0).unwrap();
        assert_eq!(b.next_set_bit(0), None);
        assert_eq!(b.prev_set_bit(0), None);
        assert_eq!(b.next_clear_bit(0), None);
        assert_eq!(b.prev_clear_bit(5), None);
    }

    #[test]
    fn reset_and_iter_ones() {
        let mut b = filled(200, [3, 64, 65, 199]);
        assert_eq!(b.iter_ones().collect::<Vec<_>>(), vec![3, 64, 65, 199]);
        b.reset();
        assert_eq!(b.iter_ones().count(), 0);
        assert_eq!(b.size(), 200);
    }

    #[test]
    fn eq_prefix_ignores_bits_past_len() {
        let a = filled(130, [1, 70, 129]);
        let b = filled(130, [1, 70, 100]);
        assert!(a.eq_prefix(&b, 100));
        assert!(!a.eq_prefix(&b, 101));
        assert!(a.eq_prefix(&b, 64));
        assert!(a.eq_prefix(&b, 0));
        assert_ne!(a, b);
    }
}
