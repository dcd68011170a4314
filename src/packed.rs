//! Fixed-width 2-bit-per-cell storage for board intersections.
//!
//! Sixteen cells share one `u32`, so a 19x19 board needs 23 words.

/// A fixed-length array of 2-bit values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedCells {
    words: Vec<u32>,
    len: usize,
}

impl PackedCells {
    /// Create `len` cells, all zero.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; (len * 2).div_ceil(32)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of backing words.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        let bit = index << 1;
        ((self.words[bit >> 5] >> (bit & 31)) & 3) as u8
    }

    /// Store the low two bits of `value` at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        let bit = index << 1;
        let shift = bit & 31;
        let word = &mut self.words[bit >> 5];
        *word = (*word & !(3 << shift)) | (u32::from(value & 3) << shift);
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(|i| self.get(i))
    }
}
