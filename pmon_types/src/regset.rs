// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Maximum architectural register index covered by a [`RegSet`], i.e. valid
/// register numbers are `0..PMON_MAX_REGS`.
pub const PMON_MAX_REGS: usize = 256;

const WORD_BITS: usize = 64;
const WORD_COUNT: usize = PMON_MAX_REGS / WORD_BITS;

/// A fixed-width bit-vector over PMD/PMC register numbers.
///
/// Register `r` is a member iff bit `r % 64` of word `r / 64` is set.
/// The vector is never resized; callers guarantee `r < PMON_MAX_REGS`
/// (debug-asserted).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegSet {
    words: [u64; WORD_COUNT],
}

impl RegSet {
    /// A set with no registers.
    pub const EMPTY: Self = Self {
        words: [0; WORD_COUNT],
    };

    /// Returns an empty register set.
    pub const fn new() -> Self {
        return Self::EMPTY;
    }

    /// Adds register `r` to the set.
    /// PRECONDITION: r < PMON_MAX_REGS.
    pub fn set(&mut self, r: u16) {
        debug_assert!((r as usize) < PMON_MAX_REGS);
        self.words[r as usize / WORD_BITS] |= 1u64 << (r as usize % WORD_BITS);
    }

    /// Removes register `r` from the set.
    /// PRECONDITION: r < PMON_MAX_REGS.
    pub fn clear(&mut self, r: u16) {
        debug_assert!((r as usize) < PMON_MAX_REGS);
        self.words[r as usize / WORD_BITS] &= !(1u64 << (r as usize % WORD_BITS));
    }

    /// Returns true if register `r` is a member of the set.
    /// PRECONDITION: r < PMON_MAX_REGS.
    pub fn isset(&self, r: u16) -> bool {
        debug_assert!((r as usize) < PMON_MAX_REGS);
        return 0 != self.words[r as usize / WORD_BITS] & (1u64 << (r as usize % WORD_BITS));
    }

    /// Unions `src` into `self`.
    pub fn or(&mut self, src: &RegSet) {
        let mut i = 0;
        while i < WORD_COUNT {
            self.words[i] |= src.words[i];
            i += 1;
        }
    }

    /// Replaces the contents of `self` with the contents of `src`.
    pub fn copy_from(&mut self, src: &RegSet) {
        self.words = src.words;
    }

    /// Returns the number of registers in the set.
    pub fn popcount(&self) -> u32 {
        let mut n = 0;
        let mut i = 0;
        while i < WORD_COUNT {
            n += self.words[i].count_ones();
            i += 1;
        }
        return n;
    }

    /// Returns true if no register is in the set.
    pub fn is_empty(&self) -> bool {
        return self.words == [0; WORD_COUNT];
    }

    /// Returns an iterator over member register numbers in ascending order.
    pub fn iter(&self) -> RegSetIter {
        return RegSetIter { set: *self, pos: 0 };
    }
}

/// Iterator over the members of a [`RegSet`] in ascending register order.
#[derive(Clone, Copy, Debug)]
pub struct RegSetIter {
    set: RegSet,
    pos: usize,
}

impl Iterator for RegSetIter {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        while self.pos < PMON_MAX_REGS {
            let word = self.set.words[self.pos / WORD_BITS] >> (self.pos % WORD_BITS);
            if word == 0 {
                // Rest of this word is empty, jump to the next one.
                self.pos = (self.pos / WORD_BITS + 1) * WORD_BITS;
                continue;
            }

            let r = self.pos + word.trailing_zeros() as usize;
            self.pos = r + 1;
            return Some(r as u16);
        }
        return None;
    }
}
