//! Word-parity checksum used by raw digitizer packets.
//!
//! The acquisition system stores a "CRC" word chosen so that the XOR of
//! every 32-bit word in the packet, the CRC word included, is zero. This is
//! not a polynomial CRC.

/// Running XOR checksum over 32-bit words.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WordXor {
    value: u32,
}

impl WordXor {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    #[inline(always)]
    pub const fn update(self, word: u32) -> Self {
        Self {
            value: self.value ^ word,
        }
    }

    #[inline(always)]
    pub fn update_all<I: IntoIterator<Item = u32>>(self, words: I) -> Self {
        words.into_iter().fold(self, Self::update)
    }

    pub const fn value(self) -> u32 {
        self.value
    }

    /// A packet whose words were all fed in passes when the residue is zero.
    pub const fn is_clean(self) -> bool {
        self.value == 0
    }
}

#[test]
fn xor_residue_cancels() {
    let words = [2048u32, 1, 74, 0, 0xDEAD_BEEF, 0, 0xFF];
    let seal = WordXor::new().update_all(words).value();

    let sealed = WordXor::new().update_all(words).update(seal);
    assert!(sealed.is_clean());

    for bit in 0..32 {
        let mut flipped = words;
        flipped[4] ^= 1 << bit;
        assert!(!WordXor::new().update_all(flipped).update(seal).is_clean());
    }
}
