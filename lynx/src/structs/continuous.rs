//! Continuous-voltage records
//!
//! Each record carries 512 samples of one analog channel; only the first
//! `valid_samples` of them are real data.

use lynx_macros::{FromBytes, ToBytes};

use crate::structs::Record;
use crate::structs::layout::{CONTINUOUS_SAMPLES, PacketLayout};

#[derive(Debug, Clone, PartialEq, Eq, ToBytes, FromBytes)]
pub struct ContinuousRecordPacket {
    pub timestamp: u64,
    pub channel: u32,
    pub nominal_rate: u32,
    pub valid_samples: u32,
    pub samples: [i16; CONTINUOUS_SAMPLES],
}

impl ContinuousRecordPacket {
    /// The prefix of `samples` that carries data.
    pub fn valid(&self) -> &[i16] {
        let n = (self.valid_samples as usize).min(CONTINUOUS_SAMPLES);
        &self.samples[..n]
    }

    pub fn valid_count(&self) -> usize {
        self.valid().len()
    }
}

impl Record for ContinuousRecordPacket {
    fn layout() -> PacketLayout {
        PacketLayout::continuous()
    }
}

#[test]
fn valid_prefix_is_clamped() {
    let mut packet = ContinuousRecordPacket {
        timestamp: 0,
        channel: 3,
        nominal_rate: 32_000,
        valid_samples: 4,
        samples: [1; CONTINUOUS_SAMPLES],
    };
    assert_eq!(packet.valid(), &[1, 1, 1, 1]);

    packet.valid_samples = 10_000;
    assert_eq!(packet.valid_count(), CONTINUOUS_SAMPLES);
}
