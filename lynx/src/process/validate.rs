use std::fmt::{Display, Formatter};

use crate::structs::layout::{PacketLayout, RAW_PACKET_ID, RAW_STX};
use crate::structs::raw_packet::RawPacket;

/// Why a packet was rejected, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    StartMarkerMismatch,
    PacketIdMismatch,
    SizeFieldMismatch,
    CrcMismatch,
    TimestampOutOfOrder,
}

impl RejectionKind {
    pub const COUNT: usize = 5;

    pub const ALL: [RejectionKind; Self::COUNT] = [
        RejectionKind::StartMarkerMismatch,
        RejectionKind::PacketIdMismatch,
        RejectionKind::SizeFieldMismatch,
        RejectionKind::CrcMismatch,
        RejectionKind::TimestampOutOfOrder,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Marker, CRC and timestamp errors count towards the error budget.
    pub const fn counts_against_budget(self) -> bool {
        matches!(
            self,
            RejectionKind::StartMarkerMismatch
                | RejectionKind::CrcMismatch
                | RejectionKind::TimestampOutOfOrder
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            RejectionKind::StartMarkerMismatch => "bad stx",
            RejectionKind::PacketIdMismatch => "bad packet id",
            RejectionKind::SizeFieldMismatch => "bad packet size",
            RejectionKind::CrcMismatch => "bad crc",
            RejectionKind::TimestampOutOfOrder => "out of order timestamp",
        }
    }
}

impl Display for RejectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Length of the valid prefix of a batch and, if the prefix is shorter than
/// the batch, why the next packet failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: usize,
    pub rejection: Option<RejectionKind>,
}

impl ValidationOutcome {
    pub fn valid(len: usize) -> Self {
        Self {
            accepted: len,
            rejection: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Classifies packets against the structural and ordering rules of the
/// raw digitizer stream.
///
/// Checks run in a fixed order per packet and stop at the first packet
/// failing any of them; everything from that packet on is rejected.
#[derive(Debug, Clone, Copy)]
pub struct PacketValidator<'a> {
    layout: &'a PacketLayout,
}

impl<'a> PacketValidator<'a> {
    pub fn new(layout: &'a PacketLayout) -> Self {
        Self { layout }
    }

    /// `watermark` is the last timestamp accepted before this batch.
    pub fn validate(&self, packets: &[RawPacket], watermark: u64) -> ValidationOutcome {
        let mut floor = watermark;
        for (index, packet) in packets.iter().enumerate() {
            if let Some(kind) = self.check(packet, floor) {
                return ValidationOutcome {
                    accepted: index,
                    rejection: Some(kind),
                };
            }
            floor = packet.timestamp();
        }

        ValidationOutcome::valid(packets.len())
    }

    /// First failing check for a single packet.
    pub fn check(&self, packet: &RawPacket, floor: u64) -> Option<RejectionKind> {
        if packet.stx != RAW_STX {
            return Some(RejectionKind::StartMarkerMismatch);
        }
        if packet.pkt_id != RAW_PACKET_ID {
            return Some(RejectionKind::PacketIdMismatch);
        }
        if packet.pkt_data_size != self.layout.expected_data_size()
            || packet.data.len() != self.layout.channels()
        {
            return Some(RejectionKind::SizeFieldMismatch);
        }
        if !packet.crc_intact() {
            return Some(RejectionKind::CrcMismatch);
        }
        if packet.timestamp() < floor {
            return Some(RejectionKind::TimestampOutOfOrder);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn packets(layout: &PacketLayout, stamps: &[u64]) -> Result<Vec<RawPacket>> {
        stamps
            .iter()
            .map(|&ts| RawPacket::new(layout, ts, 0, vec![ts as i32; layout.channels()]))
            .collect()
    }

    #[test]
    fn clean_batch_passes() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let batch = packets(&layout, &[1, 2, 2, 3])?;
        let outcome = PacketValidator::new(&layout).validate(&batch, 0);
        assert_eq!(outcome, ValidationOutcome::valid(4));
        assert!(outcome.is_valid());
        Ok(())
    }

    #[test]
    fn out_of_order_within_batch() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let batch = packets(&layout, &[100, 105, 104, 110])?;
        let outcome = PacketValidator::new(&layout).validate(&batch, 0);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejection, Some(RejectionKind::TimestampOutOfOrder));
        Ok(())
    }

    #[test]
    fn watermark_from_previous_batch() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let batch = packets(&layout, &[50, 60])?;
        let validator = PacketValidator::new(&layout);

        let outcome = validator.validate(&batch, 51);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rejection, Some(RejectionKind::TimestampOutOfOrder));

        assert!(validator.validate(&batch, 50).is_valid());
        Ok(())
    }

    #[test]
    fn first_failing_packet_wins() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let mut batch = packets(&layout, &[10, 20, 30, 40, 50, 60])?;
        batch[1].stx = 0;
        batch[1].seal();
        batch[3].data[0] ^= 1;
        batch[5].timestamp_low = 1;
        batch[5].seal();

        let outcome = PacketValidator::new(&layout).validate(&batch, 0);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejection, Some(RejectionKind::StartMarkerMismatch));
        Ok(())
    }

    #[test]
    fn check_order_on_one_packet() -> Result<()> {
        let layout = PacketLayout::raw(4)?;
        let validator = PacketValidator::new(&layout);
        let good = RawPacket::new(&layout, 10, 0, vec![1, 2, 3, 4])?;

        let mut p = good.clone();
        p.pkt_id = 2;
        p.pkt_data_size = 3;
        assert_eq!(validator.check(&p, 0), Some(RejectionKind::PacketIdMismatch));

        let mut p = good.clone();
        p.pkt_data_size = 3;
        p.seal();
        assert_eq!(validator.check(&p, 0), Some(RejectionKind::SizeFieldMismatch));

        let mut p = good.clone();
        p.crc ^= 1 << 31;
        assert_eq!(validator.check(&p, 11), Some(RejectionKind::CrcMismatch));

        assert_eq!(validator.check(&good, 11), Some(RejectionKind::TimestampOutOfOrder));
        assert_eq!(validator.check(&good, 10), None);
        Ok(())
    }

    #[test]
    fn every_single_bit_flip_fails_crc() -> Result<()> {
        let layout = PacketLayout::raw(2)?;
        let validator = PacketValidator::new(&layout);
        let good = RawPacket::new(&layout, 7, 3, vec![-1, 1])?;

        for bit in 0..32 {
            let mut p = good.clone();
            p.ttl ^= 1 << bit;
            assert_eq!(validator.check(&p, 0), Some(RejectionKind::CrcMismatch));

            let mut p = good.clone();
            p.extra[9] ^= 1 << bit;
            assert_eq!(validator.check(&p, 0), Some(RejectionKind::CrcMismatch));
        }
        Ok(())
    }

    #[test]
    fn budget_membership() {
        let gated: Vec<_> = RejectionKind::ALL
            .into_iter()
            .filter(|k| k.counts_against_budget())
            .collect();
        assert_eq!(
            gated,
            [
                RejectionKind::StartMarkerMismatch,
                RejectionKind::CrcMismatch,
                RejectionKind::TimestampOutOfOrder
            ]
        );
    }
}
