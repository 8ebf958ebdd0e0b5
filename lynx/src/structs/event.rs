//! Event records
//!
//! Events are TTL transitions and operator annotations. The event string is
//! a NUL-padded 128-byte field and is only decoded on request.

use lynx_macros::{FromBytes, ToBytes};

use crate::structs::Record;
use crate::structs::layout::PacketLayout;

pub const EVENT_STRING_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, ToBytes, FromBytes)]
pub struct EventRecord {
    pub stx: i16,
    pub pkt_id: i16,
    pub pkt_data_size: i16,
    pub timestamp: u64,
    pub event_id: i16,
    pub ttl: u16,
    pub crc: i16,
    pub dummy1: i16,
    pub dummy2: i16,
    pub extra: [i32; 8],
    pub event_string: [u8; EVENT_STRING_LEN],
}

impl EventRecord {
    /// The annotation text with NUL padding and surrounding whitespace removed.
    pub fn event_string(&self) -> String {
        let end = self
            .event_string
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(EVENT_STRING_LEN);
        String::from_utf8_lossy(&self.event_string[..end])
            .trim()
            .to_string()
    }
}

impl Record for EventRecord {
    fn layout() -> PacketLayout {
        PacketLayout::event()
    }
}

#[test]
fn event_string_trims_padding() {
    let mut text = [0u8; EVENT_STRING_LEN];
    text[..22].copy_from_slice(b" TTL Input on port 0  ");
    let event = EventRecord {
        stx: 2048,
        pkt_id: 4098,
        pkt_data_size: 2,
        timestamp: 17,
        event_id: 11,
        ttl: 0x8000,
        crc: 0,
        dummy1: 0,
        dummy2: 0,
        extra: [0; 8],
        event_string: text,
    };
    assert_eq!(event.event_string(), "TTL Input on port 0");
}
