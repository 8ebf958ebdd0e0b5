use std::io::{self, BufRead, Seek, SeekFrom};

use log::debug;

use crate::structs::layout::RAW_STX;

/// Start marker as it appears on the wire (`00 08 00 00`).
const MARKER: u32 = RAW_STX as u32;

/// Finds the next packet start marker in a byte stream.
///
/// The search slides one byte at a time rather than stepping over whole
/// 32-bit words from the cursor. A marker that starts at any byte offset
/// is found, so alignment is recovered after garbage that is not a whole
/// number of words. A word-stepping scan would miss such a marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resynchronizer;

impl Resynchronizer {
    /// Advances `reader` until the marker is the next thing to be read.
    ///
    /// Returns the number of bytes skipped. If the stream ends first the
    /// cursor is left at end-of-file and every byte read counts as skipped.
    pub fn resync<R: BufRead + Seek>(&self, reader: &mut R) -> io::Result<u64> {
        let mut window = 0u32;
        let mut seen = 0u64;

        loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                debug!("No start marker before end of stream, skipped {seen} bytes");
                return Ok(seen);
            }

            let len = buf.len();
            let mut hit = None;
            for (i, &byte) in buf.iter().enumerate() {
                window = (window >> 8) | (u32::from(byte) << 24);
                if seen + i as u64 >= 3 && window == MARKER {
                    hit = Some(i + 1);
                    break;
                }
            }

            match hit {
                Some(consumed) => {
                    reader.consume(consumed);
                    reader.seek(SeekFrom::Current(-4))?;
                    let skipped = seen + consumed as u64 - 4;
                    if skipped > 0 {
                        debug!("Resynchronized after {skipped} bytes");
                    }
                    return Ok(skipped);
                }
                None => {
                    reader.consume(len);
                    seen += len as u64;
                }
            }
        }
    }
}
