//! Byte-wise magic resynchronization
//!
//! The transport may drop or mangle any number of bytes between records, so
//! the decoder never trusts record boundaries. It slides a 4-byte window over
//! the stream one byte at a time until the window reads as a frame or slice
//! magic.

use crate::layout::RecordKind;
use std::io::{self, Read};

/// Sliding-window scanner for record magics
#[derive(Debug, Default)]
pub struct MagicScanner {
    skipped: u64,
}

impl MagicScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes discarded while hunting for a magic, across all scans
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Advance `reader` past the next record magic and report its kind.
    ///
    /// Returns `Ok(None)` when the stream ends before another magic is found.
    pub fn scan<R: Read>(&mut self, reader: &mut R) -> io::Result<Option<RecordKind>> {
        let mut window = [0u8; 4];
        let filled = read_up_to(reader, &mut window)?;
        if filled < window.len() {
            self.skipped += filled as u64;
            return Ok(None);
        }

        loop {
            if let Some(kind) = RecordKind::from_magic(u32::from_le_bytes(window)) {
                return Ok(Some(kind));
            }

            let mut next = [0u8; 1];
            if !read_full(reader, &mut next)? {
                self.skipped += window.len() as u64;
                return Ok(None);
            }
            window.copy_within(1.., 0);
            window[3] = next[0];
            self.skipped += 1;
        }
    }
}

/// Fill `buf` completely; `Ok(false)` if the stream ended first
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    Ok(read_up_to(reader, buf)? == buf.len())
}

/// Read until `buf` is full or the stream ends; returns the bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
