//! Checksums used as integrity markers inside the container

use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no final xor
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Per-shard checksum used to mark erasures before RS decoding
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// CRC-32 (ISO-HDLC / zlib) over slices and whole data/parity blocks
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}
