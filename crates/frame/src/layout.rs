//! Binary layout of the container: constants, headers and record kinds
//!
//! All integers are little-endian and every structure is packed, so the
//! sizes below are exact on-wire sizes.

use crate::{FrameError, Result};
use serde::{Deserialize, Serialize};

/// Data shards per frame
pub const K_SHARDS: usize = 192;
/// Bytes per shard
pub const SHARD_LEN: usize = 64;
/// Data bytes per frame
pub const FRAME_BYTES: usize = K_SHARDS * SHARD_LEN;
/// Largest redundancy that keeps k + r within a GF(2^8) codeword
pub const MAX_R: u16 = 63;
/// RS codeword length ceiling for 8-bit symbols
pub const CODEWORD_MAX: usize = 255;
/// Container format revision written and accepted
pub const FORMAT_VERSION: u16 = 4;

/// Frames per interleave group when none is requested
pub const DEFAULT_INTERLEAVE_DEPTH: u16 = 16;
/// Slice size when none is requested
pub const DEFAULT_SLICE_BYTES: u16 = 512;
/// Redundancy used by the tools when none is configured
pub const DEFAULT_REDUNDANCY: u16 = 16;

/// "RSCT"
pub const GLOBAL_MAGIC: u32 = 0x5443_5352;
/// "RFS4" on the wire
pub const FRAME_MAGIC: u32 = 0x3453_4652;
/// "RSL4"
pub const SLICE_MAGIC: u32 = 0x344c_5352;

/// Bytes taken by the data-shard CRC16 table
pub const CRC_DATA_TABLE_BYTES: usize = K_SHARDS * 2;

/// GF(2^8) shortening for a given redundancy: 255 - (k + r)
pub fn compute_pad(r: u16) -> Result<u16> {
    if r == 0 || r > MAX_R {
        return Err(FrameError::InvalidRedundancy { r });
    }
    let pad = CODEWORD_MAX as i32 - (K_SHARDS as i32 + r as i32);
    if pad < 0 {
        return Err(FrameError::InvalidRedundancy { r });
    }
    Ok(pad as u16)
}

/// Parity bytes per frame
pub fn parity_len(r: u16) -> usize {
    r as usize * SHARD_LEN
}

/// Bytes taken by the parity-shard CRC16 table
pub fn crc_parity_table_len(r: u16) -> usize {
    r as usize * 2
}

/// Length of a frame's logical payload: data ‖ parity ‖ crcD ‖ crcP
pub fn payload_len(r: u16) -> usize {
    FRAME_BYTES + parity_len(r) + CRC_DATA_TABLE_BYTES + crc_parity_table_len(r)
}

/// ceil(original_size / FRAME_BYTES)
pub fn frame_count_for(original_size: u64) -> u64 {
    original_size.div_ceil(FRAME_BYTES as u64)
}

/// Little-endian field reader over a buffer whose length was checked up front
struct LeReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
}

/// Container-wide parameters, written once at the start of the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalHeader {
    pub magic: u32,
    pub version: u16,
    pub k: u16,
    pub r: u16,
    pub shard_len: u16,
    pub pad: u16,
    pub original_size: u64,
    pub frame_count: u64,
    pub interleave_depth: u16,
    pub slice_bytes: u16,
    pub reserved: u16,
}

impl GlobalHeader {
    /// Size of the global header in bytes
    pub const SIZE: usize = 36;

    /// Describe a container for `original_size` source bytes
    pub fn new(
        r: u16,
        original_size: u64,
        interleave_depth: u16,
        slice_bytes: u16,
    ) -> Result<Self> {
        let pad = compute_pad(r)?;
        Ok(Self {
            magic: GLOBAL_MAGIC,
            version: FORMAT_VERSION,
            k: K_SHARDS as u16,
            r,
            shard_len: SHARD_LEN as u16,
            pad,
            original_size,
            frame_count: frame_count_for(original_size),
            interleave_depth,
            slice_bytes,
            reserved: 0,
        })
    }

    /// Check identity and parameters against what this build understands
    pub fn validate(&self) -> Result<()> {
        if self.magic != GLOBAL_MAGIC {
            return Err(FrameError::BadMagic { found: self.magic });
        }
        if self.version != FORMAT_VERSION {
            return Err(FrameError::UnsupportedVersion { found: self.version });
        }
        if self.k as usize != K_SHARDS || self.shard_len as usize != SHARD_LEN {
            return Err(FrameError::ParameterMismatch {
                msg: format!(
                    "k={} shard_len={}, expected k={} shard_len={}",
                    self.k, self.shard_len, K_SHARDS, SHARD_LEN
                ),
            });
        }
        let pad = compute_pad(self.r)?;
        if self.pad != pad {
            return Err(FrameError::ParameterMismatch {
                msg: format!("pad={} does not match r={} (expected {})", self.pad, self.r, pad),
            });
        }
        let frames = frame_count_for(self.original_size);
        if self.frame_count != frames {
            return Err(FrameError::ParameterMismatch {
                msg: format!(
                    "frame_count={} does not cover original_size={} (expected {})",
                    self.frame_count, self.original_size, frames
                ),
            });
        }
        if self.frame_count.checked_mul(self.symbols_per_frame()).is_none()
            || self.frame_count.checked_mul(self.slices_per_frame()).is_none()
        {
            return Err(FrameError::ParameterMismatch {
                msg: format!("original_size={} is too large to track", self.original_size),
            });
        }
        Ok(())
    }

    /// Parity bytes per frame
    pub fn parity_len(&self) -> usize {
        parity_len(self.r)
    }

    /// Logical payload bytes per frame
    pub fn payload_len(&self) -> usize {
        payload_len(self.r)
    }

    /// RS symbols per frame, data and parity: (k + r) columns of shard length
    pub fn symbols_per_frame(&self) -> u64 {
        (K_SHARDS as u64 + self.r as u64) * SHARD_LEN as u64
    }

    /// Slices needed to carry one frame's payload
    pub fn slices_per_frame(&self) -> u64 {
        if self.slice_bytes == 0 {
            return 0;
        }
        self.payload_len().div_ceil(self.slice_bytes as usize) as u64
    }

    /// Expected number of slice records in a complete container
    pub fn total_slices(&self) -> u64 {
        self.frame_count.saturating_mul(self.slices_per_frame())
    }

    /// Valid data bytes carried by frame `index`
    pub fn frame_data_len(&self, index: u64) -> usize {
        let start = index.saturating_mul(FRAME_BYTES as u64);
        let remaining = self.original_size.saturating_sub(start);
        remaining.min(FRAME_BYTES as u64) as usize
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.k.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.r.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.shard_len.to_le_bytes());
        bytes[12..14].copy_from_slice(&self.pad.to_le_bytes());
        bytes[14..22].copy_from_slice(&self.original_size.to_le_bytes());
        bytes[22..30].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[30..32].copy_from_slice(&self.interleave_depth.to_le_bytes());
        bytes[32..34].copy_from_slice(&self.slice_bytes.to_le_bytes());
        bytes[34..36].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes; call [`GlobalHeader::validate`] before trusting it
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(FrameError::TruncatedHeader);
        }

        let mut rd = LeReader::new(bytes);
        Ok(Self {
            magic: rd.u32(),
            version: rd.u16(),
            k: rd.u16(),
            r: rd.u16(),
            shard_len: rd.u16(),
            pad: rd.u16(),
            original_size: rd.u64(),
            frame_count: rd.u64(),
            interleave_depth: rd.u16(),
            slice_bytes: rd.u16(),
            reserved: rd.u16(),
        })
    }
}

/// Per-frame metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub index: u64,
    /// Valid data bytes in this frame (< FRAME_BYTES only for the last one)
    pub data_len: u16,
    pub parity_len: u16,
    /// CRC32 of the zero-padded data block
    pub crc32_data: u32,
    /// CRC32 of the parity block
    pub crc32_parity: u32,
}

impl FrameHeader {
    /// Size of the frame header in bytes, magic included
    pub const SIZE: usize = 24;

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&FRAME_MAGIC.to_le_bytes());
        bytes[4..12].copy_from_slice(&self.index.to_le_bytes());
        bytes[12..14].copy_from_slice(&self.data_len.to_le_bytes());
        bytes[14..16].copy_from_slice(&self.parity_len.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.crc32_data.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.crc32_parity.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(FrameError::InvalidFormat {
                msg: format!("Frame header too short: {} bytes", bytes.len()),
            });
        }

        let mut rd = LeReader::new(bytes);
        let magic = rd.u32();
        if magic != FRAME_MAGIC {
            return Err(FrameError::InvalidFormat {
                msg: format!("Not a frame header: magic {:#010x}", magic),
            });
        }

        Ok(Self {
            index: rd.u64(),
            data_len: rd.u16(),
            parity_len: rd.u16(),
            crc32_data: rd.u32(),
            crc32_parity: rd.u32(),
        })
    }
}

/// Header of one transport slice; `size` payload bytes follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceHeader {
    pub frame_index: u64,
    /// Byte offset within the owning frame's logical payload
    pub offset: u32,
    pub size: u16,
    /// CRC32 of the slice bytes
    pub crc32: u32,
}

impl SliceHeader {
    /// Size of the slice header in bytes, magic included
    pub const SIZE: usize = 22;

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&SLICE_MAGIC.to_le_bytes());
        bytes[4..12].copy_from_slice(&self.frame_index.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.offset.to_le_bytes());
        bytes[16..18].copy_from_slice(&self.size.to_le_bytes());
        bytes[18..22].copy_from_slice(&self.crc32.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(FrameError::InvalidFormat {
                msg: format!("Slice header too short: {} bytes", bytes.len()),
            });
        }

        let mut rd = LeReader::new(bytes);
        let magic = rd.u32();
        if magic != SLICE_MAGIC {
            return Err(FrameError::InvalidFormat {
                msg: format!("Not a slice header: magic {:#010x}", magic),
            });
        }

        Ok(Self {
            frame_index: rd.u64(),
            offset: rd.u32(),
            size: rd.u16(),
            crc32: rd.u32(),
        })
    }
}

/// Record types that can follow the global header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Frame,
    Slice,
}

impl RecordKind {
    /// Identify a record from its leading magic
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            FRAME_MAGIC => Some(RecordKind::Frame),
            SLICE_MAGIC => Some(RecordKind::Slice),
            _ => None,
        }
    }

    /// Leading magic of this record kind
    pub fn magic(self) -> u32 {
        match self {
            RecordKind::Frame => FRAME_MAGIC,
            RecordKind::Slice => SLICE_MAGIC,
        }
    }

    /// Full header size, magic included
    pub fn header_size(self) -> usize {
        match self {
            RecordKind::Frame => FrameHeader::SIZE,
            RecordKind::Slice => SliceHeader::SIZE,
        }
    }
}
