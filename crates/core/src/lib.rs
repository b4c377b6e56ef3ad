//! RSCT Core - field arithmetic, checksums and shard buffers
//!
//! This crate provides the primitives the container codec is built on:
//! GF(2^8) log/antilog tables, the CRC16/CRC32 checksums used as integrity
//! markers, and a row-major shard matrix with column access.

pub mod buffer;
pub mod checksum;
pub mod gf256;
pub mod error;

pub use error::{CoreError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        buffer::ShardMatrix,
        checksum::{crc16_ccitt, crc32},
        gf256::Gf256,
        error::{CoreError, Result},
    };
}
