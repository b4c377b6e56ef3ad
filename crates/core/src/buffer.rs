//! Shard matrix: equal-length shards stored row-major in one allocation

use crate::{CoreError, Result};

/// Allocate a zeroed byte vector, reporting allocation failure instead of aborting
pub fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| CoreError::Allocation { bytes: len })?;
    bytes.resize(len, 0);
    Ok(bytes)
}

/// A block of `shards` rows, each `shard_len` bytes long.
///
/// Row `i` is shard `i`; column `c` is the byte at offset `c` of every shard,
/// which is exactly one RS codeword's worth of symbols from this block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMatrix {
    data: Vec<u8>,
    shard_len: usize,
}

impl ShardMatrix {
    /// Create a zeroed matrix
    pub fn new(shards: usize, shard_len: usize) -> Result<Self> {
        if shard_len == 0 {
            return Err(CoreError::InvalidGeometry {
                msg: "shard length must be greater than 0".to_string(),
            });
        }
        let len = shards
            .checked_mul(shard_len)
            .ok_or_else(|| CoreError::InvalidGeometry {
                msg: format!("{} shards of {} bytes overflow", shards, shard_len),
            })?;

        Ok(Self {
            data: try_zeroed(len)?,
            shard_len,
        })
    }

    /// Wrap existing bytes; the length must be a whole number of shards
    pub fn from_vec(data: Vec<u8>, shard_len: usize) -> Result<Self> {
        if shard_len == 0 {
            return Err(CoreError::InvalidGeometry {
                msg: "shard length must be greater than 0".to_string(),
            });
        }
        if data.len() % shard_len != 0 {
            let expected = (data.len() / shard_len + 1) * shard_len;
            return Err(CoreError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { data, shard_len })
    }

    /// Number of shards (rows)
    pub fn shard_count(&self) -> usize {
        self.data.len() / self.shard_len
    }

    /// Bytes per shard (columns)
    pub fn shard_len(&self) -> usize {
        self.shard_len
    }

    /// Total bytes held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the matrix holds no shards
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow one shard
    pub fn shard(&self, index: usize) -> &[u8] {
        let start = index * self.shard_len;
        &self.data[start..start + self.shard_len]
    }

    /// Iterate shards in row order
    pub fn shards(&self) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(self.shard_len)
    }

    /// Copy column `col` of every shard into `out` (one symbol per shard)
    pub fn gather_column(&self, col: usize, out: &mut [u8]) {
        for (symbol, shard) in out.iter_mut().zip(self.shards()) {
            *symbol = shard[col];
        }
    }

    /// Write `symbols` into column `col`, one symbol per shard
    pub fn scatter_column(&mut self, col: usize, symbols: &[u8]) {
        for (shard, &symbol) in self.data.chunks_mut(self.shard_len).zip(symbols) {
            shard[col] = symbol;
        }
    }

    /// The whole block as contiguous bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the whole block
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
