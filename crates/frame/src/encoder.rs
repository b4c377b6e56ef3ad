//! Pack pipeline: source stream to container
//!
//! Frames are encoded one interleave group at a time. Each frame gets its
//! column-wise RS parity, a CRC16 per shard and a CRC32 over the data and
//! parity blocks; its header is written as soon as it is encoded. The group's
//! payloads are then cut into slices in round-robin order.

use crate::control::{Completion, Controller};
use crate::fec::{FecCode, FecEncoder, ReedSolomon};
use crate::interleave::SliceSchedule;
use crate::layout::{
    FrameHeader, GlobalHeader, SliceHeader, DEFAULT_INTERLEAVE_DEPTH,
    DEFAULT_REDUNDANCY, DEFAULT_SLICE_BYTES, K_SHARDS, SHARD_LEN,
};
use crate::payload::PayloadView;
use crate::{FrameError, Result};
use rsct_core::buffer::{try_zeroed, ShardMatrix};
use rsct_core::checksum::{crc16_ccitt, crc32};
use std::io::{self, BufWriter, Read, Write};
use tracing::{debug, info, trace};

/// Output buffer size
pub(crate) const IO_BUFFER_BYTES: usize = 1 << 20;

/// Pack parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    /// Parity shards per frame, 1..=63
    pub redundancy: u16,
    /// Frames per interleave group; 0 selects the default
    pub interleave_depth: u16,
    /// Payload bytes per slice; 0 selects the default
    pub slice_bytes: u16,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            redundancy: DEFAULT_REDUNDANCY,
            interleave_depth: DEFAULT_INTERLEAVE_DEPTH,
            slice_bytes: DEFAULT_SLICE_BYTES,
        }
    }
}

impl PackOptions {
    /// Create options with the given redundancy and default geometry
    pub fn new(redundancy: u16) -> Self {
        Self {
            redundancy,
            ..Self::default()
        }
    }

    /// Build the global header for `original_size` source bytes
    pub fn header_for(&self, original_size: u64) -> Result<GlobalHeader> {
        let depth = match self.interleave_depth {
            0 => DEFAULT_INTERLEAVE_DEPTH,
            d => d,
        };
        let slice = match self.slice_bytes {
            0 => DEFAULT_SLICE_BYTES,
            s => s,
        };
        GlobalHeader::new(self.redundancy, original_size, depth, slice)
    }
}

/// One encoded frame, kept until its slices have been emitted
#[derive(Debug)]
pub struct EncodedFrame {
    pub header: FrameHeader,
    pub data: ShardMatrix,
    pub parity: ShardMatrix,
    /// Little-endian CRC16 per data shard
    pub crc_data: Vec<u8>,
    /// Little-endian CRC16 per parity shard
    pub crc_parity: Vec<u8>,
}

impl EncodedFrame {
    /// The transport payload: data ‖ parity ‖ crcD ‖ crcP
    pub fn payload(&self) -> PayloadView<'_> {
        PayloadView::new(
            self.data.as_bytes(),
            self.parity.as_bytes(),
            &self.crc_data,
            &self.crc_parity,
        )
    }
}

/// Encodes full frames for one redundancy setting
#[derive(Debug)]
pub struct FrameEncoder {
    rs: ReedSolomon,
    column: Vec<u8>,
}

impl FrameEncoder {
    /// Create an encoder for redundancy `r`
    pub fn new(r: u16) -> Result<Self> {
        let rs = ReedSolomon::for_redundancy(r)?;
        let column = vec![0u8; rs.codeword_len()];
        Ok(Self { rs, column })
    }

    /// Parity shards per frame
    pub fn redundancy(&self) -> usize {
        self.rs.parity_symbols()
    }

    /// Encode frame `index` whose first `data_len` bytes of `data` are valid
    pub fn encode(
        &mut self,
        index: u64,
        data: ShardMatrix,
        data_len: usize,
    ) -> Result<EncodedFrame> {
        if data.shard_count() != K_SHARDS || data.shard_len() != SHARD_LEN {
            return Err(FrameError::SizeMismatch {
                expected: K_SHARDS * SHARD_LEN,
                actual: data.len(),
            });
        }

        let r = self.redundancy();
        let mut parity = ShardMatrix::new(r, SHARD_LEN).map_err(FrameError::from_core)?;

        for col in 0..SHARD_LEN {
            let (symbols, checks) = self.column.split_at_mut(K_SHARDS);
            data.gather_column(col, symbols);
            self.rs.encode_parity(symbols, checks)?;
            parity.scatter_column(col, checks);
        }

        let crc_data = shard_crc_table(&data)?;
        let crc_parity = shard_crc_table(&parity)?;

        let header = FrameHeader {
            index,
            data_len: data_len as u16,
            parity_len: parity.len() as u16,
            crc32_data: crc32(data.as_bytes()),
            crc32_parity: crc32(parity.as_bytes()),
        };

        Ok(EncodedFrame {
            header,
            data,
            parity,
            crc_data,
            crc_parity,
        })
    }
}

/// CRC16 of every shard, serialized as little-endian u16 entries
fn shard_crc_table(shards: &ShardMatrix) -> Result<Vec<u8>> {
    let mut table = try_zeroed(shards.shard_count() * 2).map_err(FrameError::from_core)?;
    for (entry, shard) in table.chunks_exact_mut(2).zip(shards.shards()) {
        entry.copy_from_slice(&crc16_ccitt(shard).to_le_bytes());
    }
    Ok(table)
}

/// Read until `buf` is full or the stream ends; returns bytes read
fn fill_from<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
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

/// Pack `original_size` bytes from `reader` into a container on `writer`.
///
/// A source that ends early is zero-filled up to the declared size. On
/// cancellation the records written so far are flushed and
/// [`Completion::Cancelled`] is returned.
pub fn pack_stream<R: Read, W: Write>(
    reader: &mut R,
    original_size: u64,
    writer: W,
    options: &PackOptions,
    ctl: &mut Controller,
) -> Result<Completion> {
    let header = options.header_for(original_size)?;
    let mut encoder = FrameEncoder::new(header.r)?;
    let mut out = BufWriter::with_capacity(IO_BUFFER_BYTES, writer);

    info!(
        "Packing {} bytes: {} frames, r={}, depth={}, slice={}",
        original_size, header.frame_count, header.r, header.interleave_depth, header.slice_bytes
    );

    out.write_all(&header.to_bytes()).map_err(FrameError::Write)?;

    let total_slices = header.total_slices();
    let payload_len = header.payload_len();
    let depth = header.interleave_depth as u64;
    let mut chunk = try_zeroed(header.slice_bytes as usize).map_err(FrameError::from_core)?;
    let mut emitted = 0u64;
    let mut completion = Completion::Complete;
    let mut batch_start = 0u64;

    'batches: while batch_start < header.frame_count {
        if ctl.is_cancelled() {
            completion = Completion::Cancelled;
            break;
        }

        let members = depth.min(header.frame_count - batch_start) as usize;
        let mut group: Vec<EncodedFrame> = Vec::new();
        group
            .try_reserve_exact(members)
            .map_err(|_| FrameError::Allocation {
                bytes: members * std::mem::size_of::<EncodedFrame>(),
            })?;

        for index in batch_start..batch_start + members as u64 {
            let data_len = header.frame_data_len(index);
            let mut data = ShardMatrix::new(K_SHARDS, SHARD_LEN).map_err(FrameError::from_core)?;
            let got = fill_from(reader, &mut data.as_bytes_mut()[..data_len])
                .map_err(FrameError::Read)?;
            if got < data_len {
                debug!("Source ended early in frame {}: {} of {} bytes", index, got, data_len);
            }

            let frame = encoder.encode(index, data, data_len)?;
            out.write_all(&frame.header.to_bytes()).map_err(FrameError::Write)?;
            group.push(frame);
        }

        let schedule = SliceSchedule::new(payload_len, header.slice_bytes as usize, members)?;
        for item in schedule {
            if item.member == 0 && ctl.is_cancelled() {
                completion = Completion::Cancelled;
                break 'batches;
            }

            let frame = &group[item.member];
            let bytes = &mut chunk[..item.len];
            frame.payload().copy_out(item.offset, bytes);

            let slice = SliceHeader {
                frame_index: frame.header.index,
                offset: item.offset as u32,
                size: item.len as u16,
                crc32: crc32(bytes),
            };
            out.write_all(&slice.to_bytes()).map_err(FrameError::Write)?;
            out.write_all(bytes).map_err(FrameError::Write)?;
            trace!("Slice frame={} offset={} size={}", slice.frame_index, slice.offset, slice.size);

            emitted += 1;
            ctl.report(emitted, total_slices);
        }

        debug!(
            "Packed frames {}..{} ({} slices so far)",
            batch_start,
            batch_start + members as u64,
            emitted
        );
        batch_start += members as u64;
    }

    out.flush().map_err(FrameError::Write)?;

    match completion {
        Completion::Complete => info!("Pack complete: {} slices", emitted),
        Completion::Cancelled => info!("Pack cancelled after {} slices", emitted),
    }
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::FecDecoder;
    use crate::layout::{payload_len, CRC_DATA_TABLE_BYTES, FRAME_BYTES, FRAME_MAGIC, SLICE_MAGIC};
    use std::io::Cursor;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
    }

    fn pack_bytes(input: &[u8], options: &PackOptions) -> Vec<u8> {
        let mut out = Vec::new();
        let completion = pack_stream(
            &mut Cursor::new(input),
            input.len() as u64,
            &mut out,
            options,
            &mut Controller::new(),
        )
        .unwrap();
        assert_eq!(completion, Completion::Complete);
        out
    }

    #[test]
    fn test_header_defaults() {
        let options = PackOptions {
            redundancy: 8,
            interleave_depth: 0,
            slice_bytes: 0,
        };
        let header = options.header_for(100).unwrap();
        assert_eq!(header.interleave_depth, 16);
        assert_eq!(header.slice_bytes, 512);
        assert!(PackOptions::new(0).header_for(100).is_err());
        assert!(PackOptions::new(64).header_for(100).is_err());
    }

    #[test]
    fn test_encoded_frame_is_consistent() {
        let mut encoder = FrameEncoder::new(16).unwrap();
        let data = ShardMatrix::from_vec(pattern(FRAME_BYTES), SHARD_LEN).unwrap();
        let frame = encoder.encode(5, data, FRAME_BYTES).unwrap();

        assert_eq!(frame.header.index, 5);
        assert_eq!(frame.header.parity_len, 1024);
        assert_eq!(frame.header.crc32_data, crc32(frame.data.as_bytes()));
        assert_eq!(frame.crc_data.len(), CRC_DATA_TABLE_BYTES);
        assert_eq!(frame.crc_parity.len(), 32);
        assert_eq!(
            u16::from_le_bytes([frame.crc_data[2], frame.crc_data[3]]),
            crc16_ccitt(frame.data.shard(1))
        );
        assert_eq!(frame.payload().len(), payload_len(16));

        // Every column is a codeword
        let rs = ReedSolomon::for_redundancy(16).unwrap();
        let mut column = vec![0u8; 208];
        for col in 0..SHARD_LEN {
            frame.data.gather_column(col, &mut column[..192]);
            frame.parity.gather_column(col, &mut column[192..]);
            assert_eq!(rs.decode(&mut column, &[]).unwrap(), 0);
        }
    }

    #[test]
    fn test_empty_input_is_header_only() {
        let out = pack_bytes(&[], &PackOptions::default());
        assert_eq!(out.len(), GlobalHeader::SIZE);
        let header = GlobalHeader::from_bytes(&out).unwrap();
        assert_eq!(header.frame_count, 0);
        header.validate().unwrap();
    }

    #[test]
    fn test_container_size_and_record_order() {
        let options = PackOptions {
            redundancy: 4,
            interleave_depth: 2,
            slice_bytes: 4096,
        };
        let input = pattern(FRAME_BYTES * 2 + 10);
        let out = pack_bytes(&input, &options);

        let payload = payload_len(4);
        let per_frame = payload.div_ceil(4096);
        let expected = GlobalHeader::SIZE
            + 3 * FrameHeader::SIZE
            + 3 * per_frame * SliceHeader::SIZE
            + 3 * payload;
        assert_eq!(out.len(), expected);

        // Group 0: two frame headers, then slices alternating between frames 0 and 1
        let mut pos = GlobalHeader::SIZE;
        let magic = |p: usize| u32::from_le_bytes(out[p..p + 4].try_into().unwrap());
        assert_eq!(magic(pos), FRAME_MAGIC);
        pos += FrameHeader::SIZE;
        assert_eq!(magic(pos), FRAME_MAGIC);
        pos += FrameHeader::SIZE;

        let first = SliceHeader::from_bytes(&out[pos..]).unwrap();
        assert_eq!((first.frame_index, first.offset, first.size), (0, 0, 4096));
        let body = pos + SliceHeader::SIZE;
        assert_eq!(first.crc32, crc32(&out[body..body + 4096]));
        pos += SliceHeader::SIZE + 4096;
        assert_eq!(magic(pos), SLICE_MAGIC);
        let second = SliceHeader::from_bytes(&out[pos..]).unwrap();
        assert_eq!((second.frame_index, second.offset), (1, 0));
    }

    #[test]
    fn test_last_frame_header_records_short_length() {
        let options = PackOptions {
            redundancy: 2,
            interleave_depth: 1,
            slice_bytes: 512,
        };
        let out = pack_bytes(&pattern(100), &options);
        let frame = FrameHeader::from_bytes(&out[GlobalHeader::SIZE..]).unwrap();
        assert_eq!(frame.data_len, 100);

        let mut padded = pattern(100);
        padded.resize(FRAME_BYTES, 0);
        assert_eq!(frame.crc32_data, crc32(&padded));
    }

    #[test]
    fn test_short_source_is_zero_filled() {
        let options = PackOptions::new(4);
        let mut out = Vec::new();
        pack_stream(
            &mut Cursor::new(vec![9u8; 50]),
            200,
            &mut out,
            &options,
            &mut Controller::new(),
        )
        .unwrap();

        let frame = FrameHeader::from_bytes(&out[GlobalHeader::SIZE..]).unwrap();
        let mut expected = vec![9u8; 50];
        expected.resize(FRAME_BYTES, 0);
        assert_eq!(frame.data_len, 200);
        assert_eq!(frame.crc32_data, crc32(&expected));
    }

    #[test]
    fn test_progress_counts_every_slice() {
        use std::sync::{Arc, Mutex};

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let mut ctl = Controller::new();
        ctl.set_progress(move |done, total| sink.lock().unwrap().push((done, total)));

        let input = pattern(FRAME_BYTES + 1);
        let mut out = Vec::new();
        pack_stream(
            &mut Cursor::new(&input),
            input.len() as u64,
            &mut out,
            &PackOptions::default(),
            &mut ctl,
        )
        .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 54);
        assert_eq!(calls.first(), Some(&(1, 54)));
        assert_eq!(calls.last(), Some(&(54, 54)));
    }

    #[test]
    fn test_cancel_before_start_writes_header_only() {
        let mut ctl = Controller::new();
        ctl.cancel_flag().set(true);

        let input = pattern(FRAME_BYTES * 3);
        let mut out = Vec::new();
        let completion = pack_stream(
            &mut Cursor::new(&input),
            input.len() as u64,
            &mut out,
            &PackOptions::default(),
            &mut ctl,
        )
        .unwrap();

        assert_eq!(completion, Completion::Cancelled);
        assert_eq!(out.len(), GlobalHeader::SIZE);
        GlobalHeader::from_bytes(&out).unwrap().validate().unwrap();
    }

    #[test]
    fn test_cancel_from_progress_stops_at_offset_step() {
        let mut ctl = Controller::new();
        let flag = ctl.cancel_flag();
        ctl.set_progress(move |done, _| {
            if done == 5 {
                flag.set(true);
            }
        });

        let options = PackOptions {
            redundancy: 8,
            interleave_depth: 2,
            slice_bytes: 1024,
        };
        let input = pattern(FRAME_BYTES * 4);
        let mut out = Vec::new();
        let completion = pack_stream(
            &mut Cursor::new(&input),
            input.len() as u64,
            &mut out,
            &options,
            &mut ctl,
        )
        .unwrap();

        assert_eq!(completion, Completion::Cancelled);
        // Slice 5 is the first member at offset 2048; its sibling is still emitted
        let expected = GlobalHeader::SIZE + 2 * FrameHeader::SIZE + 6 * (SliceHeader::SIZE + 1024);
        assert_eq!(out.len(), expected);
    }
}
