//! Unpack pipeline: container to reconstructed stream
//!
//! Decoding runs in two passes. Ingestion resynchronizes on record magics and
//! pastes every CRC-valid slice into a per-frame buffer, creating buffers
//! lazily. Reconstruction then walks the frames in order, marks erasures
//! from the short-frame length and the shard CRC16 tables, runs RS over every
//! column and falls back to the pad policy where a column cannot be
//! corrected.

use crate::control::{Completion, Controller};
use crate::encoder::IO_BUFFER_BYTES;
use crate::fec::{FecDecoder, ReedSolomon};
use crate::layout::{
    crc_parity_table_len, FrameHeader, GlobalHeader, RecordKind, SliceHeader,
    CRC_DATA_TABLE_BYTES, FRAME_BYTES, K_SHARDS, SHARD_LEN,
};
use crate::payload::{PayloadViewMut, Region};
use crate::resync::{read_full, MagicScanner};
use crate::stats::{DecodeStats, ResidualEstimator, DEFAULT_RESIDUAL_COEFFICIENT};
use crate::{FrameError, Result};
use rsct_core::buffer::{try_zeroed, ShardMatrix};
use rsct_core::checksum::{crc16_ccitt, crc32};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, info, trace, warn};

/// Fallback for a column the RS decoder cannot correct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    /// Keep the assembled bytes as they are
    #[default]
    Raw,
    /// Zero the column
    Zero,
    /// Copy the column from the previous frame, or zero it
    Temporal,
}

impl fmt::Display for PadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PadMode::Raw => "raw",
            PadMode::Zero => "zero",
            PadMode::Temporal => "temporal",
        };
        f.write_str(name)
    }
}

impl FromStr for PadMode {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(PadMode::Raw),
            "zero" => Ok(PadMode::Zero),
            "temporal" => Ok(PadMode::Temporal),
            other => Err(FrameError::InvalidFormat {
                msg: format!("Unknown pad mode '{}'", other),
            }),
        }
    }
}

/// Unpack parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnpackOptions {
    pub pad_mode: PadMode,
    /// Share of a CRC-mismatching shard counted as wrong, 0.0..=1.0
    pub residual_coefficient: f64,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            pad_mode: PadMode::default(),
            residual_coefficient: DEFAULT_RESIDUAL_COEFFICIENT,
        }
    }
}

/// How a frame buffer came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Its frame header arrived
    HeaderSeen,
    /// Created for a slice before any header; length derived from the stream size
    Placeholder,
}

/// Per-byte arrival map for a CRC table
#[derive(Debug)]
struct Coverage {
    seen: Vec<bool>,
    filled: usize,
}

impl Coverage {
    fn new(len: usize) -> Self {
        Self {
            seen: vec![false; len],
            filled: 0,
        }
    }

    fn mark(&mut self, range: Range<usize>) {
        for seen in &mut self.seen[range] {
            if !*seen {
                *seen = true;
                self.filled += 1;
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.seen.len()
    }
}

/// A frame being assembled from received records
#[derive(Debug)]
pub struct FrameBuffer {
    state: FrameState,
    data_len: usize,
    crc32_data: u32,
    crc32_parity: u32,
    data: ShardMatrix,
    parity: ShardMatrix,
    crc_data: Vec<u8>,
    crc_parity: Vec<u8>,
    crc_data_seen: Coverage,
    crc_parity_seen: Coverage,
}

impl FrameBuffer {
    /// Create an empty buffer for a frame with `r` parity shards
    pub fn new(r: u16, state: FrameState, data_len: usize) -> Result<Self> {
        let crcp_len = crc_parity_table_len(r);
        Ok(Self {
            state,
            data_len: data_len.min(FRAME_BYTES),
            crc32_data: 0,
            crc32_parity: 0,
            data: ShardMatrix::new(K_SHARDS, SHARD_LEN).map_err(FrameError::from_core)?,
            parity: ShardMatrix::new(r as usize, SHARD_LEN).map_err(FrameError::from_core)?,
            crc_data: try_zeroed(CRC_DATA_TABLE_BYTES).map_err(FrameError::from_core)?,
            crc_parity: try_zeroed(crcp_len).map_err(FrameError::from_core)?,
            crc_data_seen: Coverage::new(CRC_DATA_TABLE_BYTES),
            crc_parity_seen: Coverage::new(crcp_len),
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    pub fn data(&self) -> &ShardMatrix {
        &self.data
    }

    /// Adopt the length and checksums from a frame header
    pub fn record_header(&mut self, header: &FrameHeader) {
        self.state = FrameState::HeaderSeen;
        self.data_len = (header.data_len as usize).min(FRAME_BYTES);
        self.crc32_data = header.crc32_data;
        self.crc32_parity = header.crc32_parity;
    }

    /// Paste slice bytes at payload `offset`
    pub fn apply_slice(&mut self, offset: usize, bytes: &[u8]) {
        let spans = PayloadViewMut::new(
            self.data.as_bytes_mut(),
            self.parity.as_bytes_mut(),
            &mut self.crc_data,
            &mut self.crc_parity,
        )
        .copy_in(offset, bytes);
        self.crc_data_seen.mark(spans.get(Region::CrcData));
        self.crc_parity_seen.mark(spans.get(Region::CrcParity));
    }

    /// Both CRC tables have arrived in full
    pub fn has_crc_tables(&self) -> bool {
        self.crc_data_seen.is_complete() && self.crc_parity_seen.is_complete()
    }

    /// Assembled data and parity match the header CRC32s
    fn is_intact(&self) -> bool {
        self.state == FrameState::HeaderSeen
            && crc32(self.data.as_bytes()) == self.crc32_data
            && crc32(self.parity.as_bytes()) == self.crc32_parity
    }

    fn data_shard_ok(&self, shard: usize) -> bool {
        crc16_ccitt(self.data.shard(shard)) == table_entry(&self.crc_data, shard)
    }

    fn parity_shard_ok(&self, shard: usize) -> bool {
        crc16_ccitt(self.parity.shard(shard)) == table_entry(&self.crc_parity, shard)
    }

    /// Release everything but the data shards
    pub fn into_data(self) -> ShardMatrix {
        self.data
    }
}

fn table_entry(table: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([table[2 * index], table[2 * index + 1]])
}

/// Column-wise RS reconstruction of assembled frames
#[derive(Debug)]
pub struct FrameDecoder {
    rs: ReedSolomon,
    r: usize,
    pad_mode: PadMode,
    column: Vec<u8>,
    fill: Vec<u8>,
    marked: Vec<bool>,
    erasures: Vec<usize>,
}

impl FrameDecoder {
    /// Create a decoder for redundancy `r`
    pub fn new(r: u16, pad_mode: PadMode) -> Result<Self> {
        let rs = ReedSolomon::for_redundancy(r)?;
        let n = K_SHARDS + r as usize;
        Ok(Self {
            rs,
            r: r as usize,
            pad_mode,
            column: vec![0u8; n],
            fill: vec![0u8; K_SHARDS],
            marked: vec![false; n],
            erasures: Vec::with_capacity(n),
        })
    }

    fn mark(&mut self, position: usize) {
        if !self.marked[position] {
            self.marked[position] = true;
            self.erasures.push(position);
        }
    }

    /// Build the erasure list: length erasures, then data and parity CRC
    /// mismatches, capped at `r`
    fn collect_erasures(&mut self, frame: &FrameBuffer) -> &[usize] {
        self.marked.fill(false);
        self.erasures.clear();

        if frame.data_len < FRAME_BYTES {
            let full = frame.data_len / SHARD_LEN;
            let partial = frame.data_len % SHARD_LEN != 0;
            let cutoff = full + partial as usize;
            for shard in cutoff..K_SHARDS {
                self.mark(shard);
            }
            if partial {
                self.mark(full);
            }
        }

        if frame.has_crc_tables() {
            for shard in 0..K_SHARDS {
                if !frame.data_shard_ok(shard) {
                    self.mark(shard);
                }
            }
            for shard in 0..self.r {
                if !frame.parity_shard_ok(shard) {
                    self.mark(K_SHARDS + shard);
                }
            }
        }

        self.erasures.truncate(self.r);
        &self.erasures
    }

    /// Correct `frame` in place, patching failed columns per the pad policy.
    ///
    /// `previous` is the previous frame's decoded data, if that frame was
    /// decoded at all.
    pub fn decode(
        &mut self,
        index: u64,
        frame: &mut FrameBuffer,
        previous: Option<&ShardMatrix>,
        stats: &mut DecodeStats,
        residual: &mut ResidualEstimator,
    ) {
        if frame.is_intact() {
            stats.frames_intact += 1;
            trace!("Frame {} intact before decoding", index);
        }

        let has_tables = frame.has_crc_tables();
        let erasures = self.collect_erasures(frame).to_vec();
        let mut corrected = 0u64;
        let mut failed = 0u64;

        for col in 0..SHARD_LEN {
            let (symbols, checks) = self.column.split_at_mut(K_SHARDS);
            frame.data.gather_column(col, symbols);
            frame.parity.gather_column(col, checks);

            if !erasures.is_empty() {
                stats.used_erasure_columns += 1;
            }

            match self.rs.decode(&mut self.column, &erasures) {
                Ok(count) => {
                    corrected += count as u64;
                    frame.data.scatter_column(col, &self.column[..K_SHARDS]);
                }
                Err(e) => {
                    failed += 1;
                    trace!("Frame {} column {}: {}", index, col, e);
                    match (self.pad_mode, previous) {
                        (PadMode::Raw, _) => {}
                        (PadMode::Temporal, Some(prev)) => {
                            prev.gather_column(col, &mut self.fill);
                            frame.data.scatter_column(col, &self.fill);
                        }
                        (PadMode::Zero, _) | (PadMode::Temporal, None) => {
                            self.fill.fill(0);
                            frame.data.scatter_column(col, &self.fill);
                        }
                    }
                }
            }
        }

        stats.corrected_symbols += corrected;
        stats.failed_columns += failed;

        if has_tables {
            let mismatched = (0..K_SHARDS).filter(|&s| !frame.data_shard_ok(s)).count();
            residual.record_mismatched_shards(mismatched);
            if mismatched > 0 {
                debug!("Frame {}: {} data shards still fail CRC16", index, mismatched);
            }
        }

        debug!(
            "Frame {}: {} erasures, {} symbols corrected, {} columns failed",
            index,
            erasures.len(),
            corrected,
            failed
        );
    }
}

/// Get the buffer for frame `index`, creating it if this is its first record
fn ensure_slot<'a>(
    slots: &'a mut [Option<FrameBuffer>],
    header: &GlobalHeader,
    index: u64,
    state: FrameState,
) -> Result<&'a mut FrameBuffer> {
    let slot = &mut slots[index as usize];
    let frame = match slot.take() {
        Some(frame) => frame,
        None => {
            trace!("Frame {} first seen ({:?})", index, state);
            FrameBuffer::new(header.r, state, header.frame_data_len(index))?
        }
    };
    Ok(slot.insert(frame))
}

/// Reconstruct the original stream from a container.
///
/// `stats` is reset first and then updated as the pass runs, so it is
/// meaningful after a cancelled or failed pass too.
pub fn unpack_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    options: &UnpackOptions,
    ctl: &mut Controller,
    stats: &mut DecodeStats,
) -> Result<Completion> {
    *stats = DecodeStats::default();
    let mut input = BufReader::with_capacity(IO_BUFFER_BYTES, reader);

    let mut head = [0u8; GlobalHeader::SIZE];
    if !read_full(&mut input, &mut head).map_err(FrameError::Read)? {
        return Err(FrameError::TruncatedHeader);
    }
    let header = GlobalHeader::from_bytes(&head)?;
    header.validate()?;

    let mut decoder = FrameDecoder::new(header.r, options.pad_mode)?;
    let mut residual = ResidualEstimator::new(options.residual_coefficient);
    *stats = DecodeStats::for_header(&header, options.pad_mode);

    info!(
        "Unpacking {} bytes in {} frames, r={}, pad={}",
        header.original_size, header.frame_count, header.r, options.pad_mode
    );

    let frame_count = usize::try_from(header.frame_count).map_err(|_| FrameError::Allocation {
        bytes: usize::MAX,
    })?;
    let mut slots: Vec<Option<FrameBuffer>> = Vec::new();
    slots
        .try_reserve_exact(frame_count)
        .map_err(|_| FrameError::Allocation {
            bytes: frame_count.saturating_mul(std::mem::size_of::<Option<FrameBuffer>>()),
        })?;
    slots.resize_with(frame_count, || None);

    let mut completion = Completion::Complete;
    let payload_len = header.payload_len();
    let parity_len = header.parity_len();
    let total_slices = header.total_slices();
    let mut accepted = 0u64;
    let mut scanner = MagicScanner::new();
    let mut body = Vec::new();

    loop {
        if ctl.is_cancelled() {
            completion = Completion::Cancelled;
            break;
        }

        let Some(kind) = scanner.scan(&mut input).map_err(FrameError::Read)? else {
            break;
        };

        let mut head = [0u8; FrameHeader::SIZE];
        head[..4].copy_from_slice(&kind.magic().to_le_bytes());
        if !read_full(&mut input, &mut head[4..kind.header_size()]).map_err(FrameError::Read)? {
            debug!("Stream ends inside a {:?} header", kind);
            break;
        }

        match kind {
            RecordKind::Frame => {
                let fh = FrameHeader::from_bytes(&head)?;
                if fh.index >= header.frame_count
                    || fh.parity_len as usize != parity_len
                    || fh.data_len as usize > FRAME_BYTES
                {
                    warn!(
                        "Skipping frame header index={} data_len={} parity_len={}",
                        fh.index, fh.data_len, fh.parity_len
                    );
                    continue;
                }
                ensure_slot(&mut slots, &header, fh.index, FrameState::HeaderSeen)?
                    .record_header(&fh);
            }
            RecordKind::Slice => {
                let sh = SliceHeader::from_bytes(&head)?;
                if sh.size == 0 {
                    continue;
                }
                body.resize(sh.size as usize, 0);
                if !read_full(&mut input, &mut body).map_err(FrameError::Read)? {
                    debug!("Stream ends inside slice of frame {}", sh.frame_index);
                    break;
                }

                if crc32(&body) != sh.crc32 {
                    stats.slices_bad += 1;
                    trace!("Slice frame={} offset={} failed CRC32", sh.frame_index, sh.offset);
                    continue;
                }
                if sh.offset as usize + body.len() > payload_len {
                    stats.slices_bad += 1;
                    warn!(
                        "Slice frame={} offset={} size={} exceeds payload of {} bytes",
                        sh.frame_index, sh.offset, sh.size, payload_len
                    );
                    continue;
                }
                stats.slices_ok += 1;

                if sh.frame_index < header.frame_count {
                    ensure_slot(&mut slots, &header, sh.frame_index, FrameState::Placeholder)?
                        .apply_slice(sh.offset as usize, &body);
                }

                accepted += 1;
                ctl.report(accepted, total_slices);
            }
        }
    }
    stats.resync_skipped_bytes = scanner.skipped_bytes();

    debug!(
        "Ingested {} good and {} bad slices, skipped {} bytes",
        stats.slices_ok, stats.slices_bad, stats.resync_skipped_bytes
    );

    let mut out = BufWriter::with_capacity(IO_BUFFER_BYTES, writer);
    let mut previous: Option<ShardMatrix> = None;

    for (index, slot) in slots.iter_mut().enumerate() {
        if ctl.is_cancelled() {
            completion = Completion::Cancelled;
            break;
        }

        let index = index as u64;
        let to_write = header.frame_data_len(index);

        match slot.take() {
            None => {
                stats.frames_missing += 1;
                debug!("Frame {} missing, writing {} zero bytes", index, to_write);
                io::copy(&mut io::repeat(0).take(to_write as u64), &mut out)
                    .map_err(FrameError::Write)?;
                previous = None;
            }
            Some(mut frame) => {
                decoder.decode(index, &mut frame, previous.as_ref(), stats, &mut residual);
                out.write_all(&frame.data.as_bytes()[..to_write])
                    .map_err(FrameError::Write)?;
                previous = Some(frame.into_data());
            }
        }
        residual.record_written(to_write);
    }

    out.flush().map_err(FrameError::Write)?;
    stats.residual_ber = residual.ber();
    debug!("Residual estimate charged {} bad bytes", residual.bad_bytes());

    info!(
        "Unpack {}: {} slices ok, {} bad, {} columns failed, residual BER {:.3e}",
        if completion.is_cancelled() { "cancelled" } else { "complete" },
        stats.slices_ok,
        stats.slices_bad,
        stats.failed_columns,
        stats.residual_ber
    );
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{pack_stream, PackOptions};
    use crate::inspect::{inspect, RecordInfo};
    use crate::layout::payload_len;
    use quickcheck::{QuickCheck, TestResult};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bytes = vec![0u8; len];
        rng.fill(&mut bytes[..]);
        bytes
    }

    fn pack(input: &[u8], options: &PackOptions) -> Vec<u8> {
        let mut out = Vec::new();
        pack_stream(
            &mut Cursor::new(input),
            input.len() as u64,
            &mut out,
            options,
            &mut Controller::new(),
        )
        .unwrap();
        out
    }

    fn unpack_with(container: &[u8], options: &UnpackOptions) -> (Vec<u8>, DecodeStats) {
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        let completion = unpack_stream(
            Cursor::new(container),
            &mut out,
            options,
            &mut Controller::new(),
            &mut stats,
        )
        .unwrap();
        assert_eq!(completion, Completion::Complete);
        (out, stats)
    }

    fn unpack(container: &[u8], pad_mode: PadMode) -> (Vec<u8>, DecodeStats) {
        unpack_with(
            container,
            &UnpackOptions {
                pad_mode,
                ..UnpackOptions::default()
            },
        )
    }

    /// Copy the container without the records selected by `drop`
    fn without(container: &[u8], drop: impl Fn(&RecordInfo) -> bool) -> Vec<u8> {
        let summary = inspect(Cursor::new(container)).unwrap();
        let mut out = container[..GlobalHeader::SIZE].to_vec();
        for record in summary.records.iter().filter(|r| !drop(r)) {
            out.extend_from_slice(&container[record.start as usize..record.end as usize]);
        }
        out
    }

    fn is_slice(record: &RecordInfo, frame: u64, offset: u32) -> bool {
        record.kind == RecordKind::Slice && record.frame_index == frame && record.offset == offset
    }

    #[test]
    fn test_pad_mode_parsing() {
        assert_eq!("zero".parse::<PadMode>().unwrap(), PadMode::Zero);
        assert_eq!("TEMPORAL".parse::<PadMode>().unwrap(), PadMode::Temporal);
        assert_eq!(PadMode::Raw.to_string(), "raw");
        assert!("smooth".parse::<PadMode>().is_err());
    }

    #[test]
    fn test_roundtrip_sizes() {
        let options = PackOptions::new(16);
        for (seed, len) in [0, 1, FRAME_BYTES - 1, FRAME_BYTES, FRAME_BYTES * 3 + 77]
            .into_iter()
            .enumerate()
        {
            let input = random_bytes(len, seed as u64);
            let container = pack(&input, &options);
            let (output, stats) = unpack(&container, PadMode::Zero);

            assert_eq!(output, input, "size {}", len);
            assert_eq!(stats.frames_total, len.div_ceil(FRAME_BYTES) as u64);
            assert_eq!(stats.frames_intact, stats.frames_total);
            assert_eq!(stats.slices_ok, stats.slices_total_est);
            assert_eq!(stats.slices_bad, 0);
            assert_eq!(stats.failed_columns, 0);
            assert_eq!(stats.residual_ber, 0.0);
        }
    }

    #[test]
    fn test_roundtrip_every_redundancy() {
        let input = random_bytes(700, 11);
        for r in 1..=63 {
            let container = pack(&input, &PackOptions::new(r));
            let (output, stats) = unpack(&container, PadMode::Raw);
            assert_eq!(output, input, "r={}", r);
            assert_eq!(stats.symbols_total, (192 + r as u64) * 64);
        }
    }

    #[test]
    fn test_roundtrip_property() {
        fn prop(data: Vec<u8>, r: u8, slice: u16) -> TestResult {
            let options = PackOptions {
                redundancy: (r % 63) as u16 + 1,
                interleave_depth: 3,
                slice_bytes: slice % 2048,
            };
            let container = pack(&data, &options);
            let (output, _) = unpack(&container, PadMode::Zero);
            TestResult::from_bool(output == data)
        }
        QuickCheck::new()
            .tests(20)
            .quickcheck(prop as fn(Vec<u8>, u8, u16) -> TestResult);
    }

    #[test]
    fn test_recovers_lost_data_slice() {
        let input = random_bytes(FRAME_BYTES * 2, 21);
        let container = pack(&input, &PackOptions::new(16));
        let damaged = without(&container, |r| is_slice(r, 0, 512));

        let (output, stats) = unpack(&damaged, PadMode::Zero);
        assert_eq!(output, input);
        assert_eq!(stats.slices_ok, stats.slices_total_est - 1);
        assert_eq!(stats.used_erasure_columns, 64);
        assert_eq!(stats.corrected_symbols, 8 * 64);
        assert_eq!(stats.failed_columns, 0);
        assert_eq!(stats.frames_intact, 1);
        assert_eq!(stats.residual_ber, 0.0);
    }

    #[test]
    fn test_interleaving_spreads_contiguous_loss() {
        let input = random_bytes(FRAME_BYTES * 2, 22);
        let options = PackOptions {
            redundancy: 16,
            interleave_depth: 2,
            slice_bytes: 512,
        };
        let container = pack(&input, &options);
        let summary = inspect(Cursor::new(&container)).unwrap();

        // Four consecutive slice records: two per frame, 16 shards each
        let first = summary
            .records
            .iter()
            .position(|r| r.kind == RecordKind::Slice)
            .unwrap();
        let burst: Vec<RecordInfo> = summary.records[first..first + 4].to_vec();
        assert_eq!(burst.iter().filter(|r| r.frame_index == 0).count(), 2);

        let damaged = without(&container, |r| burst.contains(r));
        let (output, stats) = unpack(&damaged, PadMode::Zero);
        assert_eq!(output, input);
        assert_eq!(stats.failed_columns, 0);
    }

    #[test]
    fn test_recovers_without_crc_tables() {
        let input = random_bytes(FRAME_BYTES, 23);
        let container = pack(&input, &PackOptions::new(16));
        // 8 unmarked shard errors fit within 16 parity symbols
        let damaged = without(&container, |r| is_slice(r, 0, 13_312) || is_slice(r, 0, 4096));

        let (output, stats) = unpack(&damaged, PadMode::Raw);
        assert_eq!(output, input);
        assert_eq!(stats.used_erasure_columns, 0);
        assert_eq!(stats.failed_columns, 0);
    }

    #[test]
    fn test_recovers_missing_frame_header() {
        let input = random_bytes(FRAME_BYTES + 300, 24);
        let container = pack(&input, &PackOptions::new(8));
        let damaged = without(&container, |r| r.kind == RecordKind::Frame);

        let (output, stats) = unpack(&damaged, PadMode::Zero);
        assert_eq!(output, input);
        assert_eq!(stats.frames_intact, 0);
    }

    /// Frame 1 loses its CRC tables and three data slices: 24 unmarked shard
    /// errors against 16 parity symbols
    fn overloaded(seed: u64) -> (Vec<u8>, Vec<u8>) {
        let input = random_bytes(FRAME_BYTES * 2, seed);
        let container = pack(&input, &PackOptions::new(16));
        let damaged = without(&container, |r| {
            is_slice(r, 1, 13_312)
                || is_slice(r, 1, 0)
                || is_slice(r, 1, 512)
                || is_slice(r, 1, 1024)
        });
        (input, damaged)
    }

    #[test]
    fn test_zero_pad_over_threshold() {
        let (input, damaged) = overloaded(31);
        let (output, stats) = unpack(&damaged, PadMode::Zero);

        assert_eq!(output.len(), input.len());
        assert_eq!(output[..FRAME_BYTES], input[..FRAME_BYTES]);
        assert!(output[FRAME_BYTES..].iter().all(|&b| b == 0));
        assert_eq!(stats.failed_columns, 64);
        assert_eq!(stats.pad_mode, PadMode::Zero);
    }

    #[test]
    fn test_temporal_pad_over_threshold() {
        let (input, damaged) = overloaded(32);
        let (output, _) = unpack(&damaged, PadMode::Temporal);

        assert_eq!(output[..FRAME_BYTES], input[..FRAME_BYTES]);
        assert_eq!(output[FRAME_BYTES..], input[..FRAME_BYTES]);
    }

    #[test]
    fn test_raw_pad_over_threshold() {
        let (input, damaged) = overloaded(33);
        let (output, _) = unpack(&damaged, PadMode::Raw);

        let frame = &output[FRAME_BYTES..];
        assert!(frame[..1536].iter().all(|&b| b == 0));
        assert_eq!(frame[1536..], input[FRAME_BYTES + 1536..]);
    }

    #[test]
    fn test_temporal_pad_without_previous_frame() {
        let input = random_bytes(FRAME_BYTES, 34);
        let container = pack(&input, &PackOptions::new(16));
        let damaged = without(&container, |r| {
            is_slice(r, 0, 13_312)
                || is_slice(r, 0, 0)
                || is_slice(r, 0, 512)
                || is_slice(r, 0, 1024)
        });

        let (output, _) = unpack(&damaged, PadMode::Temporal);
        assert!(output.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_missing_frame_is_zero_filled() {
        let input = random_bytes(FRAME_BYTES * 2 + 500, 35);
        let container = pack(&input, &PackOptions::new(4));
        let damaged = without(&container, |r| r.frame_index == 1);

        let (output, stats) = unpack(&damaged, PadMode::Temporal);
        assert_eq!(output.len(), input.len());
        assert_eq!(output[..FRAME_BYTES], input[..FRAME_BYTES]);
        assert!(output[FRAME_BYTES..FRAME_BYTES * 2].iter().all(|&b| b == 0));
        assert_eq!(output[FRAME_BYTES * 2..], input[FRAME_BYTES * 2..]);
        assert_eq!(stats.frames_missing, 1);
    }

    #[test]
    fn test_residual_ber_grows_with_damage() {
        let input = random_bytes(FRAME_BYTES, 41);
        let container = pack(&input, &PackOptions::new(4));

        let one = without(&container, |r| is_slice(r, 0, 0));
        let two = without(&container, |r| is_slice(r, 0, 0) || is_slice(r, 0, 512));

        let (_, clean) = unpack(&container, PadMode::Raw);
        let (_, stats_one) = unpack(&one, PadMode::Raw);
        let (_, stats_two) = unpack(&two, PadMode::Raw);

        assert_eq!(clean.residual_ber, 0.0);
        assert!(stats_one.residual_ber > 0.0);
        assert!(stats_two.residual_ber > stats_one.residual_ber);
    }

    #[test]
    fn test_residual_coefficient_scales_estimate() {
        let input = random_bytes(FRAME_BYTES, 42);
        let container = pack(&input, &PackOptions::new(4));
        let damaged = without(&container, |r| is_slice(r, 0, 0));

        let low = UnpackOptions {
            residual_coefficient: 0.2,
            ..UnpackOptions::default()
        };
        let high = UnpackOptions {
            residual_coefficient: 0.8,
            ..UnpackOptions::default()
        };
        let (_, stats_low) = unpack_with(&damaged, &low);
        let (_, stats_high) = unpack_with(&damaged, &high);
        assert!(stats_high.residual_ber > stats_low.residual_ber);
    }

    #[test]
    fn test_tampered_slice_is_discarded() {
        let input = random_bytes(FRAME_BYTES, 51);
        let mut container = pack(&input, &PackOptions::new(16));
        let summary = inspect(Cursor::new(&container)).unwrap();
        let target = summary
            .records
            .iter()
            .find(|r| is_slice(r, 0, 2048))
            .unwrap();
        container[target.start as usize + SliceHeader::SIZE + 100] ^= 0x10;

        let (output, stats) = unpack(&container, PadMode::Raw);
        assert_eq!(stats.slices_bad, 1);
        assert_eq!(output, input);
    }

    #[test]
    fn test_resync_over_garbage_and_truncation() {
        let input = random_bytes(FRAME_BYTES * 2, 61);
        let container = pack(&input, &PackOptions::new(16));
        let summary = inspect(Cursor::new(&container)).unwrap();
        let middle = summary.records[20].end as usize;

        let mut damaged = container[..GlobalHeader::SIZE].to_vec();
        damaged.extend_from_slice(&[0xee; 100]);
        damaged.extend_from_slice(&container[GlobalHeader::SIZE..middle]);
        damaged.extend_from_slice(&[0x52, 0x53, 0x00, 0x11, 0xee]);
        damaged.extend_from_slice(&container[middle..container.len() - 100]);

        let (output, stats) = unpack(&damaged, PadMode::Zero);
        assert_eq!(output, input);
        assert_eq!(stats.resync_skipped_bytes, 105);
    }

    #[test]
    fn test_out_of_range_slice_counts_bad() {
        let input = random_bytes(100, 62);
        let mut container = pack(&input, &PackOptions::new(2));
        let bogus = SliceHeader {
            frame_index: 0,
            offset: (payload_len(2) - 4) as u32,
            size: 8,
            crc32: crc32(&[7u8; 8]),
        };
        container.extend_from_slice(&bogus.to_bytes());
        container.extend_from_slice(&[7u8; 8]);

        let (output, stats) = unpack(&container, PadMode::Zero);
        assert_eq!(output, input);
        assert_eq!(stats.slices_bad, 1);
    }

    #[test]
    fn test_header_errors() {
        let container = pack(&random_bytes(10, 71), &PackOptions::new(4));
        let run = |bytes: &[u8]| {
            unpack_stream(
                Cursor::new(bytes),
                io::sink(),
                &UnpackOptions::default(),
                &mut Controller::new(),
                &mut DecodeStats::default(),
            )
        };

        assert!(matches!(run(&container[..20]), Err(FrameError::TruncatedHeader)));

        let mut bad = container.clone();
        bad[0] ^= 0xff;
        assert!(matches!(run(&bad), Err(FrameError::BadMagic { .. })));

        let mut bad = container.clone();
        bad[4] = 3;
        assert!(matches!(run(&bad), Err(FrameError::UnsupportedVersion { found: 3 })));

        let mut bad = container.clone();
        bad[6] = 0;
        assert!(matches!(run(&bad), Err(FrameError::ParameterMismatch { .. })));

        let mut bad = container;
        bad[8] = 0;
        assert!(matches!(run(&bad), Err(FrameError::InvalidRedundancy { r: 0 })));

        let oversized = GlobalHeader::new(63, u64::MAX, 16, 1).unwrap().to_bytes();
        assert!(matches!(run(&oversized[..]), Err(FrameError::ParameterMismatch { .. })));
    }

    #[test]
    fn test_cancel_before_unpack() {
        let input = random_bytes(FRAME_BYTES * 2, 81);
        let container = pack(&input, &PackOptions::new(8));

        let mut ctl = Controller::new();
        ctl.cancel_flag().set(true);
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        let completion = unpack_stream(
            Cursor::new(&container),
            &mut out,
            &UnpackOptions::default(),
            &mut ctl,
            &mut stats,
        )
        .unwrap();

        assert_eq!(completion, Completion::Cancelled);
        assert!(out.is_empty());
        assert_eq!(stats.frames_total, 2);
    }

    #[test]
    fn test_cancel_from_progress_during_ingest() {
        let input = random_bytes(FRAME_BYTES * 2, 82);
        let container = pack(&input, &PackOptions::new(8));

        let mut ctl = Controller::new();
        let flag = ctl.cancel_flag();
        ctl.set_progress(move |done, _| {
            if done == 10 {
                flag.set(true);
            }
        });
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        let completion = unpack_stream(
            Cursor::new(&container),
            &mut out,
            &UnpackOptions::default(),
            &mut ctl,
            &mut stats,
        )
        .unwrap();

        assert_eq!(completion, Completion::Cancelled);
        assert_eq!(stats.slices_ok, 10);
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_slices_do_not_complete_tables() {
        let mut frame = FrameBuffer::new(4, FrameState::Placeholder, FRAME_BYTES).unwrap();
        let crc_start = FRAME_BYTES + 4 * SHARD_LEN;
        frame.apply_slice(crc_start, &[1u8; 200]);
        frame.apply_slice(crc_start, &[1u8; 200]);
        assert!(!frame.has_crc_tables());

        frame.apply_slice(crc_start + 200, &[1u8; 192]);
        assert!(frame.has_crc_tables());
        assert_eq!(frame.state(), FrameState::Placeholder);
    }
}
