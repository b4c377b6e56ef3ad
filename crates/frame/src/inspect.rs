//! Record-level view of a container, without decoding

use crate::layout::{FrameHeader, GlobalHeader, RecordKind, SliceHeader};
use crate::resync::{read_full, MagicScanner};
use crate::{FrameError, Result};
use rsct_core::checksum::crc32;
use serde::Serialize;
use std::io::{self, BufReader, Read};

/// One record found in the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    pub kind: RecordKind,
    pub frame_index: u64,
    /// Payload offset; 0 for frame headers
    pub offset: u32,
    /// Slice size, or the valid data length for frame headers
    pub size: u16,
    /// Byte span of the whole record in the container
    pub start: u64,
    pub end: u64,
    /// Slice bytes match their CRC32; always true for frame headers
    pub crc_ok: bool,
}

/// What a container holds
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub header: GlobalHeader,
    pub frame_records: u64,
    pub slice_records: u64,
    pub bad_slices: u64,
    pub skipped_bytes: u64,
    /// The stream ended inside a record
    pub truncated: bool,
    pub records: Vec<RecordInfo>,
}

impl ContainerSummary {
    /// Records belonging to frame `index`
    pub fn records_for(&self, index: u64) -> impl Iterator<Item = &RecordInfo> {
        self.records.iter().filter(move |r| r.frame_index == index)
    }
}

/// Reader adapter that tracks the absolute stream position
struct Counting<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Walk every record in a container and describe it
pub fn inspect<R: Read>(reader: R) -> Result<ContainerSummary> {
    let mut input = Counting {
        inner: BufReader::new(reader),
        pos: 0,
    };

    let mut head = [0u8; GlobalHeader::SIZE];
    if !read_full(&mut input, &mut head).map_err(FrameError::Read)? {
        return Err(FrameError::TruncatedHeader);
    }
    let header = GlobalHeader::from_bytes(&head)?;
    header.validate()?;

    let mut summary = ContainerSummary {
        header,
        frame_records: 0,
        slice_records: 0,
        bad_slices: 0,
        skipped_bytes: 0,
        truncated: false,
        records: Vec::new(),
    };
    let mut scanner = MagicScanner::new();
    let mut body = Vec::new();

    while let Some(kind) = scanner.scan(&mut input).map_err(FrameError::Read)? {
        let start = input.pos - 4;
        let mut head = [0u8; FrameHeader::SIZE];
        head[..4].copy_from_slice(&kind.magic().to_le_bytes());
        if !read_full(&mut input, &mut head[4..kind.header_size()]).map_err(FrameError::Read)? {
            summary.truncated = true;
            break;
        }

        let record = match kind {
            RecordKind::Frame => {
                let fh = FrameHeader::from_bytes(&head)?;
                summary.frame_records += 1;
                RecordInfo {
                    kind,
                    frame_index: fh.index,
                    offset: 0,
                    size: fh.data_len,
                    start,
                    end: input.pos,
                    crc_ok: true,
                }
            }
            RecordKind::Slice => {
                let sh = SliceHeader::from_bytes(&head)?;
                body.resize(sh.size as usize, 0);
                if !read_full(&mut input, &mut body).map_err(FrameError::Read)? {
                    summary.truncated = true;
                    break;
                }
                let crc_ok = crc32(&body) == sh.crc32;
                summary.slice_records += 1;
                if !crc_ok {
                    summary.bad_slices += 1;
                }
                RecordInfo {
                    kind,
                    frame_index: sh.frame_index,
                    offset: sh.offset,
                    size: sh.size,
                    start,
                    end: input.pos,
                    crc_ok,
                }
            }
        };
        summary.records.push(record);
    }

    summary.skipped_bytes = scanner.skipped_bytes();
    Ok(summary)
}
