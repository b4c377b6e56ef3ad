//! Region-aware access to a frame's logical payload
//!
//! A frame travels as one contiguous payload, data ‖ parity ‖ crcD ‖ crcP,
//! but is held in memory as four separate buffers. Slices are cut from and
//! pasted into that payload at arbitrary offsets, so a single slice may
//! straddle any of the region boundaries.

use std::ops::Range;

/// The four consecutive regions of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Data = 0,
    Parity = 1,
    CrcData = 2,
    CrcParity = 3,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Data, Region::Parity, Region::CrcData, Region::CrcParity];
}

/// Region-local byte ranges touched by one copy, indexed by [`Region`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSpans([Range<usize>; 4]);

impl RegionSpans {
    /// Range written inside `region` (empty if untouched)
    pub fn get(&self, region: Region) -> Range<usize> {
        self.0[region as usize].clone()
    }
}

/// Visit the intersection of `[offset, offset + len)` with each region.
///
/// The callback receives the region, the range inside that region and the
/// matching range inside the caller's buffer. Bytes beyond the last region
/// are not visited.
fn for_each_overlap(
    lens: [usize; 4],
    offset: usize,
    len: usize,
    mut f: impl FnMut(Region, Range<usize>, Range<usize>),
) {
    let end = offset.saturating_add(len);
    let mut base = 0usize;
    for (region, region_len) in Region::ALL.into_iter().zip(lens) {
        let lo = offset.max(base);
        let hi = end.min(base + region_len);
        if lo < hi {
            f(region, lo - base..hi - base, lo - offset..hi - offset);
        }
        base += region_len;
    }
}

/// Read-only payload view used when cutting slices
pub struct PayloadView<'a> {
    regions: [&'a [u8]; 4],
}

impl<'a> PayloadView<'a> {
    pub fn new(data: &'a [u8], parity: &'a [u8], crc_data: &'a [u8], crc_parity: &'a [u8]) -> Self {
        Self {
            regions: [data, parity, crc_data, crc_parity],
        }
    }

    /// Logical payload length
    pub fn len(&self) -> usize {
        self.regions.iter().map(|r| r.len()).sum()
    }

    /// Check if every region is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy payload bytes starting at `offset` into `dst`; returns bytes copied
    pub fn copy_out(&self, offset: usize, dst: &mut [u8]) -> usize {
        let lens = self.regions.map(|r| r.len());
        let mut copied = 0;
        for_each_overlap(lens, offset, dst.len(), |region, local, out| {
            copied += out.len();
            dst[out].copy_from_slice(&self.regions[region as usize][local]);
        });
        copied
    }
}

/// Mutable payload view used when pasting received slices
pub struct PayloadViewMut<'a> {
    regions: [&'a mut [u8]; 4],
}

impl<'a> PayloadViewMut<'a> {
    pub fn new(
        data: &'a mut [u8],
        parity: &'a mut [u8],
        crc_data: &'a mut [u8],
        crc_parity: &'a mut [u8],
    ) -> Self {
        Self {
            regions: [data, parity, crc_data, crc_parity],
        }
    }

    /// Logical payload length
    pub fn len(&self) -> usize {
        self.regions.iter().map(|r| r.len()).sum()
    }

    /// Check if every region is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paste `src` at payload `offset`, returning what landed in each region
    pub fn copy_in(&mut self, offset: usize, src: &[u8]) -> RegionSpans {
        let lens = [
            self.regions[0].len(),
            self.regions[1].len(),
            self.regions[2].len(),
            self.regions[3].len(),
        ];
        let mut spans = RegionSpans::default();
        let regions = &mut self.regions;
        for_each_overlap(lens, offset, src.len(), |region, local, input| {
            regions[region as usize][local.clone()].copy_from_slice(&src[input]);
            spans.0[region as usize] = local;
        });
        spans
    }
}
