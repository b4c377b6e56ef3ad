//! Slice interleaving for burst error mitigation
//!
//! Frames are packed in groups of up to `depth`. Within a group the payload
//! offset advances in the outer loop and the frame in the inner loop, so
//! consecutive slice records cycle through every frame of the group before
//! moving on. A contiguous loss on the transport then removes one slice from
//! each of several frames instead of a run of slices from a single frame.

use crate::{FrameError, Result};

/// One slice to emit: `len` payload bytes of group member `member` at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSlice {
    pub member: usize,
    pub offset: usize,
    pub len: usize,
}

/// Round-robin slice order over one interleave group
#[derive(Debug, Clone)]
pub struct SliceSchedule {
    payload_len: usize,
    slice_bytes: usize,
    members: usize,
    offset: usize,
    member: usize,
}

impl SliceSchedule {
    /// Create a schedule for `members` frames of `payload_len` bytes each
    pub fn new(payload_len: usize, slice_bytes: usize, members: usize) -> Result<Self> {
        if slice_bytes == 0 {
            return Err(FrameError::InvalidFormat {
                msg: "Slice size must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            payload_len,
            slice_bytes,
            members,
            offset: 0,
            member: 0,
        })
    }
}

impl Iterator for SliceSchedule {
    type Item = ScheduledSlice;

    fn next(&mut self) -> Option<ScheduledSlice> {
        if self.members == 0 || self.offset >= self.payload_len {
            return None;
        }

        let item = ScheduledSlice {
            member: self.member,
            offset: self.offset,
            len: self.slice_bytes.min(self.payload_len - self.offset),
        };

        self.member += 1;
        if self.member == self.members {
            self.member = 0;
            self.offset += self.slice_bytes;
        }

        Some(item)
    }
}
