//! RSCT Frame - Reed-Solomon container framing
//!
//! This crate packs a byte stream into a self-describing container of
//! interleaved, checksummed slices protected by column-wise Reed-Solomon
//! parity, and reconstructs the stream from whatever part of a container
//! survives a lossy transport.

pub mod codec;
pub mod control;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod inspect;
pub mod interleave;
pub mod layout;
pub mod payload;
pub mod resync;
pub mod stats;

pub use error::{FrameError, Result};

use std::path::Path;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        codec::ContainerCodec,
        control::{CancelFlag, Completion},
        decoder::{PadMode, UnpackOptions},
        encoder::PackOptions,
        error::{FrameError, Result},
        fec::{FecDecoder, FecEncoder, ReedSolomon},
        inspect::{inspect, ContainerSummary},
        layout::{GlobalHeader, RecordKind},
        stats::DecodeStats,
    };
}

/// Pack a file with a fresh codec context
pub fn pack(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &encoder::PackOptions,
) -> Result<control::Completion> {
    codec::ContainerCodec::new().pack(input, output, options)
}

/// Unpack a file with a fresh codec context
pub fn unpack(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    pad_mode: decoder::PadMode,
) -> Result<control::Completion> {
    codec::ContainerCodec::new().unpack(input, output, pad_mode)
}
