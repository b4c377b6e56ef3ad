//! Per-invocation codec context: progress, cancellation, residual tuning and stats

use crate::control::{CancelFlag, Completion, Controller};
use crate::decoder::{unpack_stream, PadMode, UnpackOptions};
use crate::encoder::{pack_stream, PackOptions};
use crate::layout::compute_pad;
use crate::stats::{clamp_coefficient, DecodeStats, DEFAULT_RESIDUAL_COEFFICIENT};
use crate::{FrameError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Container codec with its own mutable state.
///
/// Each instance owns its progress sink, cancel flag, residual coefficient
/// and the statistics of its last unpack, so separate instances can run on
/// separate threads.
#[derive(Debug)]
pub struct ContainerCodec {
    control: Controller,
    residual_coefficient: f64,
    stats: DecodeStats,
}

impl Default for ContainerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerCodec {
    /// Create a new codec context
    pub fn new() -> Self {
        Self {
            control: Controller::new(),
            residual_coefficient: DEFAULT_RESIDUAL_COEFFICIENT,
            stats: DecodeStats::default(),
        }
    }

    /// Call `f(done, total)` as slices are written or accepted
    pub fn set_progress_callback<F>(&mut self, f: F)
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.control.set_progress(f);
    }

    pub fn clear_progress_callback(&mut self) {
        self.control.clear_progress();
    }

    /// Raise or clear the cancel flag; it stays set until cleared
    pub fn request_cancel(&self, cancel: bool) {
        self.control.cancel_flag().set(cancel);
    }

    /// Handle for cancelling from another thread
    pub fn cancel_flag(&self) -> CancelFlag {
        self.control.cancel_flag()
    }

    /// Statistics of the most recent unpack
    pub fn stats(&self) -> DecodeStats {
        self.stats.clone()
    }

    /// Share of a CRC-mismatching shard assumed wrong; clamped to 0.0..=1.0
    pub fn set_residual_coefficient(&mut self, coefficient: f64) {
        self.residual_coefficient = clamp_coefficient(coefficient);
    }

    pub fn residual_coefficient(&self) -> f64 {
        self.residual_coefficient
    }

    /// Pack the file at `input` into a container at `output`
    pub fn pack(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        options: &PackOptions,
    ) -> Result<Completion> {
        let (input, output) = (input.as_ref(), output.as_ref());
        compute_pad(options.redundancy)?;

        let mut source = File::open(input).map_err(|source| FrameError::InputOpen {
            path: input.to_path_buf(),
            source,
        })?;
        let original_size = source.metadata().map_err(FrameError::SourceSize)?.len();
        let sink = File::create(output).map_err(|source| FrameError::OutputOpen {
            path: output.to_path_buf(),
            source,
        })?;

        debug!("Packing {:?} into {:?}", input, output);
        self.pack_stream(&mut source, original_size, sink, options)
    }

    /// Pack `original_size` bytes from `reader` into `writer`
    pub fn pack_stream<R: Read, W: Write>(
        &mut self,
        reader: &mut R,
        original_size: u64,
        writer: W,
        options: &PackOptions,
    ) -> Result<Completion> {
        pack_stream(reader, original_size, writer, options, &mut self.control)
    }

    /// Unpack the container at `input` into `output`
    pub fn unpack(
        &mut self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        pad_mode: PadMode,
    ) -> Result<Completion> {
        let (input, output) = (input.as_ref(), output.as_ref());
        self.stats = DecodeStats::default();

        let source = File::open(input).map_err(|source| FrameError::InputOpen {
            path: input.to_path_buf(),
            source,
        })?;
        let sink = File::create(output).map_err(|source| FrameError::OutputOpen {
            path: output.to_path_buf(),
            source,
        })?;

        debug!("Unpacking {:?} into {:?}", input, output);
        self.unpack_stream(source, sink, pad_mode)
    }

    /// Unpack a container read from `reader` into `writer`
    pub fn unpack_stream<R: Read, W: Write>(
        &mut self,
        reader: R,
        writer: W,
        pad_mode: PadMode,
    ) -> Result<Completion> {
        let options = UnpackOptions {
            pad_mode,
            residual_coefficient: self.residual_coefficient,
        };
        unpack_stream(reader, writer, &options, &mut self.control, &mut self.stats)
    }
}
