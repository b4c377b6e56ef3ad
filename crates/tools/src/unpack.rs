//! Unpack command: container to reconstructed file

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use rsct_frame::prelude::*;

use crate::common::ProgressReporter;
use crate::config::UnpackProfile;

/// Unpack configuration
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "unpack")]
#[command(about = "Reconstruct a file from an RS container")]
pub struct UnpackConfig {
    /// Container file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Reconstructed file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Fallback for uncorrectable columns: raw, zero or temporal
    #[arg(long)]
    pub pad: Option<PadMode>,

    /// Share of a CRC-mismatching shard counted as wrong (0.0..=1.0)
    #[arg(long)]
    pub residual_coefficient: Option<f64>,

    /// Print decode statistics as JSON
    #[arg(long)]
    pub stats_json: bool,
}

/// Unpacks one container
pub struct Unpacker {
    config: UnpackConfig,
    pad_mode: PadMode,
    codec: ContainerCodec,
}

impl Unpacker {
    /// Create a new unpacker
    pub fn new(config: UnpackConfig, profile: &UnpackProfile, verbose: bool) -> Self {
        let pad_mode = config.pad.unwrap_or(profile.pad_mode);
        let mut codec = ContainerCodec::new();
        codec.set_residual_coefficient(
            config
                .residual_coefficient
                .unwrap_or(profile.residual_coefficient),
        );
        let mut reporter = ProgressReporter::new("unpack", verbose);
        codec.set_progress_callback(move |done, total| reporter.update(done, total));

        Self {
            config,
            pad_mode,
            codec,
        }
    }

    pub fn pad_mode(&self) -> PadMode {
        self.pad_mode
    }

    pub fn residual_coefficient(&self) -> f64 {
        self.codec.residual_coefficient()
    }

    /// Run the unpack and return its statistics
    pub fn run(&mut self) -> Result<(Completion, DecodeStats)> {
        info!(
            "Unpacking {:?} -> {:?} (pad={})",
            self.config.input, self.config.output, self.pad_mode
        );

        let completion = self
            .codec
            .unpack(&self.config.input, &self.config.output, self.pad_mode)
            .with_context(|| format!("Failed to unpack {:?}", self.config.input))?;

        let stats = self.codec.stats();
        if stats.failed_columns > 0 {
            warn!(
                "{} of {} columns could not be corrected",
                stats.failed_columns, stats.codewords_total
            );
        }
        Ok((completion, stats))
    }

    /// Render statistics for the terminal, or as JSON when requested
    pub fn render(&self, stats: &DecodeStats) -> Result<String> {
        if self.config.stats_json {
            return serde_json::to_string_pretty(stats).context("Failed to serialize stats");
        }

        Ok(format!(
            "frames: {} ({} missing, {} intact)\n\
             slices: {} ok, {} bad (expected {})\n\
             symbols corrected: {}\n\
             columns: {} with erasures, {} failed (pad {})\n\
             residual BER: {:.3e}",
            stats.frames_total,
            stats.frames_missing,
            stats.frames_intact,
            stats.slices_ok,
            stats.slices_bad,
            stats.slices_total_est,
            stats.corrected_symbols,
            stats.used_erasure_columns,
            stats.failed_columns,
            stats.pad_mode,
            stats.residual_ber,
        ))
    }
}
