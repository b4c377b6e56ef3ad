//! Pack command: source file to container

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use rsct_frame::prelude::*;

use crate::common::ProgressReporter;
use crate::config::PackProfile;

/// Pack configuration
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "pack")]
#[command(about = "Pack a file into an RS container")]
pub struct PackConfig {
    /// Source file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Container file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Parity shards per frame (1..=63)
    #[arg(short, long)]
    pub redundancy: Option<u16>,

    /// Frames per interleave group
    #[arg(long)]
    pub depth: Option<u16>,

    /// Slice size in bytes
    #[arg(long)]
    pub slice: Option<u16>,
}

impl PackConfig {
    /// Merge flags over profile defaults
    pub fn options(&self, profile: &PackProfile) -> PackOptions {
        PackOptions {
            redundancy: self.redundancy.unwrap_or(profile.redundancy),
            interleave_depth: self.depth.unwrap_or(profile.interleave_depth),
            slice_bytes: self.slice.unwrap_or(profile.slice_bytes),
        }
    }
}

/// Packs one file
pub struct Packer {
    config: PackConfig,
    options: PackOptions,
    codec: ContainerCodec,
}

impl Packer {
    /// Create a new packer
    pub fn new(config: PackConfig, profile: &PackProfile, verbose: bool) -> Self {
        let options = config.options(profile);
        let mut codec = ContainerCodec::new();
        let mut reporter = ProgressReporter::new("pack", verbose);
        codec.set_progress_callback(move |done, total| reporter.update(done, total));

        Self {
            config,
            options,
            codec,
        }
    }

    /// Run the pack
    pub fn run(&mut self) -> Result<Completion> {
        info!(
            "Packing {:?} -> {:?} (r={})",
            self.config.input, self.config.output, self.options.redundancy
        );

        self.codec
            .pack(&self.config.input, &self.config.output, &self.options)
            .with_context(|| format!("Failed to pack {:?}", self.config.input))
    }
}
