//! Inspect command: describe a container without decoding it

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::path::PathBuf;

use rsct_frame::inspect::{inspect, ContainerSummary};
use rsct_frame::layout::RecordKind;

use crate::common::format_bytes;

/// Inspect configuration
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "inspect")]
#[command(about = "List the header and records of an RS container")]
pub struct InspectConfig {
    /// Container file
    #[arg(short, long)]
    pub input: PathBuf,

    /// List every record
    #[arg(long)]
    pub records: bool,
}

/// Read and summarize a container file
pub fn summarize(config: &InspectConfig) -> Result<ContainerSummary> {
    let file =
        File::open(&config.input).with_context(|| format!("Cannot open {:?}", config.input))?;
    inspect(file).with_context(|| format!("Failed to inspect {:?}", config.input))
}

/// Render a summary for the terminal
pub fn render(summary: &ContainerSummary, records: bool) -> String {
    let h = &summary.header;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "container v{}: {} ({} frames), k={} r={} pad={}, depth={} slice={}",
        h.version,
        format_bytes(h.original_size),
        h.frame_count,
        h.k,
        h.r,
        h.pad,
        h.interleave_depth,
        h.slice_bytes
    );
    let _ = writeln!(
        out,
        "records: {} frame headers, {} slices ({} bad, {} expected), {} bytes skipped{}",
        summary.frame_records,
        summary.slice_records,
        summary.bad_slices,
        h.total_slices(),
        summary.skipped_bytes,
        if summary.truncated { ", truncated" } else { "" }
    );

    if records {
        for r in &summary.records {
            let _ = match r.kind {
                RecordKind::Frame => writeln!(
                    out,
                    "{:>10}..{:<10} frame  {:>6} data_len={}",
                    r.start, r.end, r.frame_index, r.size
                ),
                RecordKind::Slice => writeln!(
                    out,
                    "{:>10}..{:<10} slice  {:>6} offset={} size={}{}",
                    r.start,
                    r.end,
                    r.frame_index,
                    r.offset,
                    r.size,
                    if r.crc_ok { "" } else { " BAD" }
                ),
            };
        }
    }

    out
}
