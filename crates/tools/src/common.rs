//! Common utilities for the RSCT tool

use clap::Parser;
use std::path::PathBuf;

/// Options shared by every subcommand
#[derive(Debug, Clone, Default, Parser)]
pub struct GlobalConfig {
    /// Configuration profile (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output and progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalConfig {
    /// Log level implied by the flags
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

/// Initialize logging based on configuration
pub fn init_logging(config: &GlobalConfig) {
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Progress reporter for long-running operations
pub struct ProgressReporter {
    label: &'static str,
    last_percent: u8,
    verbose: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new(label: &'static str, verbose: bool) -> Self {
        Self {
            label,
            last_percent: 0,
            verbose,
        }
    }

    /// Percentage to print for this update, if it crosses a new 10% step
    pub fn step(&mut self, done: u64, total: u64) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = (done.min(total) * 100 / total) as u8;
        if percent != self.last_percent && percent % 10 == 0 {
            self.last_percent = percent;
            return Some(percent);
        }
        None
    }

    /// Update progress
    pub fn update(&mut self, done: u64, total: u64) {
        if !self.verbose {
            return;
        }
        if let Some(percent) = self.step(done, total) {
            eprintln!("{}: {}%", self.label, percent);
        }
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
