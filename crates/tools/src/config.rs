//! Configuration profile for the RSCT tool

use anyhow::{Context, Result};
use rsct_frame::decoder::PadMode;
use rsct_frame::layout::{DEFAULT_INTERLEAVE_DEPTH, DEFAULT_REDUNDANCY, DEFAULT_SLICE_BYTES};
use rsct_frame::stats::DEFAULT_RESIDUAL_COEFFICIENT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Defaults for `pack`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackProfile {
    pub redundancy: u16,
    pub interleave_depth: u16,
    pub slice_bytes: u16,
}

impl Default for PackProfile {
    fn default() -> Self {
        Self {
            redundancy: DEFAULT_REDUNDANCY,
            interleave_depth: DEFAULT_INTERLEAVE_DEPTH,
            slice_bytes: DEFAULT_SLICE_BYTES,
        }
    }
}

/// Defaults for `unpack`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackProfile {
    pub pad_mode: PadMode,
    pub residual_coefficient: f64,
}

impl Default for UnpackProfile {
    fn default() -> Self {
        Self {
            pad_mode: PadMode::default(),
            residual_coefficient: DEFAULT_RESIDUAL_COEFFICIENT,
        }
    }
}

/// Tool profile; command-line flags override its values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub pack: PackProfile,
    pub unpack: UnpackProfile,
}

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let profile: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(profile)
    }

    /// Load `path` if given, otherwise use built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Save the profile as TOML
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
