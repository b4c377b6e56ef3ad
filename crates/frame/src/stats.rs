//! Decode telemetry and the residual error estimate

use crate::decoder::PadMode;
use crate::layout::{GlobalHeader, K_SHARDS, SHARD_LEN};
use serde::Serialize;

/// Share of a CRC-mismatching shard assumed wrong when none is configured
pub const DEFAULT_RESIDUAL_COEFFICIENT: f64 = 0.40;

/// Counters gathered by one unpack pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeStats {
    pub frames_total: u64,
    /// Frames for which no record survived
    pub frames_missing: u64,
    /// Frames whose data and parity matched their header CRC32s before decoding
    pub frames_intact: u64,
    pub slices_total_est: u64,
    pub slices_ok: u64,
    pub slices_bad: u64,
    pub codewords_total: u64,
    pub symbols_total: u64,
    pub data_symbols_total: u64,
    pub corrected_symbols: u64,
    pub used_erasure_columns: u64,
    pub failed_columns: u64,
    pub resync_skipped_bytes: u64,
    pub pad_mode: PadMode,
    pub residual_ber: f64,
}

impl DecodeStats {
    /// Fresh counters with the totals implied by a container header
    pub fn for_header(header: &GlobalHeader, pad_mode: PadMode) -> Self {
        let codewords = header.frame_count.saturating_mul(SHARD_LEN as u64);
        Self {
            frames_total: header.frame_count,
            slices_total_est: header.total_slices(),
            codewords_total: codewords,
            symbols_total: header.frame_count.saturating_mul(header.symbols_per_frame()),
            data_symbols_total: codewords.saturating_mul(K_SHARDS as u64),
            pad_mode,
            ..Self::default()
        }
    }
}

/// Residual bit-error estimate from shards still failing their CRC16
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualEstimator {
    coefficient: f64,
    bad_bytes: u64,
    written_bytes: u64,
}

impl Default for ResidualEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RESIDUAL_COEFFICIENT)
    }
}

impl ResidualEstimator {
    /// Create an estimator; the coefficient is clamped to 0.0..=1.0
    pub fn new(coefficient: f64) -> Self {
        Self {
            coefficient: clamp_coefficient(coefficient),
            bad_bytes: 0,
            written_bytes: 0,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Estimated bad bytes charged for one mismatching shard
    pub fn bad_bytes_per_shard(&self) -> u64 {
        (SHARD_LEN as f64 * self.coefficient) as u64
    }

    pub fn record_mismatched_shards(&mut self, shards: usize) {
        self.bad_bytes += shards as u64 * self.bad_bytes_per_shard();
    }

    pub fn record_written(&mut self, bytes: usize) {
        self.written_bytes += bytes as u64;
    }

    pub fn bad_bytes(&self) -> u64 {
        self.bad_bytes
    }

    /// Estimated bad bytes per byte written, 0.0 when nothing was flagged
    pub fn ber(&self) -> f64 {
        if self.written_bytes == 0 || self.bad_bytes == 0 {
            return 0.0;
        }
        self.bad_bytes as f64 / self.written_bytes as f64
    }
}

/// Clamp a residual coefficient into 0.0..=1.0, mapping NaN to the default
pub fn clamp_coefficient(coefficient: f64) -> f64 {
    if coefficient.is_nan() {
        DEFAULT_RESIDUAL_COEFFICIENT
    } else {
        coefficient.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_for_header() {
        let header = GlobalHeader::new(16, 12_288 * 3, 16, 512).unwrap();
        let stats = DecodeStats::for_header(&header, PadMode::Zero);
        assert_eq!(stats.frames_total, 3);
        assert_eq!(stats.codewords_total, 192);
        assert_eq!(stats.symbols_total, 208 * 192);
        assert_eq!(stats.data_symbols_total, 192 * 192);
        assert_eq!(stats.slices_total_est, 3 * 27);
        assert_eq!(stats.pad_mode, PadMode::Zero);
        assert_eq!(stats.slices_ok, 0);
    }

    #[test]
    fn test_stats_for_unvalidated_header_saturate() {
        let header = GlobalHeader::new(63, u64::MAX, 16, 1).unwrap();
        let stats = DecodeStats::for_header(&header, PadMode::Raw);
        assert_eq!(stats.frames_total, header.frame_count);
        assert_eq!(stats.symbols_total, u64::MAX);
        assert_eq!(stats.slices_total_est, u64::MAX);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = DecodeStats {
            slices_bad: 2,
            pad_mode: PadMode::Temporal,
            ..DecodeStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["slices_bad"], 2);
        assert_eq!(json["pad_mode"], "temporal");
    }

    #[test]
    fn test_coefficient_clamped() {
        assert_eq!(ResidualEstimator::new(1.5).coefficient(), 1.0);
        assert_eq!(ResidualEstimator::new(-0.2).coefficient(), 0.0);
        assert_eq!(ResidualEstimator::new(f64::NAN).coefficient(), 0.40);
        assert_eq!(ResidualEstimator::default().bad_bytes_per_shard(), 25);
        assert_eq!(ResidualEstimator::new(0.65).bad_bytes_per_shard(), 41);
    }

    #[test]
    fn test_ber() {
        let mut est = ResidualEstimator::default();
        assert_eq!(est.ber(), 0.0);

        est.record_written(1_000);
        assert_eq!(est.ber(), 0.0);

        est.record_mismatched_shards(2);
        assert_eq!(est.bad_bytes(), 50);
        assert!((est.ber() - 0.05).abs() < 1e-12);

        let mut none = ResidualEstimator::new(0.0);
        none.record_written(10);
        none.record_mismatched_shards(3);
        assert_eq!(none.ber(), 0.0);
    }
}
