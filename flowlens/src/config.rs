// THEORY:
// `EngineConfig` gathers every tunable of the engine in one serde-backed value,
// so a runner can load it from JSON and hand it to either pipeline. Missing
// fields fall back to the demo's defaults; thresholds go through the validated
// `Threshold` type, so an out-of-range slider value fails at load time.

use crate::core_modules::flow_tracker::FlowTracker;
use crate::core_modules::frame_diff::DEFAULT_STRIDE;
use crate::core_modules::optical_flow::{DEFAULT_STEP, MAX_STEP, OpticalFlowEstimator};
use crate::core_modules::pixel::pixel::{ColourChannel, Threshold};
use crate::core_modules::spatial_filters::DEFAULT_BLOCK_SIZE;
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum `|u|` or `|v|` for a zone to count as motion in summaries.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 5.0;

/// Which thresholded view a threshold slider controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdTarget {
    Red,
    Green,
    Blue,
    Xyz,
    Hsv,
}

impl From<ColourChannel> for ThresholdTarget {
    fn from(channel: ColourChannel) -> Self {
        match channel {
            ColourChannel::Red => ThresholdTarget::Red,
            ColourChannel::Green => ThresholdTarget::Green,
            ColourChannel::Blue => ThresholdTarget::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    pub red: Threshold,
    pub green: Threshold,
    pub blue: Threshold,
    pub xyz: Threshold,
    pub hsv: Threshold,
}

impl ThresholdSet {
    pub fn get(&self, target: ThresholdTarget) -> Threshold {
        match target {
            ThresholdTarget::Red => self.red,
            ThresholdTarget::Green => self.green,
            ThresholdTarget::Blue => self.blue,
            ThresholdTarget::Xyz => self.xyz,
            ThresholdTarget::Hsv => self.hsv,
        }
    }

    pub fn set(&mut self, target: ThresholdTarget, threshold: Threshold) {
        let slot = match target {
            ThresholdTarget::Red => &mut self.red,
            ThresholdTarget::Green => &mut self.green,
            ThresholdTarget::Blue => &mut self.blue,
            ThresholdTarget::Xyz => &mut self.xyz,
            ThresholdTarget::Hsv => &mut self.hsv,
        };
        *slot = threshold;
    }
}

/// Configuration shared by `FilterPipeline` and `ParallelPipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Half-size of an optical-flow window.
    pub flow_step: u32,
    pub pixelate_block_size: u32,
    pub significance_threshold: f64,
    pub thresholds: ThresholdSet,
    /// Byte stride of the duplicate-frame probe.
    pub diff_stride: usize,
    /// Bytes probed for duplicates; `None` probes the whole frame.
    pub diff_sample_count: Option<usize>,
    /// Parallel workers; `None` uses one per logical CPU.
    pub worker_count: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flow_step: DEFAULT_STEP,
            pixelate_block_size: DEFAULT_BLOCK_SIZE,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            thresholds: ThresholdSet::default(),
            diff_stride: DEFAULT_STRIDE,
            diff_sample_count: None,
            worker_count: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flow_step == 0 || self.flow_step > MAX_STEP {
            return Err(VisionError::invalid("flow_step", format!("must be in 1..={MAX_STEP}")));
        }
        if self.pixelate_block_size == 0 {
            return Err(VisionError::invalid("pixelate_block_size", "must be positive"));
        }
        if self.diff_stride == 0 {
            return Err(VisionError::invalid("diff_stride", "must be positive"));
        }
        if self.worker_count == Some(0) {
            return Err(VisionError::invalid("worker_count", "must be positive"));
        }
        if self.significance_threshold.is_nan() || self.significance_threshold < 0.0 {
            return Err(VisionError::invalid(
                "significance_threshold",
                format!("{} is not a non-negative number", self.significance_threshold),
            ));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        self.worker_count.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn estimator(&self) -> Result<OpticalFlowEstimator> {
        OpticalFlowEstimator::new(self.flow_step)
    }

    pub fn flow_tracker(&self) -> Result<FlowTracker> {
        FlowTracker::new(self.estimator()?, self.diff_stride, self.diff_sample_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.flow_step, 8);
        assert_eq!(config.pixelate_block_size, 5);
        assert_eq!(config.thresholds.hsv, Threshold::DEFAULT);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config = EngineConfig::from_json_str(
            r#"{ "flow_step": 4, "thresholds": { "green": 200 }, "worker_count": 2 }"#,
        )
        .unwrap();
        assert_eq!(config.flow_step, 4);
        assert_eq!(config.thresholds.green.value(), 200);
        assert_eq!(config.thresholds.red, Threshold::DEFAULT);
        assert_eq!(config.workers(), 2);
        assert_eq!(config.estimator().unwrap().step(), 4);
    }

    #[test]
    fn out_of_range_threshold_fails_to_load() {
        let err = EngineConfig::from_json_str(r#"{ "thresholds": { "red": 256 } }"#).unwrap_err();
        assert!(matches!(err, VisionError::Config(_)));
        assert!(EngineConfig::from_json_str(r#"{ "thresholds": { "xyz": -1 } }"#).is_err());
    }

    #[test]
    fn zero_parameters_are_rejected() {
        for json in [
            r#"{ "flow_step": 0 }"#,
            r#"{ "pixelate_block_size": 0 }"#,
            r#"{ "diff_stride": 0 }"#,
            r#"{ "worker_count": 0 }"#,
        ] {
            let err = EngineConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, VisionError::InvalidParameter { .. }), "{json}");
        }
    }

    #[test]
    fn step_too_large_for_a_window_is_rejected_at_load() {
        let err = EngineConfig::from_json_str(r#"{ "flow_step": 2147483648 }"#).unwrap_err();
        assert!(matches!(err, VisionError::InvalidParameter { name: "flow_step", .. }));
        let config = EngineConfig::from_json_str(r#"{ "flow_step": 2147483647 }"#).unwrap();
        assert!(config.flow_tracker().is_ok());
    }

    #[test]
    fn threshold_set_round_trips_by_target() {
        let mut set = ThresholdSet::default();
        set.set(ThresholdTarget::Xyz, Threshold::new(12).unwrap());
        assert_eq!(set.get(ThresholdTarget::Xyz).value(), 12);
        assert_eq!(set.get(ThresholdTarget::from(ColourChannel::Blue)), Threshold::DEFAULT);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("flowlens-missing-config.json");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(EngineConfig::from_path(&path), Err(VisionError::Io(_))));
    }
}
