//! Run configuration and recording metadata.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One identity-swap correction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CorrectionMethod {
    /// Per-frame re-matching using body-part positions.
    BodyPartsPerFrame,
    /// Per-frame re-matching using centroid positions.
    CentroidPerFrame,
    /// Displacement continuity between consecutive frames, on body parts.
    BodyPartsFrameDistDiff,
    /// Displacement continuity between consecutive frames, on centroids.
    CentroidFrameDistDiff,
}

impl CorrectionMethod {
    pub const ALL: [CorrectionMethod; 4] = [
        CorrectionMethod::BodyPartsPerFrame,
        CorrectionMethod::CentroidPerFrame,
        CorrectionMethod::BodyPartsFrameDistDiff,
        CorrectionMethod::CentroidFrameDistDiff,
    ];

    /// Name used on the command line and in output file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BodyPartsPerFrame => "bp_perFrame",
            Self::CentroidPerFrame => "centroid_perFrame",
            Self::BodyPartsFrameDistDiff => "bp_frameDistDiff",
            Self::CentroidFrameDistDiff => "centroid_frameDistDiff",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorrectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::configuration(format!("unknown correction method `{s}`")))
    }
}

impl Serialize for CorrectionMethod {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

/// Which correction strategies a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MethodSelection {
    Single(CorrectionMethod),
    /// Run every strategy independently.
    #[default]
    All,
}

impl MethodSelection {
    pub fn methods(&self) -> Vec<CorrectionMethod> {
        match self {
            Self::Single(method) => vec![*method],
            Self::All => CorrectionMethod::ALL.to_vec(),
        }
    }
}

impl FromStr for MethodSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Single)
        }
    }
}

impl TryFrom<String> for MethodSelection {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, String> {
        value
            .parse()
            .map_err(|_| format!("unknown correction method `{value}`"))
    }
}

impl From<MethodSelection> for String {
    fn from(value: MethodSelection) -> Self {
        match value {
            MethodSelection::Single(method) => method.name().to_string(),
            MethodSelection::All => "all".to_string(),
        }
    }
}

/// How RFID events are weighted when averaging reader positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfidWeighting {
    /// Every event counts once, regardless of its duration.
    #[default]
    EventCount,
    /// Events are weighted by their dwell time.
    Duration,
}

/// What happens to tracks and tags left over when their counts differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Only the matched subset is assigned; leftovers are unresolved.
    #[default]
    MatchSubset,
    /// Leftover tracks keep their previous tag when it is still free.
    CarryForward,
}

/// Configuration for the fusion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Interval length in seconds.
    pub length_time_interval: f64,
    /// Body parts below this likelihood are treated as missing.
    pub likelihood_threshold: f64,
    /// Minimum displacement gain (pixels) for a distance-difference swap.
    pub min_dist_diff_threshold: f64,
    pub correction_method: MethodSelection,
    pub rfid_weighting: RfidWeighting,
    pub mismatch_policy: MismatchPolicy,
    /// Consecutive mismatching intervals before the log escalates; 0 disables.
    pub mismatch_streak_warning: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            length_time_interval: 2.0,
            likelihood_threshold: 0.9,
            min_dist_diff_threshold: 50.0,
            correction_method: MethodSelection::All,
            rfid_weighting: RfidWeighting::EventCount,
            mismatch_policy: MismatchPolicy::MatchSubset,
            mismatch_streak_warning: 3,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration. Anything the file gets wrong,
    /// syntax included, is a configuration error.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(content).map_err(|e| Error::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.length_time_interval.is_finite() && self.length_time_interval > 0.0) {
            return Err(Error::configuration(format!(
                "length_time_interval must be a positive number of seconds, got {}",
                self.length_time_interval
            )));
        }
        if !(self.likelihood_threshold > 0.0 && self.likelihood_threshold <= 1.0) {
            return Err(Error::configuration(format!(
                "likelihood_threshold must lie in (0, 1], got {}",
                self.likelihood_threshold
            )));
        }
        if !(self.min_dist_diff_threshold.is_finite() && self.min_dist_diff_threshold > 0.0) {
            return Err(Error::configuration(format!(
                "min_dist_diff_threshold must be positive, got {}",
                self.min_dist_diff_threshold
            )));
        }
        Ok(())
    }
}

/// Metadata of the recording the pose and RFID tables belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    /// Absolute timestamp of the first video frame, in seconds.
    pub start_timestamp: f64,
    pub fps: f64,
    pub frame_count: usize,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl RecordingInfo {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let info: RecordingInfo = toml::from_str(&content)?;
        info.validate()?;
        Ok(info)
    }

    /// Recording duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(Error::configuration(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if !self.start_timestamp.is_finite() {
            return Err(Error::configuration("start_timestamp must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for method in CorrectionMethod::ALL {
            assert_eq!(method.name().parse::<CorrectionMethod>().unwrap(), method);
        }
        assert_eq!("all".parse::<MethodSelection>().unwrap(), MethodSelection::All);
    }

    #[test]
    fn test_unknown_method_is_configuration_error() {
        let err = "nearest".parse::<MethodSelection>().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.correction_method.methods().len(), 4);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = PipelineConfig::from_toml_str(
            r#"
            length_time_interval = 1.5
            correction_method = "centroid_frameDistDiff"
            rfid_weighting = "duration"
            "#,
        )
        .unwrap();
        assert_eq!(config.length_time_interval, 1.5);
        assert_eq!(
            config.correction_method,
            MethodSelection::Single(CorrectionMethod::CentroidFrameDistDiff)
        );
        assert_eq!(config.rfid_weighting, RfidWeighting::Duration);
        assert_eq!(config.likelihood_threshold, 0.9);
    }

    #[test]
    fn test_toml_rejects_unknown_method() {
        let err = PipelineConfig::from_toml_str(r#"correction_method = "magic""#).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("unknown correction method `magic`"));

        let err = PipelineConfig::from_toml_str("length_time_interval = ").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = PipelineConfig {
            length_time_interval: 0.0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());

        config.length_time_interval = 2.0;
        config.min_dist_diff_threshold = -1.0;
        assert!(config.validate().unwrap_err().is_configuration());

        config.min_dist_diff_threshold = 50.0;
        config.likelihood_threshold = 0.0;
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_recording_duration() {
        let info = RecordingInfo {
            start_timestamp: 1_000.0,
            fps: 25.0,
            frame_count: 250,
            width: 640,
            height: 480,
        };
        assert_eq!(info.duration(), 10.0);
        info.validate().unwrap();
    }
}
