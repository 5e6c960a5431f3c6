//! FusionPipeline for combining RFID detections with pose tracks.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CorrectionMethod, PipelineConfig, RecordingInfo};
use crate::correction::{Correction, CorrectionInput, run_corrections};
use crate::error::{Error, Result};
use crate::fusion::{
    AggregatedPoses, CountMismatch, IdentityMatch, IdentityMatcher, IntervalBinner,
    MatcherConfig, PoseAggregator, PoseTable, ReaderCalibration, RfidAggregator, RfidEstimates,
    RfidEvent,
};

use super::{PoseSource, RfidSource};

/// Runs binning, aggregation, identity matching and swap correction on one
/// recording.
#[derive(Debug, Clone)]
pub struct FusionPipeline {
    config: PipelineConfig,
}

impl FusionPipeline {
    /// Create a pipeline; the configuration is validated up front.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one recording.
    ///
    /// Every stage runs to completion before this returns; nothing is
    /// written anywhere.
    pub fn run(
        &self,
        recording: &RecordingInfo,
        calibration: &ReaderCalibration,
        events: &[RfidEvent],
        table: PoseTable,
    ) -> Result<PipelineOutput> {
        recording.validate()?;
        if calibration.is_empty() {
            return Err(Error::configuration("no RFID reader positions configured"));
        }

        let mut table = table;
        if table.frame_count() > recording.frame_count {
            warn!(
                pose_frames = table.frame_count(),
                recording_frames = recording.frame_count,
                "pose table extends past the recording"
            );
        }
        table.pad_to(recording.frame_count);

        let binner = IntervalBinner::new(
            recording.start_timestamp,
            recording.duration(),
            self.config.length_time_interval,
            recording.fps,
        )?;
        let estimates = RfidAggregator::new(self.config.rfid_weighting).aggregate(
            &binner,
            calibration,
            events,
        )?;
        let poses = PoseAggregator::new(self.config.likelihood_threshold).aggregate(&table);

        let identity = IdentityMatcher::new(MatcherConfig::from(&self.config)).run(
            &binner,
            &estimates,
            &poses,
        )?;

        let input = CorrectionInput {
            trajectory: &identity.trajectory,
            poses: &poses,
            estimates: &estimates,
            binner: &binner,
        };
        let corrections = run_corrections(
            &self.config.correction_method.methods(),
            self.config.min_dist_diff_threshold,
            &input,
        )?;

        info!(
            intervals = binner.len(),
            frames = poses.frame_count(),
            tags = estimates.tags().len(),
            tracks = poses.tracks().len(),
            "pipeline finished"
        );

        Ok(PipelineOutput {
            binner,
            estimates,
            table,
            poses,
            identity,
            corrections,
        })
    }

    /// Pull both tables from their sources, then [`run`](Self::run).
    pub fn run_from_sources<R, P>(
        &self,
        recording: &RecordingInfo,
        calibration: &ReaderCalibration,
        rfid: &mut R,
        pose: &mut P,
    ) -> Result<PipelineOutput>
    where
        R: RfidSource,
        P: PoseSource,
    {
        let events = rfid.rfid_events().map_err(Into::<Error>::into)?;
        let rows = pose.pose_rows().map_err(Into::<Error>::into)?;
        self.run(recording, calibration, &events, PoseTable::from_rows(rows))
    }
}

/// Everything a run computed.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub binner: IntervalBinner,
    pub estimates: RfidEstimates,
    /// Raw keypoints, padded to the recording length.
    pub table: PoseTable,
    pub poses: AggregatedPoses,
    pub identity: IdentityMatch,
    /// One entry per configured method, in method order.
    pub corrections: Vec<Correction>,
}

impl PipelineOutput {
    pub fn correction(&self, method: CorrectionMethod) -> Option<&Correction> {
        self.corrections.iter().find(|c| c.method == method)
    }

    pub fn summary(&self) -> RunSummary {
        let report = &self.identity.report;
        RunSummary {
            intervals: self.binner.len(),
            frames: self.poses.frame_count(),
            tags: self.estimates.tags().len(),
            tracks: self.poses.tracks().len(),
            corrections: self
                .corrections
                .iter()
                .map(|c| (c.method.name().to_string(), c.count()))
                .collect(),
            carried_forward: report.carried_forward.len(),
            longest_mismatch_streak: report.longest_mismatch_streak,
            mismatches: report.mismatches.clone(),
        }
    }
}

/// Machine-readable digest of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub intervals: usize,
    pub frames: usize,
    pub tags: usize,
    pub tracks: usize,
    /// Number of corrections per method name.
    pub corrections: BTreeMap<String, usize>,
    pub carried_forward: usize,
    pub longest_mismatch_streak: usize,
    pub mismatches: Vec<CountMismatch>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MethodSelection;
    use crate::fusion::{Point, PoseRow, TagId, TrackId};
    use crate::integration::PoseRowBuilder;

    fn recording(frame_count: usize) -> RecordingInfo {
        RecordingInfo {
            start_timestamp: 1_000.0,
            fps: 2.0,
            frame_count,
            width: 200,
            height: 100,
        }
    }

    fn calibration() -> ReaderCalibration {
        ReaderCalibration::from_ordered(
            ["R1", "R2"],
            [Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
        )
        .unwrap()
    }

    fn rows(frames: usize) -> Vec<PoseRow> {
        (0..frames)
            .flat_map(|frame| {
                [
                    PoseRowBuilder::new()
                        .frame(frame)
                        .track("ind1")
                        .body_part("nose")
                        .triple([98.0, 1.0, 0.99])
                        .build(),
                    PoseRowBuilder::new()
                        .frame(frame)
                        .track("ind2")
                        .body_part("nose")
                        .triple([2.0, 1.0, 0.99])
                        .build(),
                ]
            })
            .collect()
    }

    #[derive(Debug)]
    struct ReaderOffline;

    impl std::fmt::Display for ReaderOffline {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("reader offline")
        }
    }

    impl std::error::Error for ReaderOffline {}

    struct FailingSource;

    impl RfidSource for FailingSource {
        type Error = Error;

        fn rfid_events(&mut self) -> Result<Vec<RfidEvent>> {
            Err(Error::Source(Box::new(ReaderOffline)))
        }
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let pipeline = FusionPipeline::new(PipelineConfig::default()).unwrap();
        let events = vec![
            RfidEvent::new("A", "R1", 1_000.2, 0.1),
            RfidEvent::new("B", "R2", 1_000.4, 0.1),
        ];

        let output = pipeline
            .run(&recording(8), &calibration(), &events, PoseTable::from_rows(rows(8)))
            .unwrap();

        assert_eq!(output.binner.len(), 2);
        let trajectory = &output.identity.trajectory;
        for frame in 0..8 {
            assert_eq!(trajectory.tag_of(frame, &TrackId::from("ind1")), Some(&TagId::from("B")));
            assert_eq!(trajectory.tag_of(frame, &TrackId::from("ind2")), Some(&TagId::from("A")));
        }
        assert_eq!(output.corrections.len(), 4);

        let summary = output.summary();
        assert_eq!(summary.tags, 2);
        assert_eq!(summary.corrections.len(), 4);
        assert!(summary.corrections.values().all(|&n| n == 0));
        assert_eq!(summary.carried_forward, 2);
    }

    #[test]
    fn test_single_method_selection() {
        let config = PipelineConfig {
            correction_method: MethodSelection::Single(CorrectionMethod::CentroidPerFrame),
            ..Default::default()
        };
        let output = FusionPipeline::new(config)
            .unwrap()
            .run(&recording(4), &calibration(), &[], PoseTable::from_rows(rows(4)))
            .unwrap();
        assert_eq!(output.corrections.len(), 1);
        assert!(output.correction(CorrectionMethod::CentroidPerFrame).is_some());
        assert!(output.correction(CorrectionMethod::BodyPartsPerFrame).is_none());
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let config = PipelineConfig {
            length_time_interval: -1.0,
            ..Default::default()
        };
        assert!(FusionPipeline::new(config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_source_errors_are_wrapped() {
        let pipeline = FusionPipeline::new(PipelineConfig::default()).unwrap();
        let err = pipeline
            .run_from_sources(&recording(4), &calibration(), &mut FailingSource, &mut rows(4))
            .unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }
}
