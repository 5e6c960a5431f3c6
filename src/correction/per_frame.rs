//! Frame-granularity re-matching against carried-forward RFID estimates.

use std::collections::BTreeMap;

use ndarray::Array2;
use tracing::{debug, info};

use crate::config::CorrectionMethod;
use crate::correction::strategy::{
    Correction, CorrectionEvent, CorrectionInput, CorrectionStrategy, Geometry, mean_distance,
    transpositions,
};
use crate::error::Result;
use crate::fusion::{Point, TagId, TrackId, linear_assignment};

/// Re-solves the tag/track assignment in every frame instead of once per
/// interval.
///
/// Only tracks that carry a tag and have data in the frame take part, and
/// only among the tags they carry, so the set of tags in a frame never
/// changes. Each tag is placed at its latest estimate at or before the
/// frame's interval. An exchange holds over the following frames until the
/// interval-level assignment changes, so it is reported once.
#[derive(Debug, Clone, Copy)]
pub struct PerFrameMatch {
    geometry: Geometry,
}

struct Participant<'a> {
    track: &'a TrackId,
    tag: &'a TagId,
    points: Vec<&'a Point>,
    target: &'a Point,
}

impl PerFrameMatch {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }

    /// Re-solve one frame starting from `reference`, pushing one event per
    /// exchange.
    fn resolve(
        &self,
        input: &CorrectionInput<'_>,
        frame: usize,
        interval: usize,
        reference: BTreeMap<TrackId, TagId>,
        events: &mut Vec<CorrectionEvent>,
    ) -> Result<BTreeMap<TrackId, TagId>> {
        let method = self.method();
        let participants: Vec<Participant<'_>> = reference
            .iter()
            .filter_map(|(track, tag)| {
                let points = input
                    .poses
                    .observation(frame, track)
                    .map(|obs| self.geometry.points(obs))
                    .filter(|points| !points.is_empty())?;
                let target = input.estimates.carried_position(interval, tag)?;
                Some(Participant {
                    track,
                    tag,
                    points,
                    target,
                })
            })
            .collect();
        if participants.len() < 2 {
            return Ok(reference);
        }

        // Rows are tags, columns are tracks
        let n = participants.len();
        let cost = Array2::from_shape_fn((n, n), |(row, col)| {
            mean_distance(&participants[col].points, participants[row].target)
        });
        let result = linear_assignment(&cost)?;

        let before: BTreeMap<TrackId, TagId> = participants
            .iter()
            .map(|p| (p.track.clone(), p.tag.clone()))
            .collect();
        let after: BTreeMap<TrackId, TagId> = result
            .matches
            .iter()
            .map(|&(row, col)| (participants[col].track.clone(), participants[row].tag.clone()))
            .collect();
        if before == after {
            return Ok(reference);
        }

        let cost_before: f64 = (0..n).map(|i| cost[[i, i]]).sum();
        let cost_after = result.total_cost(&cost);
        for (track_a, track_b) in transpositions(&before, &after) {
            debug!(frame, %track_a, %track_b, %method, "per-frame identity exchange");
            events.push(CorrectionEvent {
                frame_index: frame,
                tag_a: before[&track_a].clone(),
                tag_b: before[&track_b].clone(),
                track_a,
                track_b,
                method,
                cost_before,
                cost_after,
            });
        }

        let mut corrected = reference.clone();
        corrected.extend(after);
        Ok(corrected)
    }
}

impl CorrectionStrategy for PerFrameMatch {
    fn method(&self) -> CorrectionMethod {
        match self.geometry {
            Geometry::BodyParts => CorrectionMethod::BodyPartsPerFrame,
            Geometry::Centroid => CorrectionMethod::CentroidPerFrame,
        }
    }

    fn correct(&self, input: &CorrectionInput<'_>) -> Result<Correction> {
        let method = self.method();
        let mut trajectory = input.trajectory.clone();
        let mut events = Vec::new();
        // Input and corrected assignment of the last frame processed
        let mut previous: Option<(&BTreeMap<TrackId, TagId>, BTreeMap<TrackId, TagId>)> = None;

        for frame in 0..input.trajectory.frame_count() {
            let Some(interval) = input.binner.interval_for_frame(frame) else {
                continue;
            };
            let Some(assignment) = input.trajectory.assignment(frame) else {
                continue;
            };

            let reference = match &previous {
                Some((matched, corrected)) if *matched == assignment => corrected.clone(),
                _ => assignment.clone(),
            };
            let corrected = self.resolve(input, frame, interval, reference, &mut events)?;
            trajectory.set_assignment(frame, corrected.clone());
            previous = Some((assignment, corrected));
        }

        info!(%method, corrections = events.len(), "correction finished");
        Ok(Correction {
            method,
            trajectory,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RfidWeighting;
    use crate::fusion::{
        IntervalBinner, MatchedTrajectory, Point, PoseAggregator, PoseRow, PoseTable,
        ReaderCalibration, RfidAggregator, RfidEstimates, RfidEvent,
    };

    fn pose_rows(frame: usize, track: &str, x: f64) -> Vec<PoseRow> {
        [("nose", x + 1.0), ("tail", x - 1.0)]
            .into_iter()
            .map(|(part, px)| PoseRow {
                frame_index: frame,
                track_id: TrackId::from(track),
                body_part: part.to_string(),
                x: px,
                y: 0.0,
                likelihood: 1.0,
            })
            .collect()
    }

    fn estimates(binner: &IntervalBinner) -> RfidEstimates {
        let calibration = ReaderCalibration::from_ordered(
            ["R1", "R2"],
            [Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
        )
        .unwrap();
        let events = vec![RfidEvent::new("A", "R1", 0.5, 0.1), RfidEvent::new("B", "R2", 0.5, 0.1)];
        RfidAggregator::new(RfidWeighting::EventCount)
            .aggregate(binner, &calibration, &events)
            .unwrap()
    }

    fn matched(frame_count: usize) -> MatchedTrajectory {
        let mut trajectory = MatchedTrajectory::new(frame_count);
        let matched: BTreeMap<TrackId, TagId> = [
            (TrackId::from("t1"), TagId::from("A")),
            (TrackId::from("t2"), TagId::from("B")),
        ]
        .into();
        for frame in 0..frame_count {
            trajectory.set_assignment(frame, matched.clone());
        }
        trajectory
    }

    #[test]
    fn test_lasting_swap_is_reported_once() {
        // One 5-frame interval; the raw tracks swap from frame 1 on.
        let binner = IntervalBinner::new(0.0, 5.0, 5.0, 1.0).unwrap();
        let estimates = estimates(&binner);

        let mut rows = Vec::new();
        for frame in 0..5 {
            let (x1, x2) = if frame < 1 { (5.0, 95.0) } else { (95.0, 5.0) };
            rows.extend(pose_rows(frame, "t1", x1));
            rows.extend(pose_rows(frame, "t2", x2));
        }
        let poses = PoseAggregator::new(0.5).aggregate(&PoseTable::from_rows(rows));
        let trajectory = matched(5);

        let input = CorrectionInput {
            trajectory: &trajectory,
            poses: &poses,
            estimates: &estimates,
            binner: &binner,
        };
        for geometry in [Geometry::Centroid, Geometry::BodyParts] {
            let correction = PerFrameMatch::new(geometry).correct(&input).unwrap();
            assert_eq!(correction.count(), 1);
            assert_eq!(correction.events[0].frame_index, 1);
            assert!(correction.events[0].cost_after < correction.events[0].cost_before);
            let t1 = TrackId::from("t1");
            assert_eq!(correction.trajectory.tag_of(0, &t1), Some(&TagId::from("A")));
            for frame in 1..5 {
                assert_eq!(correction.trajectory.tag_of(frame, &t1), Some(&TagId::from("B")));
            }
        }
        // The matched trajectory itself is never modified.
        assert_eq!(trajectory.tag_of(3, &TrackId::from("t1")), Some(&TagId::from("A")));
    }

    #[test]
    fn test_swap_holds_across_gap_frame() {
        let binner = IntervalBinner::new(0.0, 4.0, 4.0, 1.0).unwrap();
        let estimates = estimates(&binner);

        let mut rows = Vec::new();
        for frame in 0..4 {
            let (x1, x2) = if frame < 1 { (5.0, 95.0) } else { (95.0, 5.0) };
            rows.extend(pose_rows(frame, "t1", x1));
            // t2 is undetected in frame 2
            let mut t2 = pose_rows(frame, "t2", x2);
            if frame == 2 {
                t2.iter_mut().for_each(|row| row.likelihood = 0.0);
            }
            rows.extend(t2);
        }
        let poses = PoseAggregator::new(0.5).aggregate(&PoseTable::from_rows(rows));
        let trajectory = matched(4);

        let correction = PerFrameMatch::new(Geometry::Centroid)
            .correct(&CorrectionInput {
                trajectory: &trajectory,
                poses: &poses,
                estimates: &estimates,
                binner: &binner,
            })
            .unwrap();
        assert_eq!(correction.count(), 1);
        assert_eq!(
            correction.trajectory.tag_of(2, &TrackId::from("t1")),
            Some(&TagId::from("B"))
        );
    }
}
