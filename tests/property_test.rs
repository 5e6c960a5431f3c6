use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use mpit_rs::config::{CorrectionMethod, RfidWeighting};
use mpit_rs::correction::{
    Correction, CorrectionInput, CorrectionStrategy, DistanceDiff, Geometry, strategy_for,
};
use mpit_rs::fusion::{
    AggregatedPoses, IdentityMatcher, IntervalBinner, MatchedTrajectory, MatcherConfig, Point,
    PoseAggregator, PoseRow, PoseTable, ReaderCalibration, RfidAggregator, RfidEstimates,
    RfidEvent, TagId, TrackId,
};

const TRACKS: [&str; 3] = ["ind1", "ind2", "ind3"];
const TAGS: [&str; 3] = ["A", "B", "C"];

type Frame = (Option<(f64, f64)>, Option<(f64, f64)>, Option<(f64, f64)>);

fn coordinate() -> impl Strategy<Value = (f64, f64)> {
    (0.0f64..200.0, 0.0f64..200.0)
}

fn frames() -> impl Strategy<Value = Vec<Frame>> {
    prop::collection::vec(
        (
            prop::option::weighted(0.9, coordinate()),
            prop::option::weighted(0.9, coordinate()),
            prop::option::weighted(0.9, coordinate()),
        ),
        2..12,
    )
}

fn aggregate(frames: &[Frame]) -> AggregatedPoses {
    let mut rows = Vec::new();
    for (frame_index, &(a, b, c)) in frames.iter().enumerate() {
        for (track, position) in TRACKS.iter().zip([a, b, c]) {
            let ((x, y), likelihood) = match position {
                Some(p) => (p, 1.0),
                None => ((0.0, 0.0), 0.0),
            };
            rows.push(PoseRow {
                frame_index,
                track_id: TrackId::from(*track),
                body_part: "center".to_string(),
                x,
                y,
                likelihood,
            });
        }
    }
    PoseAggregator::new(0.5).aggregate(&PoseTable::from_rows(rows))
}

fn constant_trajectory(frame_count: usize) -> MatchedTrajectory {
    let mapping: BTreeMap<TrackId, TagId> = TRACKS
        .iter()
        .zip(TAGS)
        .map(|(track, tag)| (TrackId::from(*track), TagId::from(tag)))
        .collect();
    let mut trajectory = MatchedTrajectory::new(frame_count);
    for frame in 0..frame_count {
        trajectory.set_assignment(frame, mapping.clone());
    }
    trajectory
}

fn single_interval(frame_count: usize) -> IntervalBinner {
    IntervalBinner::new(0.0, frame_count as f64, frame_count as f64, 1.0).unwrap()
}

fn distance_diff(
    geometry: Geometry,
    threshold: f64,
    trajectory: &MatchedTrajectory,
    poses: &AggregatedPoses,
) -> Correction {
    let binner = single_interval(trajectory.frame_count());
    let estimates = RfidEstimates::default();
    DistanceDiff::new(geometry, threshold)
        .correct(&CorrectionInput {
            trajectory,
            poses,
            estimates: &estimates,
            binner: &binner,
        })
        .unwrap()
}

proptest! {
    #[test]
    fn prop_interval_assignment_is_injective(
        tags in prop::collection::vec(coordinate(), 1..6),
        tracks in prop::collection::vec(coordinate(), 1..6),
        present in prop::collection::vec(any::<bool>(), 6),
    ) {
        let readers: Vec<String> = (0..tags.len()).map(|i| format!("R{i}")).collect();
        let calibration = ReaderCalibration::from_ordered(
            readers.clone(),
            tags.iter().map(|&(x, y)| Point::new(x, y)),
        )
        .unwrap();
        let mut events: Vec<RfidEvent> = readers
            .iter()
            .enumerate()
            .map(|(i, reader)| RfidEvent::new(format!("T{i}"), reader.as_str(), 0.5, 0.1))
            .collect();
        // Only some tags are read again in the second interval
        for (i, reader) in readers.iter().enumerate() {
            if present[i] {
                events.push(RfidEvent::new(format!("T{i}"), reader.as_str(), 1.5, 0.1));
            }
        }

        let binner = IntervalBinner::new(0.0, 2.0, 1.0, 1.0).unwrap();
        let estimates = RfidAggregator::new(RfidWeighting::EventCount)
            .aggregate(&binner, &calibration, &events)
            .unwrap();
        let positions: BTreeMap<TrackId, Point> = tracks
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| (TrackId::from(format!("ind{i}")), Point::new(x, y)))
            .collect();

        let mut matcher = IdentityMatcher::new(MatcherConfig::default());
        let first = matcher.update(0, &estimates, &positions).unwrap();
        prop_assert!(first.is_injective());
        prop_assert_eq!(first.mapping.len(), tags.len().min(tracks.len()));
        prop_assert_eq!(first.degraded, tags.len() != tracks.len());

        let second = matcher.update(1, &estimates, &positions).unwrap();
        prop_assert!(second.is_injective());
        prop_assert!(second.mapping.keys().all(|track| positions.contains_key(track)));
    }

    #[test]
    fn prop_distance_diff_is_idempotent(frames in frames(), threshold in 1.0f64..60.0) {
        let poses = aggregate(&frames);
        let trajectory = constant_trajectory(frames.len());

        for geometry in [Geometry::Centroid, Geometry::BodyParts] {
            let first = distance_diff(geometry, threshold, &trajectory, &poses);
            let second = distance_diff(geometry, threshold, &first.trajectory, &poses);
            prop_assert_eq!(second.count(), 0);
            prop_assert_eq!(&second.trajectory, &first.trajectory);
        }
    }

    #[test]
    fn prop_higher_threshold_never_adds_events(
        frames in frames(),
        threshold in 1.0f64..60.0,
        raise in 0.0f64..120.0,
    ) {
        let poses = aggregate(&frames);
        let trajectory = constant_trajectory(frames.len());

        for geometry in [Geometry::Centroid, Geometry::BodyParts] {
            let low = distance_diff(geometry, threshold, &trajectory, &poses);
            let high = distance_diff(geometry, threshold + raise, &trajectory, &poses);
            prop_assert!(high.count() <= low.count());
        }
    }

    #[test]
    fn prop_corrections_only_permute_tags(
        frames in frames(),
        readers in prop::collection::vec(coordinate(), 3),
    ) {
        let poses = aggregate(&frames);
        let trajectory = constant_trajectory(frames.len());
        let binner = single_interval(frames.len());
        let calibration = ReaderCalibration::from_ordered(
            ["R1", "R2", "R3"],
            readers.iter().map(|&(x, y)| Point::new(x, y)),
        )
        .unwrap();
        let events: Vec<RfidEvent> = TAGS
            .iter()
            .zip(["R1", "R2", "R3"])
            .map(|(tag, reader)| RfidEvent::new(*tag, reader, 0.5, 0.1))
            .collect();
        let estimates = RfidAggregator::new(RfidWeighting::EventCount)
            .aggregate(&binner, &calibration, &events)
            .unwrap();
        let input = CorrectionInput {
            trajectory: &trajectory,
            poses: &poses,
            estimates: &estimates,
            binner: &binner,
        };

        for method in CorrectionMethod::ALL {
            let correction = strategy_for(method, 20.0).correct(&input).unwrap();
            for frame in 0..frames.len() {
                let before = trajectory.assignment(frame).unwrap();
                let after = correction.trajectory.assignment(frame).unwrap();
                let tags_before: BTreeSet<&TagId> = before.values().collect();
                let tags_after: BTreeSet<&TagId> = after.values().collect();
                prop_assert_eq!(before.len(), after.len());
                prop_assert_eq!(tags_before, tags_after);
                prop_assert!(before.keys().eq(after.keys()));
            }
        }
    }
}
