//! The interface shared by every identity-swap correction strategy.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::CorrectionMethod;
use crate::error::Result;
use crate::fusion::{
    AggregatedPoses, IntervalBinner, MatchedTrajectory, Point, RfidEstimates, TagId, TrackId,
    TrackObservation, distance,
};

/// Read-only inputs of a correction run.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionInput<'a> {
    /// Interval-matched assignment to correct.
    pub trajectory: &'a MatchedTrajectory,
    pub poses: &'a AggregatedPoses,
    pub estimates: &'a RfidEstimates,
    pub binner: &'a IntervalBinner,
}

/// Two tracks exchanged their tags from `frame_index` onward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionEvent {
    pub frame_index: usize,
    pub track_a: TrackId,
    pub track_b: TrackId,
    /// Tag carried by `track_a` before the exchange.
    pub tag_a: TagId,
    /// Tag carried by `track_b` before the exchange.
    pub tag_b: TagId,
    pub method: CorrectionMethod,
    /// Cost of the pairing before and after the exchange.
    pub cost_before: f64,
    pub cost_after: f64,
}

impl CorrectionEvent {
    pub fn reason(&self) -> String {
        format!(
            "{}: cost {:.2} -> {:.2}",
            self.method, self.cost_before, self.cost_after
        )
    }
}

/// Output of one strategy.
#[derive(Debug, Clone)]
pub struct Correction {
    pub method: CorrectionMethod,
    pub trajectory: MatchedTrajectory,
    pub events: Vec<CorrectionEvent>,
}

impl Correction {
    pub fn count(&self) -> usize {
        self.events.len()
    }
}

/// A way of repairing identity swaps in a matched trajectory.
pub trait CorrectionStrategy: Send + Sync {
    fn method(&self) -> CorrectionMethod;

    /// Produce a corrected copy of `input.trajectory`; the input is left
    /// untouched.
    fn correct(&self, input: &CorrectionInput<'_>) -> Result<Correction>;
}

/// Which part of a pose a strategy measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    BodyParts,
    Centroid,
}

impl Geometry {
    /// Distance of an observed track to a fixed point.
    ///
    /// For body parts this is the mean distance of the surviving parts.
    pub fn cost_to(&self, observation: &TrackObservation, target: &Point) -> Option<f64> {
        let points = self.points(observation);
        (!points.is_empty()).then(|| mean_distance(&points, target))
    }

    /// The points this geometry measures; empty for a gap.
    pub fn points<'o>(&self, observation: &'o TrackObservation) -> Vec<&'o Point> {
        match self {
            Self::Centroid => observation.centroid.iter().collect(),
            Self::BodyParts => observation.body_parts.values().collect(),
        }
    }

    /// Snapshot of an observation, or `None` for a gap.
    pub fn footprint(&self, observation: &TrackObservation) -> Option<Footprint> {
        match self {
            Self::Centroid => observation.centroid.map(Footprint::Centroid),
            Self::BodyParts if observation.body_parts.is_empty() => None,
            Self::BodyParts => Some(Footprint::BodyParts(observation.body_parts.clone())),
        }
    }
}

/// Last known position of an animal.
#[derive(Debug, Clone, PartialEq)]
pub enum Footprint {
    Centroid(Point),
    BodyParts(BTreeMap<String, Point>),
}

impl Footprint {
    /// Distance travelled from this footprint to `observation`.
    ///
    /// Body parts are compared by name and averaged; `None` when nothing
    /// can be compared.
    pub fn displacement_to(&self, observation: &TrackObservation) -> Option<f64> {
        match self {
            Self::Centroid(last) => observation.centroid.as_ref().map(|c| distance(last, c)),
            Self::BodyParts(last) => {
                let (total, count) = observation
                    .body_parts
                    .iter()
                    .filter_map(|(name, p)| last.get(name).map(|l| distance(l, p)))
                    .fold((0.0, 0usize), |(sum, n), d| (sum + d, n + 1));
                (count > 0).then(|| total / count as f64)
            }
        }
    }

    /// Fold a newer observation in. Body parts missing from it keep their
    /// previous position.
    pub fn absorb(&mut self, newer: Footprint) {
        match (self, newer) {
            (Self::BodyParts(last), Self::BodyParts(parts)) => last.extend(parts),
            (this, newer) => *this = newer,
        }
    }
}

/// Mean distance of `points` to `target`; `points` must not be empty.
pub fn mean_distance(points: &[&Point], target: &Point) -> f64 {
    let total: f64 = points.iter().map(|p| distance(p, target)).sum();
    total / points.len() as f64
}

/// Decompose the change from `before` to `after` into pairwise exchanges.
///
/// Both maps must assign the same set of tags to the same set of tracks.
/// Returns `(track_a, track_b)` pairs, one fewer than the length of each
/// permutation cycle.
pub fn transpositions(
    before: &BTreeMap<TrackId, TagId>,
    after: &BTreeMap<TrackId, TagId>,
) -> Vec<(TrackId, TrackId)> {
    let holder: BTreeMap<&TagId, &TrackId> = before.iter().map(|(tr, tg)| (tg, tr)).collect();
    let mut visited: Vec<&TrackId> = Vec::new();
    let mut pairs = Vec::new();

    for (start, new_tag) in after {
        if before.get(start) == Some(new_tag) || visited.contains(&start) {
            continue;
        }
        let mut current = start;
        visited.push(start);
        loop {
            let Some(&next) = after.get(current).and_then(|tag| holder.get(tag)) else {
                break;
            };
            if next == start || visited.contains(&next) {
                break;
            }
            pairs.push((current.clone(), next.clone()));
            visited.push(next);
            current = next;
        }
    }
    pairs
}
