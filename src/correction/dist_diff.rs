//! Swap detection from displacement between consecutive frames.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::CorrectionMethod;
use crate::correction::strategy::{
    Correction, CorrectionEvent, CorrectionInput, CorrectionStrategy, Footprint, Geometry,
};
use crate::error::Result;
use crate::fusion::{AggregatedPoses, TagId, TrackId};

/// Exchanges two tracks' tags when doing so shortens the distance both
/// animals travelled since their last sighting by more than `threshold`.
///
/// Exchanges hold from their frame onward, until the interval-level
/// assignment itself changes. A tag that such a change moves to another
/// track starts over without a footprint, so RFID re-anchoring is never
/// mistaken for a jump.
#[derive(Debug, Clone, Copy)]
pub struct DistanceDiff {
    geometry: Geometry,
    threshold: f64,
}

struct Candidate<'a> {
    a: &'a TrackId,
    b: &'a TrackId,
    unswapped: f64,
    swapped: f64,
}

impl Candidate<'_> {
    fn improvement(&self) -> f64 {
        self.unswapped - self.swapped
    }
}

/// Per-tag state carried from frame to frame.
#[derive(Debug, Default)]
struct SwapState {
    /// Last footprint of every tag seen so far.
    last: BTreeMap<TagId, Footprint>,
    /// Input tag → corrected tag; missing entries map to themselves.
    permutation: BTreeMap<TagId, TagId>,
}

impl SwapState {
    fn relabel(&self, tag: &TagId) -> TagId {
        self.permutation.get(tag).unwrap_or(tag).clone()
    }

    /// Start over from a new interval-level assignment. Tags that `after`
    /// gives to a different track than `before` lose their footprint.
    fn reanchor(&mut self, before: &BTreeMap<TrackId, TagId>, after: &BTreeMap<TrackId, TagId>) {
        self.permutation.clear();
        let holders: BTreeMap<&TagId, &TrackId> = before.iter().map(|(tr, tg)| (tg, tr)).collect();
        for (track, tag) in after {
            if holders.get(tag) != Some(&track) {
                self.last.remove(tag);
            }
        }
    }

    /// Exchange the corrected tags of two input tags.
    fn exchange(&mut self, input_a: &TagId, input_b: &TagId) {
        let a = self.relabel(input_a);
        let b = self.relabel(input_b);
        self.permutation.insert(input_a.clone(), b);
        self.permutation.insert(input_b.clone(), a);
    }
}

impl DistanceDiff {
    pub fn new(geometry: Geometry, threshold: f64) -> Self {
        Self {
            geometry,
            threshold,
        }
    }

    fn displacement(
        &self,
        last: &Footprint,
        poses: &AggregatedPoses,
        frame: usize,
        track: &TrackId,
    ) -> Option<f64> {
        poses
            .observation(frame, track)
            .and_then(|obs| last.displacement_to(obs))
    }

    /// Best exchange in `current`, if any beats the threshold.
    fn best_candidate<'a>(
        &self,
        state: &SwapState,
        poses: &AggregatedPoses,
        frame: usize,
        current: &'a BTreeMap<TrackId, TagId>,
    ) -> Option<Candidate<'a>> {
        let live: Vec<(&TrackId, &Footprint)> = current
            .iter()
            .filter(|(track, _)| {
                poses
                    .observation(frame, track)
                    .is_some_and(|obs| obs.has_data())
            })
            .filter_map(|(track, tag)| state.last.get(tag).map(|fp| (track, fp)))
            .collect();

        let mut best: Option<Candidate<'a>> = None;
        for (i, &(a, last_a)) in live.iter().enumerate() {
            for &(b, last_b) in &live[i + 1..] {
                let (Some(aa), Some(bb), Some(ab), Some(ba)) = (
                    self.displacement(last_a, poses, frame, a),
                    self.displacement(last_b, poses, frame, b),
                    self.displacement(last_a, poses, frame, b),
                    self.displacement(last_b, poses, frame, a),
                ) else {
                    continue;
                };
                let candidate = Candidate {
                    a,
                    b,
                    unswapped: aa + bb,
                    swapped: ab + ba,
                };
                if candidate.improvement() > self.threshold
                    && best
                        .as_ref()
                        .is_none_or(|held| candidate.improvement() > held.improvement())
                {
                    best = Some(candidate);
                }
            }
        }
        best
    }
}

impl CorrectionStrategy for DistanceDiff {
    fn method(&self) -> CorrectionMethod {
        match self.geometry {
            Geometry::BodyParts => CorrectionMethod::BodyPartsFrameDistDiff,
            Geometry::Centroid => CorrectionMethod::CentroidFrameDistDiff,
        }
    }

    fn correct(&self, input: &CorrectionInput<'_>) -> Result<Correction> {
        let method = self.method();
        let poses = input.poses;
        let mut trajectory = input.trajectory.clone();
        let mut events = Vec::new();
        let mut state = SwapState::default();
        let mut previous: Option<&BTreeMap<TrackId, TagId>> = None;
        // Corrected assignment of the last frame processed
        let mut settled: BTreeMap<TrackId, TagId> = BTreeMap::new();

        for frame in 0..input.trajectory.frame_count() {
            let Some(matched) = input.trajectory.assignment(frame) else {
                continue;
            };
            // A new interval-level assignment re-anchors identities
            if previous.is_some_and(|p| p != matched) {
                state.reanchor(&settled, matched);
            }
            previous = Some(matched);

            let mut current: BTreeMap<TrackId, TagId> = matched
                .iter()
                .map(|(track, tag)| (track.clone(), state.relabel(tag)))
                .collect();

            while let Some(candidate) = self.best_candidate(&state, poses, frame, &current) {
                let (a, b) = (candidate.a.clone(), candidate.b.clone());
                let tag_a = current[&a].clone();
                let tag_b = current[&b].clone();
                debug!(
                    frame,
                    track_a = %a,
                    track_b = %b,
                    before = candidate.unswapped,
                    after = candidate.swapped,
                    "displacement swap"
                );
                events.push(CorrectionEvent {
                    frame_index: frame,
                    track_a: a.clone(),
                    track_b: b.clone(),
                    tag_a: tag_a.clone(),
                    tag_b: tag_b.clone(),
                    method,
                    cost_before: candidate.unswapped,
                    cost_after: candidate.swapped,
                });

                state.exchange(&matched[&a], &matched[&b]);
                current.insert(a, tag_b);
                current.insert(b, tag_a);
            }

            // Gaps leave the last footprint untouched
            for (track, tag) in &current {
                let Some(footprint) = poses
                    .observation(frame, track)
                    .and_then(|obs| self.geometry.footprint(obs))
                else {
                    continue;
                };
                match state.last.get_mut(tag) {
                    Some(last) => last.absorb(footprint),
                    None => {
                        state.last.insert(tag.clone(), footprint);
                    }
                }
            }

            settled.clone_from(&current);
            trajectory.set_assignment(frame, current);
        }

        info!(%method, corrections = events.len(), "correction finished");
        Ok(Correction {
            method,
            trajectory,
            events,
        })
    }
}
