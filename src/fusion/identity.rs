//! Interval-level identity matching between RFID tags and pose tracks.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{MismatchPolicy, PipelineConfig};
use crate::error::Result;
use crate::fusion::ids::{TagId, TrackId};
use crate::fusion::interval::IntervalBinner;
use crate::fusion::matching::{self, AssignmentResult};
use crate::fusion::point::{Point, distance_matrix, mean_point};
use crate::fusion::pose::AggregatedPoses;
use crate::fusion::rfid::RfidEstimates;
use crate::fusion::trajectory::MatchedTrajectory;

/// Configuration for the IdentityMatcher.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    pub mismatch_policy: MismatchPolicy,
    /// Streak of mismatching intervals that escalates logging; 0 disables.
    pub mismatch_streak_warning: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            mismatch_policy: MismatchPolicy::MatchSubset,
            mismatch_streak_warning: 3,
        }
    }
}

impl From<&PipelineConfig> for MatcherConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            mismatch_policy: config.mismatch_policy,
            mismatch_streak_warning: config.mismatch_streak_warning,
        }
    }
}

/// Track → tag mapping of one interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityAssignment {
    pub interval_index: usize,
    pub mapping: BTreeMap<TrackId, TagId>,
    /// Set when tags and tracks could not all be paired.
    pub degraded: bool,
}

impl IdentityAssignment {
    pub fn tag_of(&self, track: &TrackId) -> Option<&TagId> {
        self.mapping.get(track)
    }

    pub fn track_of(&self, tag: &TagId) -> Option<&TrackId> {
        self.mapping
            .iter()
            .find(|(_, t)| *t == tag)
            .map(|(track, _)| track)
    }

    /// No tag is carried by two tracks.
    pub fn is_injective(&self) -> bool {
        let tags: BTreeSet<&TagId> = self.mapping.values().collect();
        tags.len() == self.mapping.len()
    }
}

/// Tags with an estimate and tracks with a centroid differ in number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountMismatch {
    pub interval_index: usize,
    pub tags: usize,
    pub tracks: usize,
    /// Consecutive mismatching intervals up to and including this one.
    pub streak: usize,
}

/// Bookkeeping of a matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchReport {
    pub mismatches: Vec<CountMismatch>,
    /// (interval, tag, track) kept from the previous interval for lack of
    /// RFID data.
    pub carried_forward: Vec<(usize, TagId, TrackId)>,
    pub longest_mismatch_streak: usize,
}

/// Result of matching every interval.
#[derive(Debug, Clone, Default)]
pub struct IdentityMatch {
    pub assignments: Vec<IdentityAssignment>,
    pub trajectory: MatchedTrajectory,
    pub report: MatchReport,
}

/// Assigns RFID tags to anonymous tracks interval by interval.
pub struct IdentityMatcher {
    config: MatcherConfig,
    /// tag → track of the most recent committed assignment.
    current: BTreeMap<TagId, TrackId>,
    streak: usize,
    report: MatchReport,
}

impl IdentityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            current: BTreeMap::new(),
            streak: 0,
            report: MatchReport::default(),
        }
    }

    /// Match all intervals in order and relabel every frame.
    pub fn run(
        mut self,
        binner: &IntervalBinner,
        estimates: &RfidEstimates,
        poses: &AggregatedPoses,
    ) -> Result<IdentityMatch> {
        let frame_count = poses.frame_count();
        let mut trajectory = MatchedTrajectory::new(frame_count);
        let mut assignments = Vec::with_capacity(binner.len());

        for interval in binner.intervals() {
            let frames = binner.frames_in(interval.index, frame_count);
            let positions = representative_positions(poses, frames.clone());
            let assignment = self.update(interval.index, estimates, &positions)?;

            for frame in frames {
                trajectory.set_assignment(frame, assignment.mapping.clone());
            }
            assignments.push(assignment);
        }

        info!(
            intervals = assignments.len(),
            mismatches = self.report.mismatches.len(),
            carried_forward = self.report.carried_forward.len(),
            "identity matching finished"
        );

        Ok(IdentityMatch {
            assignments,
            trajectory,
            report: self.report,
        })
    }

    /// Commit the assignment of one interval.
    ///
    /// `positions` holds the representative position of every track that
    /// has data in the interval.
    pub fn update(
        &mut self,
        interval_index: usize,
        estimates: &RfidEstimates,
        positions: &BTreeMap<TrackId, Point>,
    ) -> Result<IdentityAssignment> {
        let available: BTreeMap<&TagId, &Point> = estimates.available(interval_index).collect();
        let mut mapping: BTreeMap<TrackId, TagId> = BTreeMap::new();

        // Step 1: Tags without RFID data keep their previous track
        for (tag, track) in &self.current {
            if !available.contains_key(tag) && !mapping.contains_key(track) {
                mapping.insert(track.clone(), tag.clone());
                self.report
                    .carried_forward
                    .push((interval_index, tag.clone(), track.clone()));
            }
        }

        // Step 2: Split remaining tracks and available tags
        let mut tag_rows: Vec<&TagId> = available.keys().copied().collect();
        let mut track_cols: Vec<&TrackId> = positions
            .keys()
            .filter(|track| !mapping.contains_key(*track))
            .collect();
        let (num_tags, num_tracks) = (tag_rows.len(), track_cols.len());
        let degraded = num_tags != num_tracks;

        // Step 3: Count mismatch handling
        if degraded {
            self.record_mismatch(interval_index, num_tags, num_tracks);

            if self.config.mismatch_policy == MismatchPolicy::CarryForward {
                let kept: Vec<(&TrackId, &TagId)> = track_cols
                    .iter()
                    .filter_map(|&track| {
                        self.current
                            .iter()
                            .find(|(tag, t)| *t == track && available.contains_key(*tag))
                            .map(|(tag, _)| (track, tag))
                    })
                    .collect();
                for (track, tag) in kept {
                    mapping.insert(track.clone(), tag.clone());
                    tag_rows.retain(|t| *t != tag);
                    track_cols.retain(|t| *t != track);
                }
            }
        } else {
            self.streak = 0;
        }

        // Step 4: Match the remaining tracks against the remaining tags
        let tag_points: Vec<Point> = tag_rows.iter().map(|t| *available[t]).collect();
        let track_points: Vec<Point> = track_cols.iter().map(|t| positions[*t]).collect();
        let dists = distance_matrix(&tag_points, &track_points);

        let AssignmentResult { matches, .. } = matching::linear_assignment(&dists)?;
        for (row, col) in matches {
            mapping.insert(track_cols[col].clone(), tag_rows[row].clone());
        }

        // Step 5: Update state
        let mut next: BTreeMap<TagId, TrackId> = mapping
            .iter()
            .map(|(track, tag)| (tag.clone(), track.clone()))
            .collect();
        for (tag, track) in &self.current {
            if !next.contains_key(tag) && !mapping.contains_key(track) {
                next.insert(tag.clone(), track.clone());
            }
        }
        self.current = next;

        debug!(
            interval = interval_index,
            tags = num_tags,
            tracks = num_tracks,
            assigned = mapping.len(),
            "interval matched"
        );

        Ok(IdentityAssignment {
            interval_index,
            mapping,
            degraded,
        })
    }

    fn record_mismatch(&mut self, interval_index: usize, tags: usize, tracks: usize) {
        self.streak += 1;
        self.report.longest_mismatch_streak = self.report.longest_mismatch_streak.max(self.streak);

        if self.config.mismatch_streak_warning > 0
            && self.streak == self.config.mismatch_streak_warning
        {
            error!(
                interval = interval_index,
                streak = self.streak,
                "tag and track counts keep disagreeing, identities may cascade"
            );
        } else {
            warn!(interval = interval_index, tags, tracks, "tag/track count mismatch");
        }

        self.report.mismatches.push(CountMismatch {
            interval_index,
            tags,
            tracks,
            streak: self.streak,
        });
    }
}

/// Mean centroid of every track over `frames`; tracks without any centroid
/// in the range are left out.
pub fn representative_positions(
    poses: &AggregatedPoses,
    frames: std::ops::Range<usize>,
) -> BTreeMap<TrackId, Point> {
    poses
        .tracks()
        .iter()
        .filter_map(|track| {
            let centroids: Vec<Point> = frames
                .clone()
                .filter_map(|f| poses.centroid(f, track).copied())
                .collect();
            mean_point(&centroids).map(|p| (track.clone(), p))
        })
        .collect()
}
