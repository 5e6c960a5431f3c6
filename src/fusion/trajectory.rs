//! Per-frame track → tag assignments and relabeling of pose data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::fusion::ids::{TagId, TrackId};
use crate::fusion::point::Point;
use crate::fusion::pose::{AggregatedPoses, PoseTable};

/// Which tag each anonymous track carries, frame by frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedTrajectory {
    frames: Vec<BTreeMap<TrackId, TagId>>,
}

impl MatchedTrajectory {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![BTreeMap::new(); frame_count],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn assignment(&self, frame_index: usize) -> Option<&BTreeMap<TrackId, TagId>> {
        self.frames.get(frame_index)
    }

    /// Replace the assignment of one frame. Frames past the end are ignored.
    pub fn set_assignment(&mut self, frame_index: usize, assignment: BTreeMap<TrackId, TagId>) {
        if let Some(frame) = self.frames.get_mut(frame_index) {
            *frame = assignment;
        }
    }

    pub fn tag_of(&self, frame_index: usize, track: &TrackId) -> Option<&TagId> {
        self.frames.get(frame_index)?.get(track)
    }

    pub fn track_of(&self, frame_index: usize, tag: &TagId) -> Option<&TrackId> {
        self.frames
            .get(frame_index)?
            .iter()
            .find(|(_, t)| *t == tag)
            .map(|(track, _)| track)
    }

    /// Number of frames whose assignment differs from `other`.
    pub fn differing_frames(&self, other: &MatchedTrajectory) -> usize {
        self.frames
            .iter()
            .zip(&other.frames)
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Pose rows with the carried tag attached.
    pub fn relabel(&self, table: &PoseTable) -> Vec<IdentifiedPoseRow> {
        table
            .iter()
            .flat_map(|frame| {
                let tag_id = self.tag_of(frame.frame_index, &frame.track_id).cloned();
                frame.body_parts.iter().map(move |(part, kp)| IdentifiedPoseRow {
                    frame_index: frame.frame_index,
                    tag_id: tag_id.clone(),
                    track_id: frame.track_id.clone(),
                    body_part: part.clone(),
                    x: kp.x,
                    y: kp.y,
                    likelihood: kp.likelihood,
                })
            })
            .collect()
    }

    /// Centroids keyed by the tag their track carries; untagged tracks are
    /// left out.
    pub fn tagged_centroids(&self, poses: &AggregatedPoses) -> Vec<BTreeMap<TagId, Point>> {
        (0..self.frames.len())
            .map(|frame_index| {
                self.frames[frame_index]
                    .iter()
                    .filter_map(|(track, tag)| {
                        poses
                            .centroid(frame_index, track)
                            .map(|c| (tag.clone(), *c))
                    })
                    .collect()
            })
            .collect()
    }
}

/// A pose row after identity matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedPoseRow {
    pub frame_index: usize,
    /// `None` when the track carries no tag in this frame.
    pub tag_id: Option<TagId>,
    pub track_id: TrackId,
    pub body_part: String,
    pub x: f64,
    pub y: f64,
    pub likelihood: f64,
}
