//! Pose keypoints per frame and track, and their reduction to centroids.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fusion::ids::TrackId;
use crate::fusion::point::{Point, mean_point};

/// One row of the long-format pose table: a body part of a track in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRow {
    pub frame_index: usize,
    pub track_id: TrackId,
    pub body_part: String,
    pub x: f64,
    pub y: f64,
    pub likelihood: f64,
}

/// Detected keypoint with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub likelihood: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, likelihood: f64) -> Self {
        Self { x, y, likelihood }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// All keypoints of one anonymous track in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub frame_index: usize,
    pub track_id: TrackId,
    pub body_parts: BTreeMap<String, Keypoint>,
}

/// Pose tracker output for a whole recording, indexed by frame then track.
#[derive(Debug, Clone, Default)]
pub struct PoseTable {
    frames: Vec<BTreeMap<TrackId, PoseFrame>>,
    tracks: BTreeSet<TrackId>,
    body_parts: BTreeSet<String>,
}

impl PoseTable {
    /// Create an empty table spanning `frame_count` frames.
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![BTreeMap::new(); frame_count],
            ..Default::default()
        }
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = PoseRow>,
    {
        let mut table = Self::default();
        for row in rows {
            table.insert(row);
        }
        table
    }

    /// Add one body part. A repeated (frame, track, body part) replaces the
    /// earlier value.
    pub fn insert(&mut self, row: PoseRow) {
        if row.frame_index >= self.frames.len() {
            self.frames.resize(row.frame_index + 1, BTreeMap::new());
        }
        self.tracks.insert(row.track_id.clone());
        self.body_parts.insert(row.body_part.clone());

        let frame = self.frames[row.frame_index]
            .entry(row.track_id.clone())
            .or_insert_with(|| PoseFrame {
                frame_index: row.frame_index,
                track_id: row.track_id,
                body_parts: BTreeMap::new(),
            });
        frame
            .body_parts
            .insert(row.body_part, Keypoint::new(row.x, row.y, row.likelihood));
    }

    /// Extend the table to at least `frame_count` frames.
    pub fn pad_to(&mut self, frame_count: usize) {
        if frame_count > self.frames.len() {
            self.frames.resize(frame_count, BTreeMap::new());
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn tracks(&self) -> &BTreeSet<TrackId> {
        &self.tracks
    }

    pub fn body_parts(&self) -> &BTreeSet<String> {
        &self.body_parts
    }

    pub fn frame(&self, frame_index: usize) -> Option<&BTreeMap<TrackId, PoseFrame>> {
        self.frames.get(frame_index)
    }

    pub fn get(&self, frame_index: usize, track: &TrackId) -> Option<&PoseFrame> {
        self.frames.get(frame_index)?.get(track)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseFrame> {
        self.frames.iter().flat_map(|tracks| tracks.values())
    }
}

/// Reduced pose of one track in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackObservation {
    /// Body parts that passed the likelihood filter.
    pub body_parts: BTreeMap<String, Point>,
    /// Mean of `body_parts`; `None` when no body part survived.
    pub centroid: Option<Point>,
}

impl TrackObservation {
    pub fn has_data(&self) -> bool {
        self.centroid.is_some()
    }
}

/// Centroid of a track in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseCentroid {
    pub frame_index: usize,
    pub track_id: TrackId,
    pub position: Point,
}

/// Per-frame, per-track observations of a whole recording.
#[derive(Debug, Clone, Default)]
pub struct AggregatedPoses {
    frames: Vec<BTreeMap<TrackId, TrackObservation>>,
    tracks: BTreeSet<TrackId>,
}

impl AggregatedPoses {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn tracks(&self) -> &BTreeSet<TrackId> {
        &self.tracks
    }

    pub fn frame(&self, frame_index: usize) -> Option<&BTreeMap<TrackId, TrackObservation>> {
        self.frames.get(frame_index)
    }

    pub fn observation(&self, frame_index: usize, track: &TrackId) -> Option<&TrackObservation> {
        self.frames.get(frame_index)?.get(track)
    }

    pub fn centroid(&self, frame_index: usize, track: &TrackId) -> Option<&Point> {
        self.observation(frame_index, track)?.centroid.as_ref()
    }

    /// Every defined centroid, ordered by frame then track.
    pub fn centroids(&self) -> Vec<PoseCentroid> {
        self.frames
            .iter()
            .enumerate()
            .flat_map(|(frame_index, tracks)| {
                tracks.iter().filter_map(move |(track, obs)| {
                    obs.centroid.map(|position| PoseCentroid {
                        frame_index,
                        track_id: track.clone(),
                        position,
                    })
                })
            })
            .collect()
    }
}

/// Filters keypoints by likelihood and reduces each track to a centroid.
#[derive(Debug, Clone, Copy)]
pub struct PoseAggregator {
    likelihood_threshold: f64,
}

impl PoseAggregator {
    pub fn new(likelihood_threshold: f64) -> Self {
        Self {
            likelihood_threshold,
        }
    }

    /// Body parts with `likelihood >= threshold` and finite coordinates.
    pub fn filter(&self, frame: &PoseFrame) -> BTreeMap<String, Point> {
        frame
            .body_parts
            .iter()
            .filter(|(_, kp)| {
                kp.likelihood >= self.likelihood_threshold && kp.x.is_finite() && kp.y.is_finite()
            })
            .map(|(name, kp)| (name.clone(), kp.position()))
            .collect()
    }

    pub fn observe(&self, frame: &PoseFrame) -> TrackObservation {
        let body_parts = self.filter(frame);
        let centroid = mean_point(body_parts.values());
        TrackObservation {
            body_parts,
            centroid,
        }
    }

    pub fn centroid(&self, frame: &PoseFrame) -> Option<Point> {
        self.observe(frame).centroid
    }

    pub fn aggregate(&self, table: &PoseTable) -> AggregatedPoses {
        let frames = table
            .frames
            .iter()
            .map(|tracks| {
                tracks
                    .iter()
                    .map(|(track, frame)| (track.clone(), self.observe(frame)))
                    .collect()
            })
            .collect();
        AggregatedPoses {
            frames,
            tracks: table.tracks.clone(),
        }
    }
}
