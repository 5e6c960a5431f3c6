//! Builders for pose rows and RFID events from loosely shaped input.

use crate::fusion::{PoseRow, ReaderId, RfidEvent, TagId, TrackId};

/// Builder for [`PoseRow`] values.
#[derive(Debug, Clone, Default)]
pub struct PoseRowBuilder {
    frame_index: usize,
    track_id: TrackId,
    body_part: String,
    x: f64,
    y: f64,
    likelihood: f64,
}

impl PoseRowBuilder {
    /// Create a new pose row builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(mut self, frame_index: usize) -> Self {
        self.frame_index = frame_index;
        self
    }

    /// Set the anonymous track, e.g. `ind1`.
    pub fn track(mut self, track_id: impl Into<TrackId>) -> Self {
        self.track_id = track_id.into();
        self
    }

    pub fn body_part(mut self, body_part: impl Into<String>) -> Self {
        self.body_part = body_part.into();
        self
    }

    /// Set the keypoint in pixel coordinates.
    pub fn xy(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the keypoint from a pose estimator triple `[x, y, likelihood]`.
    pub fn triple(mut self, [x, y, likelihood]: [f64; 3]) -> Self {
        self.x = x;
        self.y = y;
        self.likelihood = likelihood;
        self
    }

    pub fn likelihood(mut self, likelihood: f64) -> Self {
        self.likelihood = likelihood;
        self
    }

    /// Build the final `PoseRow`.
    pub fn build(self) -> PoseRow {
        PoseRow {
            frame_index: self.frame_index,
            track_id: self.track_id,
            body_part: self.body_part,
            x: self.x,
            y: self.y,
            likelihood: self.likelihood,
        }
    }
}

/// Builder for [`RfidEvent`] values.
#[derive(Debug, Clone, Default)]
pub struct RfidEventBuilder {
    tag_id: TagId,
    reader_id: ReaderId,
    timestamp: f64,
    duration: f64,
}

impl RfidEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag_id: impl Into<TagId>) -> Self {
        self.tag_id = tag_id.into();
        self
    }

    pub fn reader(mut self, reader_id: impl Into<ReaderId>) -> Self {
        self.reader_id = reader_id.into();
        self
    }

    /// Set the absolute detection time in seconds.
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the detection from start and end times, in seconds.
    pub fn span(mut self, start: f64, end: f64) -> Self {
        self.timestamp = start;
        self.duration = (end - start).max(0.0);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn build(self) -> RfidEvent {
        RfidEvent {
            tag_id: self.tag_id,
            reader_id: self.reader_id,
            timestamp: self.timestamp,
            duration: self.duration,
        }
    }
}
