//! Fixed-length time intervals over the recording.

use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fusion::rfid::RfidEvent;

/// One time bucket, in seconds relative to the recording start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeInterval {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
}

impl TimeInterval {
    pub fn length(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t < self.end_time
    }
}

/// Splits a recording into intervals and buckets events and frames into them.
#[derive(Debug, Clone)]
pub struct IntervalBinner {
    start_timestamp: f64,
    duration: f64,
    length: f64,
    fps: f64,
    intervals: Vec<TimeInterval>,
}

impl IntervalBinner {
    /// Create the intervals covering `[0, duration)`.
    ///
    /// `start_timestamp` is the absolute time of the first frame, on the same
    /// clock as the RFID event timestamps.
    pub fn new(start_timestamp: f64, duration: f64, length: f64, fps: f64) -> Result<Self> {
        if !(length.is_finite() && length > 0.0) {
            return Err(Error::configuration(format!(
                "interval length must be positive, got {length}"
            )));
        }
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(Error::configuration(format!(
                "recording duration must be non-negative, got {duration}"
            )));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::configuration(format!("fps must be positive, got {fps}")));
        }

        let count = (duration / length).ceil() as usize;
        let intervals = (0..count)
            .map(|index| TimeInterval {
                index,
                start_time: index as f64 * length,
                end_time: ((index + 1) as f64 * length).min(duration),
            })
            .collect();

        Ok(Self {
            start_timestamp,
            duration,
            length,
            fps,
            intervals,
        })
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn interval_length(&self) -> f64 {
        self.length
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Interval containing `t` seconds after the recording start.
    ///
    /// A time exactly on a boundary belongs to the later interval.
    pub fn interval_for_time(&self, t: f64) -> Option<usize> {
        if !(t >= 0.0 && t < self.duration) {
            return None;
        }
        let index = (t / self.length).floor() as usize;
        Some(index.min(self.intervals.len().saturating_sub(1)))
    }

    /// Interval containing an absolute timestamp.
    pub fn interval_for_timestamp(&self, timestamp: f64) -> Option<usize> {
        self.interval_for_time(timestamp - self.start_timestamp)
    }

    /// Interval containing a video frame: `floor(frame / fps / L)`.
    ///
    /// Frames past the last interval, caused by rounding of the frame count,
    /// are clamped into it.
    pub fn interval_for_frame(&self, frame_index: usize) -> Option<usize> {
        if self.intervals.is_empty() {
            return None;
        }
        Some(self.raw_frame_interval(frame_index).min(self.intervals.len() - 1))
    }

    /// Frames whose index maps to `interval`, limited to `frame_count`.
    pub fn frames_in(&self, interval: usize, frame_count: usize) -> Range<usize> {
        if interval >= self.intervals.len() {
            return frame_count..frame_count;
        }
        let start = self.first_frame(interval, frame_count);
        let end = if interval + 1 == self.intervals.len() {
            frame_count
        } else {
            self.first_frame(interval + 1, frame_count)
        };
        start..end.max(start)
    }

    fn raw_frame_interval(&self, frame_index: usize) -> usize {
        (frame_index as f64 / self.fps / self.length).floor() as usize
    }

    /// First frame mapped to `interval` or later, consistent with
    /// `interval_for_frame` under floating-point rounding.
    fn first_frame(&self, interval: usize, frame_count: usize) -> usize {
        let mut frame =
            ((interval as f64 * self.length * self.fps).ceil() as usize).min(frame_count);
        while frame > 0 && self.raw_frame_interval(frame - 1) >= interval {
            frame -= 1;
        }
        while frame < frame_count && self.raw_frame_interval(frame) < interval {
            frame += 1;
        }
        frame
    }

    /// Bucket events by interval. Events outside the recording are dropped.
    pub fn bin_events<'a>(&self, events: &'a [RfidEvent]) -> Vec<Vec<&'a RfidEvent>> {
        let mut bins = vec![Vec::new(); self.intervals.len()];
        let mut dropped = 0usize;
        for event in events {
            match self.interval_for_timestamp(event.timestamp) {
                Some(index) => bins[index].push(event),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, "RFID events outside the recording were ignored");
        }
        bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(timestamp: f64) -> RfidEvent {
        RfidEvent::new("A", "R1", timestamp, 0.1)
    }

    #[test]
    fn test_intervals_cover_duration_with_truncated_tail() {
        let binner = IntervalBinner::new(0.0, 5.0, 2.0, 25.0).unwrap();
        let intervals = binner.intervals();
        assert_eq!(intervals.len(), 3);
        assert_relative_eq!(intervals[0].start_time, 0.0);
        assert_relative_eq!(intervals[1].end_time, 4.0);
        assert_relative_eq!(intervals[2].end_time, 5.0);
        assert_relative_eq!(intervals[2].length(), 1.0);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let binner = IntervalBinner::new(0.0, 4.0, 2.0, 25.0).unwrap();
        assert_eq!(binner.len(), 2);
    }

    #[test]
    fn test_non_positive_length_is_rejected() {
        assert!(IntervalBinner::new(0.0, 5.0, 0.0, 25.0).unwrap_err().is_configuration());
        assert!(IntervalBinner::new(0.0, 5.0, -1.0, 25.0).unwrap_err().is_configuration());
        assert!(IntervalBinner::new(0.0, 5.0, f64::NAN, 25.0).unwrap_err().is_configuration());
        assert!(IntervalBinner::new(0.0, 5.0, 2.0, 0.0).unwrap_err().is_configuration());
    }

    #[test]
    fn test_boundary_event_goes_to_later_interval() {
        let binner = IntervalBinner::new(100.0, 6.0, 2.0, 25.0).unwrap();
        assert_eq!(binner.interval_for_timestamp(101.999), Some(0));
        assert_eq!(binner.interval_for_timestamp(102.0), Some(1));
        assert_eq!(binner.interval_for_timestamp(99.0), None);
        assert_eq!(binner.interval_for_timestamp(106.0), None);
    }

    #[test]
    fn test_bin_events() {
        let binner = IntervalBinner::new(10.0, 4.0, 2.0, 25.0).unwrap();
        let events = vec![event(10.5), event(12.0), event(13.9), event(20.0)];
        let bins = binner.bin_events(&events);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].len(), 1);
        assert_eq!(bins[1].len(), 2);
    }

    #[test]
    fn test_frame_mapping() {
        let binner = IntervalBinner::new(0.0, 4.0, 2.0, 25.0).unwrap();
        assert_eq!(binner.interval_for_frame(0), Some(0));
        assert_eq!(binner.interval_for_frame(49), Some(0));
        assert_eq!(binner.interval_for_frame(50), Some(1));
        assert_eq!(binner.interval_for_frame(100), Some(1));
        assert_eq!(binner.frames_in(0, 100), 0..50);
        assert_eq!(binner.frames_in(1, 100), 50..100);
        assert_eq!(binner.frames_in(2, 100), 100..100);
    }

    #[test]
    fn test_frames_in_agrees_with_interval_for_frame() {
        let binner = IntervalBinner::new(0.0, 10.0, 1.5, 29.97).unwrap();
        let frame_count = 300;
        for interval in 0..binner.len() {
            for frame in binner.frames_in(interval, frame_count) {
                assert_eq!(binner.interval_for_frame(frame), Some(interval));
            }
        }
    }
}
