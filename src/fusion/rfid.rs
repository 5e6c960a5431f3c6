//! RFID events, reader calibration, and per-interval tag position estimates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RfidWeighting;
use crate::error::{Error, Result};
use crate::fusion::ids::{ReaderId, TagId};
use crate::fusion::interval::IntervalBinner;
use crate::fusion::point::{Point, weighted_mean};

/// A single antenna detection of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidEvent {
    pub tag_id: TagId,
    pub reader_id: ReaderId,
    /// Absolute time of the detection, in seconds.
    pub timestamp: f64,
    /// Dwell time of the tag over the antenna, in seconds.
    pub duration: f64,
}

impl RfidEvent {
    pub fn new(
        tag_id: impl Into<TagId>,
        reader_id: impl Into<ReaderId>,
        timestamp: f64,
        duration: f64,
    ) -> Self {
        Self {
            tag_id: tag_id.into(),
            reader_id: reader_id.into(),
            timestamp,
            duration,
        }
    }
}

/// Pixel position of every RFID reader, in calibration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderCalibration {
    readers: Vec<(ReaderId, Point)>,
}

impl ReaderCalibration {
    /// Pair reader names with the positions annotated for them, in order.
    pub fn from_ordered<N, I>(names: N, positions: I) -> Result<Self>
    where
        N: IntoIterator,
        N::Item: Into<ReaderId>,
        I: IntoIterator<Item = Point>,
    {
        let names: Vec<ReaderId> = names.into_iter().map(Into::into).collect();
        let positions: Vec<Point> = positions.into_iter().collect();
        if names.len() != positions.len() {
            return Err(Error::configuration(format!(
                "calibration has {} reader names but {} positions",
                names.len(),
                positions.len()
            )));
        }
        let mut calibration = Self::default();
        for (name, position) in names.into_iter().zip(positions) {
            calibration.insert(name, position)?;
        }
        Ok(calibration)
    }

    pub fn insert(&mut self, reader: ReaderId, position: Point) -> Result<()> {
        if self.readers.iter().any(|(r, _)| *r == reader) {
            return Err(Error::configuration(format!(
                "reader `{reader}` is calibrated twice"
            )));
        }
        if !(position.x.is_finite() && position.y.is_finite()) {
            return Err(Error::configuration(format!(
                "reader `{reader}` has a non-finite position"
            )));
        }
        self.readers.push((reader, position));
        Ok(())
    }

    pub fn position(&self, reader: &ReaderId) -> Option<&Point> {
        self.readers
            .iter()
            .find(|(r, _)| r == reader)
            .map(|(_, p)| p)
    }

    pub fn readers(&self) -> impl Iterator<Item = (&ReaderId, &Point)> {
        self.readers.iter().map(|(r, p)| (r, p))
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

/// Estimated position of one tag in one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfidPositionEstimate {
    pub tag_id: TagId,
    pub interval_index: usize,
    /// `None` when the tag had no event in the interval.
    pub position: Option<Point>,
}

/// All tag position estimates of a run.
#[derive(Debug, Clone, Default)]
pub struct RfidEstimates {
    tags: Vec<TagId>,
    per_interval: Vec<BTreeMap<TagId, Point>>,
}

impl RfidEstimates {
    /// Every tag seen in the RFID table, sorted.
    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    pub fn interval_count(&self) -> usize {
        self.per_interval.len()
    }

    pub fn position(&self, interval: usize, tag: &TagId) -> Option<&Point> {
        self.per_interval.get(interval)?.get(tag)
    }

    /// Tags with a position estimate in `interval`.
    pub fn available(&self, interval: usize) -> impl Iterator<Item = (&TagId, &Point)> {
        self.per_interval.get(interval).into_iter().flatten()
    }

    /// One estimate per known tag for `interval`, absent ones included.
    pub fn estimates(&self, interval: usize) -> Vec<RfidPositionEstimate> {
        self.tags
            .iter()
            .map(|tag| RfidPositionEstimate {
                tag_id: tag.clone(),
                interval_index: interval,
                position: self.position(interval, tag).copied(),
            })
            .collect()
    }

    /// Latest estimate of `tag` at or before `interval`.
    pub fn carried_position(&self, interval: usize, tag: &TagId) -> Option<&Point> {
        let last = interval.min(self.per_interval.len().checked_sub(1)?);
        (0..=last).rev().find_map(|i| self.per_interval[i].get(tag))
    }
}

/// Reduces RFID events to one position per tag and interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct RfidAggregator {
    weighting: RfidWeighting,
}

impl RfidAggregator {
    pub fn new(weighting: RfidWeighting) -> Self {
        Self { weighting }
    }

    pub fn aggregate(
        &self,
        binner: &IntervalBinner,
        calibration: &ReaderCalibration,
        events: &[RfidEvent],
    ) -> Result<RfidEstimates> {
        for event in events {
            if calibration.position(&event.reader_id).is_none() {
                return Err(Error::configuration(format!(
                    "reader `{}` of tag `{}` is not in the calibration table",
                    event.reader_id, event.tag_id
                )));
            }
        }

        let tags: BTreeSet<TagId> = events.iter().map(|e| e.tag_id.clone()).collect();
        let per_interval = binner
            .bin_events(events)
            .into_iter()
            .map(|bin| self.reduce_interval(calibration, &bin))
            .collect::<Vec<_>>();

        debug!(
            tags = tags.len(),
            intervals = per_interval.len(),
            "aggregated RFID events"
        );

        Ok(RfidEstimates {
            tags: tags.into_iter().collect(),
            per_interval,
        })
    }

    fn reduce_interval(
        &self,
        calibration: &ReaderCalibration,
        events: &[&RfidEvent],
    ) -> BTreeMap<TagId, Point> {
        let mut by_tag: BTreeMap<&TagId, Vec<&RfidEvent>> = BTreeMap::new();
        for &event in events {
            by_tag.entry(&event.tag_id).or_default().push(event);
        }

        by_tag
            .into_iter()
            .filter_map(|(tag, tag_events)| {
                self.reduce_tag(calibration, &tag_events)
                    .map(|p| (tag.clone(), p))
            })
            .collect()
    }

    fn reduce_tag(&self, calibration: &ReaderCalibration, events: &[&RfidEvent]) -> Option<Point> {
        let located = events
            .iter()
            .filter_map(|e| calibration.position(&e.reader_id).map(|p| (p, *e)));

        match self.weighting {
            RfidWeighting::EventCount => weighted_mean(located.map(|(p, _)| (p, 1.0))),
            RfidWeighting::Duration => {
                let weighted: Vec<(&Point, f64)> = located
                    .map(|(p, e)| (p, e.duration.max(0.0)))
                    .collect();
                weighted_mean(weighted.iter().copied())
                    .or_else(|| weighted_mean(weighted.iter().map(|(p, _)| (*p, 1.0))))
            }
        }
    }
}
