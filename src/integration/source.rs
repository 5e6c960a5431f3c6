//! Traits for the providers of RFID events and pose keypoints.

use std::convert::Infallible;

use crate::error::Error;
use crate::fusion::{PoseRow, RfidEvent};

/// Anything that can produce the RFID event table of a recording.
///
/// Implement this to feed events from a file, a database or a live reader
/// log into [`FusionPipeline`](super::FusionPipeline).
///
/// # Example
///
/// ```ignore
/// use mpit_rs::{RfidEvent, RfidSource};
///
/// struct ReaderLog {
///     // Connection to the reader software
/// }
///
/// impl RfidSource for ReaderLog {
///     type Error = std::io::Error;
///
///     fn rfid_events(&mut self) -> Result<Vec<RfidEvent>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait RfidSource {
    /// Error type for read failures. Errors from foreign crates can be
    /// boxed into [`Error::Source`].
    type Error: Into<Error>;

    /// All events of the recording, in any order.
    fn rfid_events(&mut self) -> Result<Vec<RfidEvent>, Self::Error>;
}

/// Anything that can produce the long-format keypoint table of a recording.
pub trait PoseSource {
    /// Error type for read failures.
    type Error: Into<Error>;

    /// All keypoint rows, one per (frame, track, body part).
    fn pose_rows(&mut self) -> Result<Vec<PoseRow>, Self::Error>;
}

impl RfidSource for Vec<RfidEvent> {
    type Error = Infallible;

    fn rfid_events(&mut self) -> Result<Vec<RfidEvent>, Self::Error> {
        Ok(std::mem::take(self))
    }
}

impl PoseSource for Vec<PoseRow> {
    type Error = Infallible;

    fn pose_rows(&mut self) -> Result<Vec<PoseRow>, Self::Error> {
        Ok(std::mem::take(self))
    }
}
