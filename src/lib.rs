//! Identity matching of multi-animal pose tracks against RFID detections.
//!
//! Pose estimation yields anonymous tracks (`ind1`, `ind2`, ...) that may
//! exchange identities when animals cross. RFID readers at known positions
//! identify the animals but only tell roughly where they are. This crate
//! bins both streams into fixed time intervals, pairs tags with tracks by
//! minimum-distance assignment, and then repairs identity swaps inside
//! each interval with one of four frame-level strategies.
//!
//! ```ignore
//! use mpit_rs::{FusionPipeline, PipelineConfig};
//! use mpit_rs::integration::InputDir;
//!
//! let mut input = InputDir::open("recording/")?;
//! let pipeline = FusionPipeline::new(PipelineConfig::default())?;
//! let output = pipeline.run_from_sources(
//!     &input.recording,
//!     &input.calibration,
//!     &mut input.rfid,
//!     &mut input.poses,
//! )?;
//! println!("{:?}", output.summary());
//! ```

pub mod config;
pub mod correction;
pub mod error;
pub mod fusion;
pub mod integration;

pub use config::{
    CorrectionMethod, MethodSelection, MismatchPolicy, PipelineConfig, RecordingInfo,
    RfidWeighting,
};
pub use correction::{Correction, CorrectionEvent, CorrectionInput, CorrectionStrategy};
pub use error::{Error, Result};
pub use fusion::{
    IdentityMatcher, IntervalBinner, MatchedTrajectory, PoseAggregator, PoseRow, PoseTable,
    ReaderCalibration, RfidAggregator, RfidEvent, TagId, TrackId,
};
pub use integration::{FusionPipeline, PipelineOutput, PoseSource, RfidSource};
