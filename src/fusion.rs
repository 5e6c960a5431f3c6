//! Sensor fusion of RFID detections with anonymous pose tracks.
//!
//! Intervals are built by [`IntervalBinner`], RFID events are reduced to one
//! position per tag and interval by [`RfidAggregator`], keypoints to centroids
//! by [`PoseAggregator`], and [`IdentityMatcher`] pairs the two per interval.

mod identity;
mod ids;
mod interval;
mod matching;
mod point;
mod pose;
mod rfid;
mod trajectory;

pub use identity::{
    CountMismatch, IdentityAssignment, IdentityMatch, IdentityMatcher, MatchReport, MatcherConfig,
    representative_positions,
};
pub use ids::{ReaderId, TagId, TrackId};
pub use interval::{IntervalBinner, TimeInterval};
pub use matching::{AssignmentResult, linear_assignment};
pub use point::{Point, distance, distance_matrix, mean_point, weighted_mean};
pub use pose::{
    AggregatedPoses, Keypoint, PoseAggregator, PoseCentroid, PoseFrame, PoseRow, PoseTable,
    TrackObservation,
};
pub use rfid::{ReaderCalibration, RfidAggregator, RfidEstimates, RfidEvent, RfidPositionEstimate};
pub use trajectory::{IdentifiedPoseRow, MatchedTrajectory};
