//! Repair of identity swaps inside an interval.
//!
//! Interval matching fixes identities only once per interval; the
//! strategies here look at individual frames and exchange tags between
//! tracks where the pose data says the animals swapped.

mod dist_diff;
mod per_frame;
mod runner;
mod strategy;

pub use dist_diff::DistanceDiff;
pub use per_frame::PerFrameMatch;
pub use runner::{run_corrections, strategy_for};
pub use strategy::{
    Correction, CorrectionEvent, CorrectionInput, CorrectionStrategy, Footprint, Geometry,
    transpositions,
};
