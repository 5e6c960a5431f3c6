//! Running one or several correction strategies over the same input.

use rayon::prelude::*;
use tracing::info;

use crate::config::CorrectionMethod;
use crate::correction::dist_diff::DistanceDiff;
use crate::correction::per_frame::PerFrameMatch;
use crate::correction::strategy::{Correction, CorrectionInput, CorrectionStrategy, Geometry};
use crate::error::Result;

/// The strategy behind a method name.
pub fn strategy_for(method: CorrectionMethod, threshold: f64) -> Box<dyn CorrectionStrategy> {
    match method {
        CorrectionMethod::BodyPartsPerFrame => Box::new(PerFrameMatch::new(Geometry::BodyParts)),
        CorrectionMethod::CentroidPerFrame => Box::new(PerFrameMatch::new(Geometry::Centroid)),
        CorrectionMethod::BodyPartsFrameDistDiff => {
            Box::new(DistanceDiff::new(Geometry::BodyParts, threshold))
        }
        CorrectionMethod::CentroidFrameDistDiff => {
            Box::new(DistanceDiff::new(Geometry::Centroid, threshold))
        }
    }
}

/// Run every method on `input` in parallel.
///
/// Results come back in the order of `methods`. Each strategy sees the
/// same uncorrected trajectory.
pub fn run_corrections(
    methods: &[CorrectionMethod],
    threshold: f64,
    input: &CorrectionInput<'_>,
) -> Result<Vec<Correction>> {
    let corrections = methods
        .par_iter()
        .map(|&method| strategy_for(method, threshold).correct(input))
        .collect::<Result<Vec<_>>>()?;

    for correction in &corrections {
        info!(
            method = %correction.method,
            corrections = correction.count(),
            changed_frames = correction.trajectory.differing_frames(input.trajectory),
            "identity correction summary"
        );
    }
    Ok(corrections)
}
