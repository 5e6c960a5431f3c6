//! Integration module for connecting RFID and pose data providers with the
//! fusion pipeline.
//!
//! This module provides source traits, row builders, the end-to-end
//! [`FusionPipeline`] and the CSV/TOML file adapter used by the `mpit` CLI.

mod builder;
pub mod csv_io;
mod pipeline;
mod source;

pub use builder::{PoseRowBuilder, RfidEventBuilder};
pub use csv_io::{CsvPoseSource, CsvRfidSource, InputDir, OutputFile};
pub use pipeline::{FusionPipeline, PipelineOutput, RunSummary};
pub use source::{PoseSource, RfidSource};
