//! Reading a recording directory and writing the result tables.
//!
//! Inputs are `rfid.csv`, `poses.csv`, `readers.toml` and `recording.toml`.
//! Outputs are rendered to memory first and only then written, so a failed
//! run leaves no partial output behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RecordingInfo;
use crate::error::{Error, Result};
use crate::fusion::{Point, PoseRow, ReaderCalibration, RfidEvent, TagId, TrackId};

use super::pipeline::PipelineOutput;
use super::source::{PoseSource, RfidSource};

pub const RFID_FILE: &str = "rfid.csv";
pub const POSES_FILE: &str = "poses.csv";
pub const READERS_FILE: &str = "readers.toml";
pub const RECORDING_FILE: &str = "recording.toml";

#[derive(Debug, Deserialize)]
struct ReaderEntry {
    name: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ReaderFile {
    readers: Vec<ReaderEntry>,
}

/// A `poses.csv` row; empty cells mark an undetected keypoint.
#[derive(Debug, Deserialize)]
struct PoseRecord {
    frame_index: usize,
    track_id: TrackId,
    body_part: String,
    x: Option<f64>,
    y: Option<f64>,
    likelihood: Option<f64>,
}

impl From<PoseRecord> for PoseRow {
    fn from(record: PoseRecord) -> Self {
        PoseRow {
            frame_index: record.frame_index,
            track_id: record.track_id,
            body_part: record.body_part,
            x: record.x.unwrap_or(f64::NAN),
            y: record.y.unwrap_or(f64::NAN),
            likelihood: record.likelihood.unwrap_or(0.0),
        }
    }
}

pub fn read_rfid_events<R: io::Read>(reader: R) -> Result<Vec<RfidEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let events = reader
        .deserialize()
        .collect::<std::result::Result<Vec<RfidEvent>, _>>()?;
    Ok(events)
}

pub fn read_pose_rows<R: io::Read>(reader: R) -> Result<Vec<PoseRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.deserialize::<PoseRecord>() {
        rows.push(record?.into());
    }
    Ok(rows)
}

/// Parse `readers.toml`: an ordered `[[readers]]` list of `name`, `x`, `y`.
///
/// The usual two-row cage has eight antennas named `R1.1` to `R1.4` and
/// `R2.1` to `R2.4`; any unique names work.
pub fn parse_reader_calibration(content: &str) -> Result<ReaderCalibration> {
    let file: ReaderFile = toml::from_str(content)?;
    ReaderCalibration::from_ordered(
        file.readers.iter().map(|r| r.name.as_str()),
        file.readers.iter().map(|r| Point::new(r.x, r.y)),
    )
}

pub fn load_reader_calibration<P: AsRef<Path>>(path: P) -> Result<ReaderCalibration> {
    parse_reader_calibration(&fs::read_to_string(path)?)
}

/// RFID events from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvRfidSource {
    path: PathBuf,
}

impl CsvRfidSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RfidSource for CsvRfidSource {
    type Error = Error;

    fn rfid_events(&mut self) -> Result<Vec<RfidEvent>> {
        read_rfid_events(fs::File::open(&self.path)?)
    }
}

/// Pose keypoints from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvPoseSource {
    path: PathBuf,
}

impl CsvPoseSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PoseSource for CsvPoseSource {
    type Error = Error;

    fn pose_rows(&mut self) -> Result<Vec<PoseRow>> {
        read_pose_rows(fs::File::open(&self.path)?)
    }
}

/// The metadata files of a recording directory plus its two table sources.
#[derive(Debug, Clone)]
pub struct InputDir {
    pub recording: RecordingInfo,
    pub calibration: ReaderCalibration,
    pub rfid: CsvRfidSource,
    pub poses: CsvPoseSource,
}

impl InputDir {
    /// Load the metadata of `dir`. The tables are read when the sources are
    /// pulled.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let recording = RecordingInfo::load(dir.join(RECORDING_FILE))?;
        let calibration = load_reader_calibration(dir.join(READERS_FILE))?;
        debug!(
            dir = %dir.display(),
            readers = calibration.len(),
            frames = recording.frame_count,
            "input directory opened"
        );
        Ok(Self {
            recording,
            calibration,
            rfid: CsvRfidSource::new(dir.join(RFID_FILE)),
            poses: CsvPoseSource::new(dir.join(POSES_FILE)),
        })
    }
}

#[derive(Serialize)]
struct EstimateRecord<'a> {
    interval_index: usize,
    start_time: f64,
    end_time: f64,
    tag_id: &'a TagId,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Serialize)]
struct CentroidRecord<'a> {
    frame_index: usize,
    track_id: &'a TrackId,
    tag_id: Option<&'a TagId>,
    x: f64,
    y: f64,
}

/// A rendered output file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub name: String,
    pub contents: Vec<u8>,
}

fn csv_bytes<T, I>(records: I) -> Result<Vec<u8>>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Render every result table of a run.
pub fn render_outputs(output: &PipelineOutput) -> Result<Vec<OutputFile>> {
    let trajectory = &output.identity.trajectory;
    let mut files = vec![OutputFile {
        name: "matched_without_correction.csv".to_string(),
        contents: csv_bytes(trajectory.relabel(&output.table))?,
    }];

    for correction in &output.corrections {
        files.push(OutputFile {
            name: format!("matched_with_ID_{}.csv", correction.method),
            contents: csv_bytes(correction.trajectory.relabel(&output.table))?,
        });
    }

    let estimates = output.binner.intervals().iter().flat_map(|interval| {
        output.estimates.tags().iter().map(|tag| {
            let position = output.estimates.position(interval.index, tag);
            EstimateRecord {
                interval_index: interval.index,
                start_time: interval.start_time,
                end_time: interval.end_time,
                tag_id: tag,
                x: position.map(|p| p.x),
                y: position.map(|p| p.y),
            }
        })
    });
    files.push(OutputFile {
        name: "rfid_estimates.csv".to_string(),
        contents: csv_bytes(estimates)?,
    });

    let centroids = output.poses.centroids();
    files.push(OutputFile {
        name: "centroids.csv".to_string(),
        contents: csv_bytes(centroids.iter().map(|c| CentroidRecord {
            frame_index: c.frame_index,
            track_id: &c.track_id,
            tag_id: trajectory.tag_of(c.frame_index, &c.track_id),
            x: c.position.x,
            y: c.position.y,
        }))?,
    });

    files.push(OutputFile {
        name: "corrections.csv".to_string(),
        contents: csv_bytes(output.corrections.iter().flat_map(|c| &c.events))?,
    });

    files.push(OutputFile {
        name: "summary.json".to_string(),
        contents: serde_json::to_vec_pretty(&output.summary())?,
    });
    Ok(files)
}

/// Write rendered files into `dir`, creating it if needed.
///
/// Files are staged under a temporary name and renamed once all of them are
/// on disk. On failure everything staged or renamed is removed again.
pub fn write_outputs<P: AsRef<Path>>(dir: P, files: &[OutputFile]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let partial = dir.join(format!(".{}.partial", file.name));
        if let Err(err) = fs::write(&partial, &file.contents) {
            staged.push(partial);
            discard(&staged);
            return Err(err.into());
        }
        staged.push(partial);
    }

    let mut written = Vec::with_capacity(files.len());
    for (file, partial) in files.iter().zip(&staged) {
        let path = dir.join(&file.name);
        if let Err(err) = fs::rename(partial, &path) {
            discard(&written);
            discard(&staged);
            return Err(err.into());
        }
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "outputs written");
    Ok(written)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), %err, "could not remove partial output"),
        }
    }
}
