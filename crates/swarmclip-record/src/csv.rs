//! CSV sinks for the feature stream and the raw metadata table.
//!
//! All formatting goes through Rust's `Display`, so decimals always use `.`
//! regardless of locale.

use crate::RecordError;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;
use swarmclip_core::features::{self, FeatureRow};
use swarmclip_core::Frame;

/// Header of the per-session feature CSV.
pub const DATA_HEADER: &str = "frame,id,x,y,DirectionChange,AccelerationChange,distance_centroid,bouncesOffWall,cohesion,separation,alignement,DominantParameter";

/// Header of the metadata CSV.
///
/// `avoidColiisionY` is misspelled on purpose: downstream tooling keys on the
/// historical header bytes.
pub const METADATA_HEADER: &str =
    "frame,id,x,y,frictionX,frictionY,frictionZ,avoidCollisionX,avoidColiisionY,avoidCollisionZ";

/// Create or truncate the data CSV and write its header row.
pub(crate) fn write_data_header(path: &Path) -> Result<(), RecordError> {
    fs::write(path, format!("{DATA_HEADER}\n")).map_err(|source| RecordError::io(path, source))
}

/// Append one sampled frame's feature rows to an existing data CSV.
///
/// The rows are formatted into a single block first so a frame lands in one
/// write call.
pub(crate) fn append_feature_rows(path: &Path, rows: &[FeatureRow]) -> Result<(), RecordError> {
    let mut block = String::new();
    for row in rows {
        // Writing into a String cannot fail.
        let _ = writeln!(block, "{row}");
    }
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| RecordError::io(path, source))?;
    file.write_all(block.as_bytes())
        .map_err(|source| RecordError::io(path, source))
}

/// Write the whole-clip metadata table in one shot.
pub(crate) fn write_metadata(path: &Path, frames: &[Frame]) -> Result<(), RecordError> {
    let mut out = String::new();
    let _ = writeln!(out, "{METADATA_HEADER}");
    for row in features::metadata_rows(frames) {
        let _ = writeln!(out, "{row}");
    }
    fs::write(path, out).map_err(|source| RecordError::io(path, source))
}
