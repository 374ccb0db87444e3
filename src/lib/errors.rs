//! The errors that may occur while grouping, validating, and merging lane FASTQs.
use std::{fmt::Display, path::PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::input_fastq::ReadDirection;

/// The reason a read group failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ViolationKind {
    /// The group does not contain the expected number of lane files.
    LaneCount { actual: usize, expected: usize },
    /// Two or more files in the group share the same lane tag.
    DuplicateLane { lane_tag: String },
}

/// A single problem found with one direction of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupViolation {
    pub sample_id: String,
    pub direction: ReadDirection,
    pub kind: ViolationKind,
}

impl Display for GroupViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::LaneCount { actual, expected } => write!(
                f,
                "Sample {} has {} {} file(s), expected {}",
                self.sample_id, actual, self.direction, expected
            ),
            ViolationKind::DuplicateLane { lane_tag } => write!(
                f,
                "Sample {} has more than one {} file for lane '{}'",
                self.sample_id, self.direction, lane_tag
            ),
        }
    }
}

/// Lists a collection of items one per line, each indented.
fn bulleted<T: Display>(items: &[T]) -> String {
    items.iter().map(|i| format!("  - {}", i)).join("\n")
}

/// Lists paths one per line, each indented.
fn bulleted_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| format!("  - {}", p.to_string_lossy())).join("\n")
}

/// The error that may occur when merging lane FASTQs.
#[derive(Error, Debug)]
pub enum LaneMergeError {
    #[error("Input directory does not exist or is not a directory: {}", .0.to_string_lossy())]
    DirectoryNotFound(PathBuf),

    #[error("No *.fastq.gz files found in input directory: {}", .0.to_string_lossy())]
    NoInputFastqs(PathBuf),

    #[error("{} problem(s) found with the input lane FASTQs:\n{}", .0.len(), bulleted(.0))]
    Validation(Vec<GroupViolation>),

    #[error("Failed to read input {} for sample {sample_id}", .path.to_string_lossy())]
    ReadInput { sample_id: String, path: PathBuf, source: std::io::Error },

    #[error("Failed to write output {} for sample {sample_id}", .path.to_string_lossy())]
    WriteOutput { sample_id: String, path: PathBuf, source: std::io::Error },

    #[error(
        "Wrote {actual} bytes to {} for sample {sample_id}, but inputs total {expected} bytes",
        .path.to_string_lossy()
    )]
    ByteCountMismatch { sample_id: String, path: PathBuf, expected: u64, actual: u64 },

    #[error(
        "{} merged output(s) already exist, use --overwrite to replace them:\n{}",
        .0.len(),
        bulleted_paths(.0)
    )]
    OutputCollision(Vec<PathBuf>),
}
