//! Classification of per-lane FASTQ files by the information in their file names.
//!
//! Input FASTQs are expected to be named `<SampleID>_<LaneTag>_<R1|R2>.fastq.gz`, for example
//! `BMH-2021-000837_L001_R2.fastq.gz`.  The sample ID is everything before the first `_`.
use std::{
    cmp::Ordering,
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use strum::EnumIter;

/// The suffix shared by all input FASTQs.
pub static INPUT_FASTQ_SUFFIX: &str = ".fastq.gz";

/// The separator between the sample ID and the rest of the file name.
pub const SAMPLE_ID_SEPARATOR: char = '_';

lazy_static! {
    /// The last run of digits in a lane tag, e.g. `001` in `L001`.
    static ref LANE_NUMBER_REGEX: Regex = Regex::new(r"(\d+)\D*$").unwrap();
}

/// The direction of a read in paired-end sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum ReadDirection {
    /// Forward reads.
    R1,
    /// Reverse reads.
    R2,
}

impl ReadDirection {
    /// The tag used for this direction in file names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::R1 => "R1",
            Self::R2 => "R2",
        }
    }

    /// Determine the direction from the end of a file name with the FASTQ suffix removed.
    fn from_name_end(name: &str) -> Option<Self> {
        if name.ends_with(Self::R1.tag()) {
            Some(Self::R1)
        } else if name.ends_with(Self::R2.tag()) {
            Some(Self::R2)
        } else {
            None
        }
    }
}

impl Display for ReadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Contains information about an input FASTQ that has been inferred from the file name.
#[derive(Debug, Clone)]
pub struct InputFastq {
    pub path: PathBuf,
    pub sample_id: String,
    /// The text between the sample ID and the read direction, e.g. `L001`.
    pub lane_tag: String,
    /// The last number found in the lane tag, used to order lanes numerically.
    pub lane_number: Option<usize>,
    /// `None` when the file name does not end in `R1.fastq.gz` or `R2.fastq.gz`.
    pub direction: Option<ReadDirection>,
}

impl InputFastq {
    /// Create a new `InputFastq` inferring information from the file name.
    ///
    /// Returns `None` if the file name is not valid UTF-8, does not end with
    /// [`INPUT_FASTQ_SUFFIX`], or has an empty sample ID.
    pub fn new<P: AsRef<Path>>(path: P) -> Option<InputFastq> {
        let file_name = path.as_ref().file_name()?.to_str()?;
        let stem = file_name.strip_suffix(INPUT_FASTQ_SUFFIX)?;

        let sample_id = stem.split(SAMPLE_ID_SEPARATOR).next().unwrap_or_default();
        if sample_id.is_empty() {
            return None;
        }

        // The read direction must come after the sample ID, never be part of it.
        let remainder = &stem[sample_id.len()..];
        let direction = ReadDirection::from_name_end(remainder);
        let lane_tag = match direction {
            Some(d) => &remainder[..remainder.len() - d.tag().len()],
            None => remainder,
        }
        .trim_matches(SAMPLE_ID_SEPARATOR)
        .to_string();

        let lane_number = LANE_NUMBER_REGEX
            .captures(&lane_tag)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok());

        Some(InputFastq {
            path: path.as_ref().to_path_buf(),
            sample_id: sample_id.to_string(),
            lane_tag,
            lane_number,
            direction,
        })
    }

    /// Identifies all FASTQs directly within the given directory that end with
    /// [`INPUT_FASTQ_SUFFIX`].  The FASTQs are returned in sorted order.
    pub fn slurp<P: AsRef<Path>>(dir: P) -> Result<Vec<InputFastq>> {
        let dir = dir.as_ref();
        let mut fastqs = vec![];
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list directory {}", dir.to_string_lossy()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list directory {}", dir.to_string_lossy()))?
                .path();
            let matches_suffix = path
                .file_name()
                .map_or(false, |n| n.to_string_lossy().ends_with(INPUT_FASTQ_SUFFIX));
            if !path.is_file() || !matches_suffix {
                continue;
            }
            match InputFastq::new(&path) {
                Some(fastq) => {
                    debug!(
                        "Found {} (sample: {}, lane: {}, read: {})",
                        path.to_string_lossy(),
                        fastq.sample_id,
                        fastq.lane_tag,
                        fastq.direction.map_or("unknown", ReadDirection::tag)
                    );
                    fastqs.push(fastq);
                }
                None => warn!("Skipping FASTQ with unusable file name: {}", path.to_string_lossy()),
            }
        }
        fastqs.sort();
        Ok(fastqs)
    }

    /// The file name, for logging.
    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    }
}

impl Ord for InputFastq {
    /// Defines an ordering based on:
    /// 1. The sample ID
    /// 2. The read direction
    /// 3. The lane number, with numbered lanes before un-numbered ones
    /// 4. The lane tag
    /// 5. The path
    ///
    /// Ordering lanes numerically means the merge order never depends on directory listing order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.sample_id
            .cmp(&other.sample_id)
            .then_with(|| self.direction.cmp(&other.direction))
            .then_with(|| {
                let lane = |f: &Self| (f.lane_number.is_none(), f.lane_number);
                lane(self).cmp(&lane(other))
            })
            .then_with(|| self.lane_tag.cmp(&other.lane_tag))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for InputFastq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for InputFastq {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for InputFastq {}
