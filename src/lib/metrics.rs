//! Metrics describing each merged output, written to a tab-separated file in the output directory.
use std::path::{Path, PathBuf};

use anyhow::Result;
use fgoxide::io::DelimFile;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::merger::MergeOutcome;

/// The file name the merge metrics are written to, after any prefix.
pub static MERGE_METRICS_FILENAME: &str = "merge_metrics.tsv";

/// The metrics for one merged output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMetric {
    /// The sample ID shared by all inputs.
    pub sample_id: String,
    /// The read direction, `R1` or `R2`.
    pub read: String,
    /// The number of input lane files concatenated.
    pub num_files: usize,
    /// The lane tags of the inputs, comma separated, in concatenation order.
    pub lanes: String,
    /// The size of the merged output in bytes.
    pub total_bytes: u64,
    /// The path of the merged output.
    pub output: String,
}

impl From<&MergeOutcome> for MergeMetric {
    fn from(outcome: &MergeOutcome) -> Self {
        Self {
            sample_id: outcome.sample_id.clone(),
            read: outcome.direction.to_string(),
            num_files: outcome.num_files,
            lanes: outcome.lanes.join(","),
            total_bytes: outcome.total_bytes,
            output: outcome.output.to_string_lossy().to_string(),
        }
    }
}

/// Write one metric row per outcome, ordered by sample ID then read direction, returning the path
/// written.
pub fn write_merge_metrics<P: AsRef<Path>>(
    outcomes: &[MergeOutcome],
    output_dir: P,
    prefix: &str,
) -> Result<PathBuf> {
    let filename = [prefix.to_string(), MERGE_METRICS_FILENAME.to_string()].concat();
    let output_path = output_dir.as_ref().join(filename);
    let delim = DelimFile::default();
    delim.write_tsv(
        &output_path,
        outcomes
            .iter()
            .sorted_by(|a, b| (&a.sample_id, a.direction).cmp(&(&b.sample_id, b.direction)))
            .map(MergeMetric::from),
    )?;
    Ok(output_path)
}
