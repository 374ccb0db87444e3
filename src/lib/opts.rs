#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use crate::{utils::built_info, validate::DEFAULT_EXPECTED_LANES};

pub static TOOL_NAME: &str = "lanemerge";

static SHORT_USAGE: &str = "Merges per-lane FASTQs into one FASTQ per sample per read.";

static LONG_USAGE: &str = "
Merges per-lane FASTQs into one FASTQ per sample per read.

Given an input directory containing .fastq.gz files produced by a multi-lane sequencer, merges
the files for each sample across all lanes and writes the merged files to the output directory.

Input FASTQs must be named `<SampleID>_<Lane>_<R1|R2>.fastq.gz`, e.g.
`BMH-2021-000837_L001_R2.fastq.gz`.  The sample ID is everything before the first `_`.  Lanes
are concatenated in numeric lane order.  The gzip data is copied as-is, producing a valid
multi-member gzip file.

Each sample must have exactly --lanes files for each of R1 and R2.  All samples are checked
before any merging starts, and every problem found is reported.

Merged FASTQs are written to the output directory as `<SampleID>_R1.fastq.gz` and
`<SampleID>_R2.fastq.gz`, along with a `merge_metrics.tsv` file.  Existing merged FASTQs are
never overwritten unless --overwrite is given.

Example invocation:

lanemerge \\
  --indir fastqs/ \\
  --outdir merged-fastqs/
";

#[derive(Parser, Debug, Clone)]
#[clap(
    name = TOOL_NAME,
    version = built_info::VERSION.as_str(),
    about = SHORT_USAGE,
    long_about = LONG_USAGE,
    term_width = 0
)]
pub struct Opts {
    /// Path to the directory containing the per-lane `*.fastq.gz` files.
    #[clap(long, short = 'i', display_order = 1)]
    pub indir: PathBuf,

    /// The directory to write merged FASTQs to, created if it does not exist.
    #[clap(long, short = 'o', display_order = 2)]
    pub outdir: PathBuf,

    /// The number of lane files expected for each sample for each of R1 and R2.
    #[clap(long, short = 'l', default_value_t = DEFAULT_EXPECTED_LANES, display_order = 11)]
    pub lanes: usize,

    /// Replace merged FASTQs that already exist in the output directory.
    #[clap(long, display_order = 11)]
    pub overwrite: bool,

    /// Group and validate the inputs, then log the merges that would be performed.
    ///
    /// Nothing is written.
    #[clap(long, display_order = 11)]
    pub dry_run: bool,

    /// Do not check that every input starts with the gzip magic bytes.
    #[clap(long, display_order = 21)]
    pub skip_gzip_check: bool,

    /// A prefix for the metrics file name.
    #[clap(long, display_order = 21)]
    pub metrics_prefix: Option<String>,

    /// Number of samples to merge at the same time.
    #[clap(long, short = 't', default_value = "1", display_order = 31)]
    pub threads: usize,
}

/// Implement defaults that match the CLI options to allow for easier testing.
///
/// Note that these defaults exist only within test code.
#[cfg(test)]
impl Default for Opts {
    fn default() -> Self {
        Self {
            indir: PathBuf::default(),
            outdir: PathBuf::default(),
            lanes: DEFAULT_EXPECTED_LANES,
            overwrite: false,
            dry_run: false,
            skip_gzip_check: false,
            metrics_prefix: None,
            threads: 1,
        }
    }
}

/// Parse args and set up logging / tracing
pub fn setup() -> Opts {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    Opts::parse()
}
