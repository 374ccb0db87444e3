//! Utility functions.
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use core::fmt::Display;
use gzp::GzpError;
use path_absolutize::Absolutize;

use crate::input_fastq::{ReadDirection, INPUT_FASTQ_SUFFIX};

pub mod built_info {
    use lazy_static::lazy_static;
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    /// Get a software version string including
    ///   - Git commit hash
    ///   - Git dirty info (whether the repo had uncommitted changes)
    ///   - Cargo package version if no git info found
    fn get_software_version() -> String {
        let prefix = if let Some(s) = GIT_COMMIT_HASH {
            format!("{}-{}", PKG_VERSION, s[0..8].to_owned())
        } else {
            // Not built from a git checkout
            PKG_VERSION.to_string()
        };
        let suffix = match GIT_DIRTY {
            Some(true) => "-dirty",
            _ => "",
        };
        format!("{}{}", prefix, suffix)
    }

    lazy_static! {
        /// Version of the software with git hash
        pub static ref VERSION: String = get_software_version();
    }
}

/// The two bytes every gzip member starts with.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Determine the merged output file name for the given sample and read direction.
pub fn merged_filename(sample_id: &str, direction: ReadDirection) -> String {
    format!("{}_{}{}", sample_id, direction, INPUT_FASTQ_SUFFIX)
}

/// Determine the merged output path for the given sample and read direction.
pub fn merged_path<P: AsRef<Path>>(
    output_dir: P,
    sample_id: &str,
    direction: ReadDirection,
) -> PathBuf {
    output_dir.as_ref().join(merged_filename(sample_id, direction))
}

/// Absolute form of a path for logging, falling back to the path as given.
pub fn display_path<P: AsRef<Path>>(path: P) -> String {
    match path.as_ref().absolutize() {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => path.as_ref().to_string_lossy().to_string(),
    }
}

/// Checks that the file starts with the gzip magic bytes.
pub fn check_gzip(file: &Path) -> Result<(), anyhow::Error> {
    let mut reader = match File::open(file) {
        Ok(f) => f,
        Err(error) => {
            return Err(error).with_context(|| format!("Failed to open {}", file.to_string_lossy()))
        }
    };
    let mut bytes = [0; 2];
    match reader.read_exact(&mut bytes) {
        Err(error) => {
            // not enough bytes read
            let message = format!(
                "Error reading from: {}\nIs it empty or truncated?",
                file.to_string_lossy()
            );
            Err(anyhow!(message).context(error))
        }
        Ok(()) if bytes == GZIP_MAGIC => Ok(()),
        Ok(()) => report_gzip_error(file, GzpError::InvalidHeader("Header not in GZIP format")),
    }
}

/// Creates an error message when the file does not look like a gzip file.
fn report_gzip_error<C>(file: &Path, context: C) -> Result<(), anyhow::Error>
where
    C: Display + Send + Sync + 'static,
{
    let filename = file.to_string_lossy();
    let message = format!(
        "
Error reading from: {}

The input must be gzip compressed (including BGZF).

To compress an uncompressed FASTQ file:
  `gzip {}`

To merge the inputs without this check, use --skip-gzip-check.
",
        filename, filename,
    );
    Err(anyhow!(message).context(context))
}
