//! Concatenation of lane FASTQs into one merged FASTQ per sample per read direction.
//!
//! Inputs are copied as opaque byte streams.  Concatenated gzip files form a valid multi-member
//! gzip file, so the compressed data is never decoded or re-encoded.
//!
//! Bytes are first written to a `.partial` file next to the final output, which is renamed into
//! place only after every input has been copied and the byte count checked.  A failed merge
//! removes its partial file, and partial files left by an interrupted run are removed by
//! [`remove_stale_partials`] before merging starts.  A sample is merged completely or not at
//! all: if one read direction fails, the outputs already written for the other are removed.
use std::{
    ffi::OsString,
    fs::{File, OpenOptions},
    io::{BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use gzp::BUFSIZE;
use itertools::Itertools;
use log::{debug, info, warn};
use strum::IntoEnumIterator;

use crate::{
    errors::LaneMergeError,
    input_fastq::ReadDirection,
    manifest::ReadGroup,
    utils::merged_path,
};

/// The suffix appended to an output file name while it is being written.
pub static PARTIAL_SUFFIX: &str = ".partial";

/// The result of merging one read direction of one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub sample_id: String,
    pub direction: ReadDirection,
    pub output: PathBuf,
    pub num_files: usize,
    /// The lane tags of the inputs, in the order they were concatenated.
    pub lanes: Vec<String>,
    pub total_bytes: u64,
}

/// The path that `output` is written to before being renamed into place.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name: OsString = output.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    output.with_file_name(name)
}

/// Remove the partial files an earlier, unfinished run left behind for `outputs`, returning the
/// number of files removed.  Other files in the output directory are never touched.
pub fn remove_stale_partials(outputs: &[PathBuf]) -> Result<usize> {
    let mut removed = 0;
    for output in outputs {
        let partial = partial_path(output);
        if partial.is_file() {
            warn!("Removing partial output from an earlier run: {}", partial.to_string_lossy());
            std::fs::remove_file(&partial)
                .with_context(|| format!("Failed to remove {}", partial.to_string_lossy()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Copy every byte of `input` to `writer`, returning the number of bytes copied.
///
/// Read and write failures are reported against the input and output respectively.
fn append<W: Write>(
    sample_id: &str,
    input: &Path,
    output: &Path,
    writer: &mut W,
    buffer: &mut [u8],
) -> Result<u64, LaneMergeError> {
    let read_error = |source| LaneMergeError::ReadInput {
        sample_id: sample_id.to_string(),
        path: input.to_path_buf(),
        source,
    };
    let mut reader = File::open(input).map_err(read_error)?;
    let mut copied: u64 = 0;
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e)),
        };
        writer.write_all(&buffer[..n]).map_err(|source| LaneMergeError::WriteOutput {
            sample_id: sample_id.to_string(),
            path: output.to_path_buf(),
            source,
        })?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Write the concatenation of `inputs` to `partial`, returning the number of bytes written.
fn write_partial(
    sample_id: &str,
    inputs: &[&Path],
    partial: &Path,
    expected_bytes: u64,
) -> Result<u64, LaneMergeError> {
    let write_error = |source| LaneMergeError::WriteOutput {
        sample_id: sample_id.to_string(),
        path: partial.to_path_buf(),
        source,
    };
    let file =
        OpenOptions::new().write(true).create_new(true).open(partial).map_err(write_error)?;
    let mut writer = BufWriter::with_capacity(BUFSIZE, file);
    let mut buffer = vec![0; BUFSIZE];

    let mut written: u64 = 0;
    for input in inputs {
        let copied = append(sample_id, input, partial, &mut writer, &mut buffer)?;
        debug!("Appended {} bytes from {}", copied, input.to_string_lossy());
        written += copied;
    }

    let file = writer.into_inner().map_err(|e| write_error(e.into_error()))?;
    file.sync_all().map_err(write_error)?;

    if written != expected_bytes {
        return Err(LaneMergeError::ByteCountMismatch {
            sample_id: sample_id.to_string(),
            path: partial.to_path_buf(),
            expected: expected_bytes,
            actual: written,
        });
    }
    Ok(written)
}

/// Concatenate `inputs`, in order, into `output`, returning the number of bytes written.
///
/// The output is replaced if it already exists; callers are responsible for refusing to
/// overwrite.  On failure no partial output is left behind.
///
/// # Errors
///
/// - [`LaneMergeError::ReadInput`] naming the input that could not be read
/// - [`LaneMergeError::WriteOutput`] if the output could not be written
/// - [`LaneMergeError::ByteCountMismatch`] if the output size differs from the sum of the inputs
pub fn concatenate(
    sample_id: &str,
    inputs: &[&Path],
    output: &Path,
) -> Result<u64, LaneMergeError> {
    let mut expected_bytes: u64 = 0;
    for input in inputs {
        let metadata = std::fs::metadata(input).map_err(|source| LaneMergeError::ReadInput {
            sample_id: sample_id.to_string(),
            path: input.to_path_buf(),
            source,
        })?;
        expected_bytes += metadata.len();
    }

    let partial = partial_path(output);
    let result = write_partial(sample_id, inputs, &partial, expected_bytes).and_then(|written| {
        std::fs::rename(&partial, output).map_err(|source| LaneMergeError::WriteOutput {
            sample_id: sample_id.to_string(),
            path: output.to_path_buf(),
            source,
        })?;
        Ok(written)
    });

    if result.is_err() && partial.exists() {
        if let Err(e) = std::fs::remove_file(&partial) {
            warn!("Failed to remove partial output {}: {}", partial.to_string_lossy(), e);
        }
    }
    result
}

/// Merge one read direction of a read group into `<output_dir>/<SampleID>_<R1|R2>.fastq.gz`.
pub fn merge_direction<P: AsRef<Path>>(
    group: &ReadGroup,
    direction: ReadDirection,
    output_dir: P,
) -> Result<MergeOutcome, LaneMergeError> {
    let output = merged_path(output_dir, &group.sample_id, direction);
    let reads = group.reads(direction);
    info!(
        "Concatenating {} into {}",
        reads.iter().map(|f| f.file_name()).join(","),
        output.to_string_lossy()
    );
    let total_bytes = concatenate(&group.sample_id, &group.paths(direction), &output)?;
    Ok(MergeOutcome {
        sample_id: group.sample_id.clone(),
        direction,
        output,
        num_files: reads.len(),
        lanes: reads.iter().map(|f| f.lane_tag.clone()).collect(),
        total_bytes,
    })
}

/// Merge both read directions of a read group, forward reads first.
///
/// If either direction fails, any output already completed for the sample is removed so that no
/// unpaired output is left behind.
pub fn merge_group<P: AsRef<Path>>(
    group: &ReadGroup,
    output_dir: P,
) -> Result<Vec<MergeOutcome>, LaneMergeError> {
    let mut outcomes = Vec::with_capacity(2);
    for direction in ReadDirection::iter() {
        match merge_direction(group, direction, output_dir.as_ref()) {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => {
                for outcome in outcomes {
                    warn!(
                        "Removing {} since sample {} failed to merge",
                        outcome.output.to_string_lossy(),
                        group.sample_id
                    );
                    if let Err(e) = std::fs::remove_file(&outcome.output) {
                        warn!("Failed to remove {}: {}", outcome.output.to_string_lossy(), e);
                    }
                }
                return Err(error);
            }
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod test {
    use std::{
        fs::File,
        io::Read,
        path::{Path, PathBuf},
    };

    use flate2::read::MultiGzDecoder;
    use matches::assert_matches;
    use seq_io::{fastq::Reader, BaseRecord};
    use tempfile::tempdir;

    use crate::{
        errors::LaneMergeError,
        input_fastq::{InputFastq, ReadDirection},
        manifest::MergeManifest,
        utils::{
            merged_path,
            test_commons::{lane_fastq_names, write_gzip_fastq, write_sample_lanes},
        },
    };

    use super::{concatenate, merge_group, partial_path, remove_stale_partials};

    fn write_plain(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/S1_R1.fastq.gz")),
            PathBuf::from("/out/S1_R1.fastq.gz.partial")
        );
    }

    #[test]
    fn test_concatenate_preserves_order_and_length() {
        let dir = tempdir().unwrap();
        let inputs = vec![
            write_plain(dir.path(), "a", b"<lane1>"),
            write_plain(dir.path(), "b", b"<lane2>xx"),
            write_plain(dir.path(), "c", b""),
            write_plain(dir.path(), "d", b"<lane4>"),
        ];
        let input_refs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
        let output = dir.path().join("out.fastq.gz");

        let written = concatenate("S1", &input_refs, &output).unwrap();
        assert_eq!(written, 23);
        assert_eq!(std::fs::read(&output).unwrap(), b"<lane1><lane2>xx<lane4>".to_vec());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_concatenate_large_inputs_span_many_buffers() {
        let dir = tempdir().unwrap();
        let big: Vec<u8> = (0..(3 * gzp::BUFSIZE + 17)).map(|i| (i % 251) as u8).collect();
        let inputs =
            vec![write_plain(dir.path(), "a", &big), write_plain(dir.path(), "b", b"tail")];
        let input_refs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
        let output = dir.path().join("out");

        let written = concatenate("S1", &input_refs, &output).unwrap();
        assert_eq!(written as usize, big.len() + 4);
        assert_eq!(std::fs::read(&output).unwrap(), [big, b"tail".to_vec()].concat());
    }

    #[test]
    fn test_concatenate_missing_input_names_path_and_cleans_up() {
        let dir = tempdir().unwrap();
        let present = write_plain(dir.path(), "a", b"data");
        let missing = dir.path().join("missing.fastq.gz");
        let output = dir.path().join("out.fastq.gz");

        let err = concatenate("S1", &[present.as_path(), missing.as_path()], &output).unwrap_err();
        assert_matches!(&err, LaneMergeError::ReadInput { path, .. } if path == &missing);
        assert!(err.to_string().contains("missing.fastq.gz"));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_concatenate_replaces_existing_output() {
        let dir = tempdir().unwrap();
        let input = write_plain(dir.path(), "a", b"new");
        let output = write_plain(dir.path(), "out", b"old contents");

        concatenate("S1", &[input.as_path()], &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"new".to_vec());
    }

    #[test]
    fn test_remove_stale_partials_only_removes_planned_outputs() {
        let dir = tempdir().unwrap();
        write_plain(dir.path(), "S1_R1.fastq.gz.partial", b"trunc");
        write_plain(dir.path(), "S1_R2.fastq.gz", b"complete");
        write_plain(dir.path(), "S9_R1.fastq.gz.partial", b"other sample");
        write_plain(dir.path(), "download.partial", b"unrelated");

        let outputs = vec![
            merged_path(dir.path(), "S1", ReadDirection::R1),
            merged_path(dir.path(), "S1", ReadDirection::R2),
        ];
        assert_eq!(remove_stale_partials(&outputs).unwrap(), 1);
        assert!(!dir.path().join("S1_R1.fastq.gz.partial").exists());
        assert!(dir.path().join("S1_R2.fastq.gz").exists());
        assert!(dir.path().join("S9_R1.fastq.gz.partial").exists());
        assert!(dir.path().join("download.partial").exists());
    }

    #[test]
    fn test_merge_group_failure_leaves_no_output_for_the_sample() {
        let input_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();
        write_sample_lanes(input_dir.path(), "S1", 2);
        let manifest = MergeManifest::from_dir(input_dir.path()).unwrap();

        // a reverse lane disappears after grouping, so R1 merges and R2 fails
        let missing = input_dir.path().join("S1_L002_R2.fastq.gz");
        std::fs::remove_file(&missing).unwrap();

        let err = merge_group(manifest.get("S1").unwrap(), output_dir.path()).unwrap_err();
        assert_matches!(&err, LaneMergeError::ReadInput { path, .. } if path == &missing);
        assert_eq!(std::fs::read_dir(output_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_merge_group_produces_readable_multi_member_gzip() {
        let input_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();
        let mut expected_bytes = 0;
        for name in lane_fastq_names("S1", 4) {
            let fq = InputFastq::new(&name).unwrap();
            let read_name = format!("{}_{}", fq.lane_tag, fq.direction.unwrap());
            let path = write_gzip_fastq(input_dir.path().join(&name), &[read_name.as_str()]);
            expected_bytes += std::fs::metadata(path).unwrap().len();
        }

        let manifest = MergeManifest::from_dir(input_dir.path()).unwrap();
        let outcomes = merge_group(manifest.get("S1").unwrap(), output_dir.path()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.iter().map(|o| o.total_bytes).sum::<u64>(), expected_bytes);

        for outcome in outcomes {
            assert_eq!(outcome.lanes, vec!["L001", "L002", "L003", "L004"]);
            let mut decoded = String::new();
            MultiGzDecoder::new(File::open(&outcome.output).unwrap())
                .read_to_string(&mut decoded)
                .unwrap();
            let names: Vec<String> = Reader::new(decoded.as_bytes())
                .records()
                .map(|r| String::from_utf8_lossy(r.unwrap().head()).to_string())
                .collect();
            let direction = outcome.direction;
            assert_eq!(
                names,
                ["L001", "L002", "L003", "L004"]
                    .iter()
                    .map(|lane| format!("{}_{}", lane, direction))
                    .collect::<Vec<_>>()
            );
            let expected_name = format!("S1_{}.fastq.gz", direction);
            assert!(outcome.output.ends_with(expected_name));
        }
    }
}
