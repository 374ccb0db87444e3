use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;
use strum::IntoEnumIterator;

use crate::{
    errors::LaneMergeError,
    input_fastq::ReadDirection,
    manifest::{MergeManifest, ReadGroup},
    merger::{merge_group, remove_stale_partials, MergeOutcome},
    metrics::write_merge_metrics,
    opts::{Opts, TOOL_NAME},
    utils::{built_info, check_gzip, display_path, merged_path},
    validate::validate_manifest,
};

/// Every merged output the manifest will write to `output_dir`, in sample and read order.
pub fn planned_outputs<P: AsRef<Path>>(manifest: &MergeManifest, output_dir: P) -> Vec<PathBuf> {
    let output_dir = output_dir.as_ref();
    manifest
        .groups()
        .flat_map(|group| {
            ReadDirection::iter()
                .map(move |direction| merged_path(output_dir, &group.sample_id, direction))
        })
        .collect()
}

/// Collect every merged output for the manifest that already exists in `output_dir`.
///
/// # Errors
///
/// - [`LaneMergeError::OutputCollision`] listing all existing outputs
pub fn check_output_collisions<P: AsRef<Path>>(
    manifest: &MergeManifest,
    output_dir: P,
) -> Result<(), LaneMergeError> {
    let existing: Vec<PathBuf> =
        planned_outputs(manifest, output_dir).into_iter().filter(|path| path.exists()).collect();
    if existing.is_empty() {
        Ok(())
    } else {
        Err(LaneMergeError::OutputCollision(existing))
    }
}

/// Merge every read group into `output_dir` on a pool of `threads` threads.
///
/// Stops at the first sample that fails.  Samples merged before the failure keep their outputs,
/// and the failed sample has none.
pub fn merge_samples<P: AsRef<Path> + Sync>(
    manifest: &MergeManifest,
    output_dir: P,
    threads: usize,
) -> Result<Vec<MergeOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to create the merge thread pool")?;
    let groups: Vec<&ReadGroup> = manifest.groups().collect();
    let merged: Result<Vec<Vec<MergeOutcome>>, LaneMergeError> = pool.install(|| {
        groups.par_iter().map(|group| merge_group(group, output_dir.as_ref())).collect()
    });
    Ok(merged?.into_iter().flatten().collect())
}

/// Log the merges that would be performed for the manifest.
fn log_merge_plan<P: AsRef<Path>>(manifest: &MergeManifest, output_dir: P) {
    for group in manifest.groups() {
        for direction in ReadDirection::iter() {
            info!(
                "Would concatenate {} into {}",
                group.reads(direction).iter().map(|f| f.file_name()).join(","),
                merged_path(output_dir.as_ref(), &group.sample_id, direction).to_string_lossy()
            );
        }
    }
}

/// Run lane merging, returning the outcome of every merged output.
///
/// The whole run stops at the first sample that fails to merge.  Samples that were already merged
/// are kept, and the failed sample leaves no partial output behind.
pub fn run(opts: Opts) -> Result<Vec<MergeOutcome>> {
    info!("Running {} version {}", TOOL_NAME, built_info::VERSION.as_str());

    // Preflight checks
    ensure!(opts.lanes > 0, "The expected number of lanes must be at least one");
    ensure!(opts.threads > 0, "The number of threads must be at least one");

    info!("Grouping FASTQs in {}", display_path(&opts.indir));
    let manifest = MergeManifest::from_dir(&opts.indir)?;
    validate_manifest(&manifest, opts.lanes)?;

    if opts.skip_gzip_check {
        info!("Skipping gzip check of input FASTQs");
    } else {
        for fastq in manifest.input_paths() {
            check_gzip(&fastq)?;
        }
    }

    if opts.dry_run {
        log_merge_plan(&manifest, &opts.outdir);
        if !opts.overwrite {
            if let Err(collision) = check_output_collisions(&manifest, &opts.outdir) {
                warn!("{}", collision);
            }
        }
        info!("Dry run, nothing was written");
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&opts.outdir).with_context(|| {
        format!("Unable to create output directory: {}", opts.outdir.to_string_lossy())
    })?;
    if !opts.overwrite {
        check_output_collisions(&manifest, &opts.outdir)?;
    }
    let removed = remove_stale_partials(&planned_outputs(&manifest, &opts.outdir))?;
    if removed > 0 {
        info!("Removed {} partial output(s) from an earlier run", removed);
    }

    info!(
        "Merging {} sample(s) into {} using {} thread(s)",
        manifest.len(),
        display_path(&opts.outdir),
        opts.threads
    );
    let outcomes = merge_samples(&manifest, &opts.outdir, opts.threads)?;

    info!("Writing metrics");
    let prefix = opts.metrics_prefix.as_deref().unwrap_or_default();
    let metrics_path = write_merge_metrics(&outcomes, &opts.outdir, prefix)?;
    info!(
        "Merged {} sample(s), metrics written to {}",
        manifest.len(),
        metrics_path.to_string_lossy()
    );
    Ok(outcomes)
}
