//! Grouping of per-lane input FASTQs into one [`ReadGroup`] per sample.
//!
//! A [`MergeManifest`] is built once from a directory scan and is never modified afterwards.
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Result;
use log::{info, warn};

use crate::{
    errors::LaneMergeError,
    input_fastq::{InputFastq, ReadDirection},
};

/// The forward and reverse lane FASTQs for a single sample, each in lane order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroup {
    pub sample_id: String,
    pub forward: Vec<InputFastq>,
    pub reverse: Vec<InputFastq>,
}

impl ReadGroup {
    /// Create an empty [`ReadGroup`] for the given sample.
    pub fn new(sample_id: String) -> Self {
        Self { sample_id, forward: vec![], reverse: vec![] }
    }

    /// The FASTQs for the given read direction.
    pub fn reads(&self, direction: ReadDirection) -> &[InputFastq] {
        match direction {
            ReadDirection::R1 => &self.forward,
            ReadDirection::R2 => &self.reverse,
        }
    }

    /// The paths of the FASTQs for the given read direction, in merge order.
    pub fn paths(&self, direction: ReadDirection) -> Vec<&Path> {
        self.reads(direction).iter().map(|f| f.path.as_path()).collect()
    }
}

/// A mapping from sample ID to [`ReadGroup`], ordered by sample ID.
#[derive(Debug, Clone, Default)]
pub struct MergeManifest {
    groups: BTreeMap<String, ReadGroup>,
}

impl MergeManifest {
    /// Build a manifest from a collection of classified FASTQs.
    ///
    /// Every FASTQ contributes its sample ID, even if it has no read direction.  Such FASTQs are
    /// not placed in either list, so the sample will be short of files when validated.
    pub fn from_fastqs(fastqs: Vec<InputFastq>) -> Self {
        let mut groups: BTreeMap<String, ReadGroup> = BTreeMap::new();
        for fastq in fastqs {
            let group = groups
                .entry(fastq.sample_id.clone())
                .or_insert_with(|| ReadGroup::new(fastq.sample_id.clone()));
            match fastq.direction {
                Some(ReadDirection::R1) => group.forward.push(fastq),
                Some(ReadDirection::R2) => group.reverse.push(fastq),
                None => warn!(
                    "FASTQ has no R1/R2 tag and will not be merged: {}",
                    fastq.path.to_string_lossy()
                ),
            }
        }
        for group in groups.values_mut() {
            group.forward.sort();
            group.reverse.sort();
        }
        Self { groups }
    }

    /// Scan the input directory for `*.fastq.gz` files and group them by sample.
    ///
    /// # Errors
    ///
    /// - [`LaneMergeError::DirectoryNotFound`] if `dir` is not an existing directory
    /// - [`LaneMergeError::NoInputFastqs`] if no FASTQs were found
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LaneMergeError::DirectoryNotFound(dir.to_path_buf()).into());
        }
        let fastqs = InputFastq::slurp(dir)?;
        let manifest = Self::from_fastqs(fastqs);
        if manifest.is_empty() {
            return Err(LaneMergeError::NoInputFastqs(dir.to_path_buf()).into());
        }
        info!("Found {} sample(s) in {}", manifest.len(), dir.to_string_lossy());
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, sample_id: &str) -> Option<&ReadGroup> {
        self.groups.get(sample_id)
    }

    /// Iterate over the read groups in sample ID order.
    pub fn groups(&self) -> impl Iterator<Item = &ReadGroup> {
        self.groups.values()
    }

    /// The sample IDs in sorted order.
    pub fn sample_ids(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// All input paths across all samples and directions.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.groups()
            .flat_map(|g| g.forward.iter().chain(g.reverse.iter()))
            .map(|f| f.path.clone())
            .collect()
    }
}
