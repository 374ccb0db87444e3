//! A library of functionality for merging per-lane FASTQ files.
//!
//! # Overview
//!
//! The flow of data is as follows:
//!
//! - [`input_fastq::InputFastq`] classifies each `*.fastq.gz` in the input directory by the sample
//!   ID, lane, and read direction in its file name.
//! - The [`manifest::MergeManifest`] groups those FASTQs into one [`manifest::ReadGroup`] per
//!   sample, with the forward and reverse FASTQs each in lane order.
//! - [`validate::validate_manifest`] checks every group has the expected number of lanes,
//!   reporting every problem at once before anything is written.
//! - The [`merger`] concatenates each group's FASTQs into one output per read direction.
//! - [`metrics`] describing each merged output are written to the output directory.
#![deny(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
pub mod errors;
pub mod input_fastq;
pub mod manifest;
pub mod merger;
pub mod metrics;
pub mod opts;
pub mod run;
pub mod utils;
pub mod validate;
