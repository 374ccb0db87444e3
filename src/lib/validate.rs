//! Validation of a [`MergeManifest`] before any merging begins.
//!
//! All samples are checked and every problem is reported together, so that the input directory
//! can be fixed in a single pass.
use itertools::Itertools;
use log::info;
use strum::IntoEnumIterator;

use crate::{
    errors::{GroupViolation, LaneMergeError, ViolationKind},
    input_fastq::ReadDirection,
    manifest::{MergeManifest, ReadGroup},
};

/// The number of lanes on the instrument this tool was written for.
pub const DEFAULT_EXPECTED_LANES: usize = 4;

/// Find all problems with a single read group.
pub fn group_violations(group: &ReadGroup, expected_lanes: usize) -> Vec<GroupViolation> {
    let mut violations = vec![];
    for direction in ReadDirection::iter() {
        let reads = group.reads(direction);
        if reads.len() != expected_lanes {
            violations.push(GroupViolation {
                sample_id: group.sample_id.clone(),
                direction,
                kind: ViolationKind::LaneCount { actual: reads.len(), expected: expected_lanes },
            });
        }
        // Reads are sorted, so any repeated lane tags are adjacent
        let duplicated = reads
            .iter()
            .map(|f| f.lane_tag.as_str())
            .dedup_with_count()
            .filter(|(count, _)| *count > 1)
            .map(|(_, tag)| tag);
        for lane_tag in duplicated {
            violations.push(GroupViolation {
                sample_id: group.sample_id.clone(),
                direction,
                kind: ViolationKind::DuplicateLane { lane_tag: lane_tag.to_string() },
            });
        }
    }
    violations
}

/// Check that every read group has exactly `expected_lanes` files per read direction, each from
/// a distinct lane.
///
/// # Errors
///
/// - [`LaneMergeError::Validation`] listing every violation found across all samples
pub fn validate_manifest(
    manifest: &MergeManifest,
    expected_lanes: usize,
) -> Result<(), LaneMergeError> {
    let violations: Vec<GroupViolation> =
        manifest.groups().flat_map(|g| group_violations(g, expected_lanes)).collect();
    if violations.is_empty() {
        info!(
            "All {} sample(s) have {} lane(s) for each of R1 and R2",
            manifest.len(),
            expected_lanes
        );
        Ok(())
    } else {
        Err(LaneMergeError::Validation(violations))
    }
}

#[cfg(test)]
mod test {
    use matches::assert_matches;
    use rstest::rstest;

    use crate::{
        errors::{LaneMergeError, ViolationKind},
        input_fastq::{InputFastq, ReadDirection},
        manifest::MergeManifest,
        utils::test_commons::lane_fastq_names,
    };

    use super::{group_violations, validate_manifest, DEFAULT_EXPECTED_LANES};

    /// Build a manifest from file names alone, no files need to exist.
    fn manifest_from_names(names: &[String]) -> MergeManifest {
        MergeManifest::from_fastqs(names.iter().map(|n| InputFastq::new(n).unwrap()).collect())
    }

    #[test]
    fn test_valid_manifest() {
        let names = [lane_fastq_names("S1", 4), lane_fastq_names("S2", 4)].concat();
        let manifest = manifest_from_names(&names);
        assert!(validate_manifest(&manifest, DEFAULT_EXPECTED_LANES).is_ok());
    }

    #[test]
    fn test_reports_every_bad_sample() {
        let mut names = lane_fastq_names("Good", 4);
        // Bad1 is missing lane 4 for R1 only
        names.extend(
            lane_fastq_names("Bad1", 4).into_iter().filter(|n| n != "Bad1_L004_R1.fastq.gz"),
        );
        // Bad2 has five lanes for both reads
        names.extend(lane_fastq_names("Bad2", 5));
        let manifest = manifest_from_names(&names);

        let err = validate_manifest(&manifest, DEFAULT_EXPECTED_LANES).unwrap_err();
        assert_matches!(err, LaneMergeError::Validation(_));
        if let LaneMergeError::Validation(violations) = err {
            let summary: Vec<(String, ReadDirection, ViolationKind)> =
                violations.into_iter().map(|v| (v.sample_id, v.direction, v.kind)).collect();
            assert_eq!(
                summary,
                vec![
                    (
                        "Bad1".to_string(),
                        ReadDirection::R1,
                        ViolationKind::LaneCount { actual: 3, expected: 4 }
                    ),
                    (
                        "Bad2".to_string(),
                        ReadDirection::R1,
                        ViolationKind::LaneCount { actual: 5, expected: 4 }
                    ),
                    (
                        "Bad2".to_string(),
                        ReadDirection::R2,
                        ViolationKind::LaneCount { actual: 5, expected: 4 }
                    ),
                ]
            );
        }
    }

    #[test]
    fn test_error_message_names_samples_and_counts() {
        let names: Vec<String> = lane_fastq_names("S7", 2);
        let manifest = manifest_from_names(&names);
        let message = validate_manifest(&manifest, 4).unwrap_err().to_string();
        assert!(message.starts_with("2 problem(s) found"));
        assert!(message.contains("Sample S7 has 2 R1 file(s), expected 4"));
        assert!(message.contains("Sample S7 has 2 R2 file(s), expected 4"));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(8)]
    fn test_expected_lanes_is_configurable(#[case] lanes: usize) {
        let manifest = manifest_from_names(&lane_fastq_names("S1", lanes));
        assert!(validate_manifest(&manifest, lanes).is_ok());
        assert!(validate_manifest(&manifest, lanes + 1).is_err());
    }

    #[test]
    fn test_duplicate_lanes_are_reported() {
        let names = vec![
            "S1_L001_R1.fastq.gz".to_string(),
            "S1_L001_x_R1.fastq.gz".to_string(),
            "S1_L002_R1.fastq.gz".to_string(),
            "S1_L002_R2.fastq.gz".to_string(),
            "S1_L001_R2.fastq.gz".to_string(),
        ];
        let manifest = manifest_from_names(&names);
        let group = manifest.get("S1").unwrap();
        // three R1s with distinct tags: only a count violation
        let violations = group_violations(group, 2);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].direction, ReadDirection::R1);

        let names = vec![
            "S1_L001_R1.fastq.gz".to_string(),
            "S1_L001__R1.fastq.gz".to_string(),
            "S1_L001_R2.fastq.gz".to_string(),
            "S1_L002_R2.fastq.gz".to_string(),
        ];
        let manifest = manifest_from_names(&names);
        let violations = group_violations(manifest.get("S1").unwrap(), 2);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].kind,
            ViolationKind::DuplicateLane { lane_tag: "L001".to_string() }
        );
    }

    #[test]
    fn test_sample_with_only_unknown_directions_fails() {
        let manifest = manifest_from_names(&["S1_L001_I1.fastq.gz".to_string()]);
        let err = validate_manifest(&manifest, 1).unwrap_err();
        assert_matches!(err, LaneMergeError::Validation(v) if v.len() == 2);
    }
}
