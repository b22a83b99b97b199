//! Finding the tags that are newer than the deployed one.

use crate::error::{CheckError, Result};
use semver::{BuildMetadata, Comparator, Op, Prerelease, Version};
use std::cmp::Ordering;
use tracing::debug;

/// Which candidate tags are eligible to be reported as newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Only tags with no more dotted segments than the deployed tag, so a
    /// deployment pinned to `1.2` is compared against `1.3`, not `1.2.1`.
    #[default]
    Strict,
    /// Every parseable tag.
    All,
}

impl CompareMode {
    pub fn from_all_flag(all: bool) -> Self {
        if all {
            CompareMode::All
        } else {
            CompareMode::Strict
        }
    }
}

/// A tag parsed as a semantic version, keeping the tag as written.
///
/// `1.2` and `1.2.0` compare equal as versions but have different
/// `segments`, which is what strict mode filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    pub original: String,
    pub version: Version,
    pub segments: usize,
}

impl ParsedVersion {
    /// Accepts `[v]MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]`. A pre-release
    /// starting with a letter may also follow the numbers directly
    /// (`1.0beta`). Missing minor and patch numbers are zero.
    pub fn parse(literal: &str) -> std::result::Result<Self, String> {
        let body = literal.strip_prefix('v').unwrap_or(literal);
        let (body, build) = match body.split_once('+') {
            Some((_, "")) => return Err("empty build metadata".to_string()),
            Some((body, build)) => (body, build),
            None => (body, ""),
        };

        let numeric_end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (numeric, rest) = body.split_at(numeric_end);

        let pre = match rest.strip_prefix('-') {
            Some("") => return Err("empty pre-release".to_string()),
            Some(pre) => pre,
            None if rest.is_empty() => "",
            None if rest.starts_with(|c: char| c.is_ascii_alphabetic()) => rest,
            None => return Err(format!("unexpected '{}'", rest)),
        };

        let numbers = numeric
            .split('.')
            .map(|segment| {
                if segment.is_empty() {
                    Err("empty version segment".to_string())
                } else {
                    segment.parse::<u64>().map_err(|e| e.to_string())
                }
            })
            .collect::<std::result::Result<Vec<u64>, String>>()?;
        if numbers.len() > 3 {
            return Err(format!("{} version segments, at most 3 allowed", numbers.len()));
        }

        let mut version = Version::new(
            numbers[0],
            numbers.get(1).copied().unwrap_or(0),
            numbers.get(2).copied().unwrap_or(0),
        );
        version.pre = Prerelease::new(pre).map_err(|e| e.to_string())?;
        version.build = BuildMetadata::new(build).map_err(|e| e.to_string())?;

        Ok(Self {
            original: literal.to_string(),
            version,
            segments: numbers.len(),
        })
    }

    /// Semantic version precedence; build metadata is ignored.
    fn cmp_precedence(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.version, &other.version);
        (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
    }
}

/// Parses every tag that looks like a version, ascending by precedence.
pub fn sorted_versions(tags: &[String]) -> Vec<ParsedVersion> {
    let mut versions: Vec<ParsedVersion> = tags
        .iter()
        .filter_map(|tag| match ParsedVersion::parse(tag) {
            Ok(version) => Some(version),
            Err(reason) => {
                debug!(tag = %tag, reason = %reason, "failed to create version from tag");
                None
            }
        })
        .collect();

    versions.sort_by(ParsedVersion::cmp_precedence);
    versions
}

/// Builds the `> tag` constraint.
///
/// Pre-release candidates only satisfy it when `tag` is itself a pre-release
/// of the same major.minor.patch.
pub fn greater_than(tag: &str) -> Result<Comparator> {
    let current = ParsedVersion::parse(tag).map_err(|reason| CheckError::InvalidConstraint {
        tag: tag.to_string(),
        reason,
    })?;

    Ok(Comparator {
        op: Op::Greater,
        major: current.version.major,
        minor: Some(current.version.minor),
        patch: Some(current.version.patch),
        pre: current.version.pre,
    })
}

/// Tags strictly newer than `current_tag`, as written in the registry and in
/// ascending order. An empty result means the image is up to date.
pub fn newer_versions(current_tag: &str, tags: &[String], mode: CompareMode) -> Result<Vec<String>> {
    let mut versions = sorted_versions(tags);

    if mode == CompareMode::Strict {
        let tag_segments = current_tag.split('.').count();
        versions.retain(|v| v.segments <= tag_segments);
    }

    let constraint = greater_than(current_tag)?;

    Ok(versions
        .into_iter()
        .filter(|v| constraint.matches(&v.version))
        .map(|v| v.original)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_short_and_prefixed_versions() {
        let v = ParsedVersion::parse("1.2").unwrap();
        assert_eq!(v.version, Version::new(1, 2, 0));
        assert_eq!(v.segments, 2);

        let v = ParsedVersion::parse("v3").unwrap();
        assert_eq!(v.version, Version::new(3, 0, 0));
        assert_eq!(v.segments, 1);
        assert_eq!(v.original, "v3");

        let v = ParsedVersion::parse("1.25.3-alpine+build.5").unwrap();
        assert_eq!(v.version.pre.as_str(), "alpine");
        assert_eq!(v.version.build.as_str(), "build.5");
        assert_eq!(v.segments, 3);

        let v = ParsedVersion::parse("1.0beta").unwrap();
        assert_eq!(v.version.pre.as_str(), "beta");
    }

    #[test]
    fn rejects_non_versions() {
        for tag in ["latest", "", "stable", "1.2.3.4", "1..2", "1.2-", "sha-3f2a1b", "1.2+"] {
            assert!(ParsedVersion::parse(tag).is_err(), "{tag} should not parse");
        }
    }

    #[test]
    fn strict_mode_keeps_tags_with_matching_granularity() {
        let result = newer_versions(
            "1.1",
            &tags(&["1.1.0", "1.2", "1.2.0", "1.3", "1.3.0", "1.3.1"]),
            CompareMode::Strict,
        )
        .unwrap();
        assert_eq!(result, vec!["1.2", "1.3"]);
    }

    #[test]
    fn strict_mode_single_segment_tag_only_sees_single_segments() {
        let result = newer_versions(
            "2",
            &tags(&["1", "1.1", "1.1.0", "1.2", "1.2.0", "1.2.1", "2", "2.1", "3", "3.1", "3.2", "3.2.0"]),
            CompareMode::Strict,
        )
        .unwrap();
        assert_eq!(result, vec!["3"]);
    }

    #[test]
    fn strict_mode_with_full_versions_behaves_like_all() {
        let input = tags(&["latest", "0.3.0", "0.1.0", "0.2.0", "0.1.1", "1.0.0"]);
        assert_eq!(
            newer_versions("0.2.0", &input, CompareMode::Strict).unwrap(),
            vec!["0.3.0", "1.0.0"]
        );
    }

    #[test]
    fn all_mode_reports_every_newer_version() {
        let input = tags(&["latest", "0.3.0", "0.1.0", "0.2.0", "0.1.1", "1.0.0"]);
        assert_eq!(
            newer_versions("0.2.0", &input, CompareMode::All).unwrap(),
            vec!["0.3.0", "1.0.0"]
        );

        assert_eq!(
            newer_versions("0.1.0", &tags(&["0.1.0", "0.2.0"]), CompareMode::All).unwrap(),
            vec!["0.2.0"]
        );
    }

    #[test]
    fn all_mode_compares_short_tags_numerically() {
        let result = newer_versions("1.2", &tags(&["1.2.0", "1.2.1", "1.3"]), CompareMode::All).unwrap();
        assert_eq!(result, vec!["1.2.1", "1.3"]);
    }

    #[test]
    fn unparseable_tags_yield_nothing() {
        let result = newer_versions(
            "1.0",
            &tags(&["latest", "edge", "sha-deadbeef", "nightly"]),
            CompareMode::All,
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn keeps_original_literal_in_output() {
        let result = newer_versions("v1.0.0", &tags(&["v1.1.0", "1.2.0", "v0.9.0"]), CompareMode::All).unwrap();
        assert_eq!(result, vec!["v1.1.0", "1.2.0"]);
    }

    #[test]
    fn pre_releases_only_follow_pre_releases_of_the_same_version() {
        let input = tags(&["2.0.0-rc.1", "2.0.0", "1.5.0-beta", "1.5.0-rc.2"]);
        assert_eq!(
            newer_versions("1.5.0", &input, CompareMode::All).unwrap(),
            vec!["2.0.0"]
        );
        assert_eq!(
            newer_versions("1.5.0-beta", &input, CompareMode::All).unwrap(),
            vec!["1.5.0-rc.2", "2.0.0"]
        );
    }

    #[test]
    fn sorts_by_precedence() {
        let sorted: Vec<String> = sorted_versions(&tags(&["1.10.0", "1.2.0", "1.2.0-rc.1", "0.9"]))
            .into_iter()
            .map(|v| v.original)
            .collect();
        assert_eq!(sorted, vec!["0.9", "1.2.0-rc.1", "1.2.0", "1.10.0"]);
    }

    #[test]
    fn unparseable_current_tag_is_an_invalid_constraint() {
        let err = newer_versions("stable", &tags(&["1.0.0"]), CompareMode::All).unwrap_err();
        match err {
            CheckError::InvalidConstraint { tag, .. } => assert_eq!(tag, "stable"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn repeated_runs_give_identical_results() {
        let input = tags(&["3.1", "latest", "2.9", "3.0", "3.0.1", "2.10"]);
        let first = newer_versions("2.9", &input, CompareMode::Strict).unwrap();
        let second = newer_versions("2.9", &input, CompareMode::Strict).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["2.10", "3.0", "3.1"]);
    }
}
