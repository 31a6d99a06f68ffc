//! Semantic-version parsing and ordering gate
//!
//! Parsing is lenient: a leading `v` is dropped and missing minor/patch
//! components are filled with zero, so `v1.2` reads as `1.2.0`.

use crate::error::FilterError;
use semver::Version;
use std::cmp::Ordering;

/// Parse a version string leniently
#[must_use]
pub fn parse(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split_at = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

/// Whether the string parses as a semantic version
#[inline]
#[must_use]
pub fn is_semantic(version: &str) -> bool {
    parse(version).is_some()
}

/// Order two version strings, `None` if either does not parse
#[must_use]
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    Some(parse(a)?.cmp(&parse(b)?))
}

/// Check that `candidate` does not order before `prior`
///
/// An empty `prior` only requires the candidate to parse.
///
/// # Errors
/// - `FilterError::InvalidSemver` if the candidate does not parse
/// - `FilterError::InvalidPriorSemver` if the prior version does not parse
/// - `FilterError::OlderVersion` if the candidate is lower
pub fn check_progression(candidate: &str, prior: &str) -> Result<Version, FilterError> {
    let new = parse(candidate).ok_or_else(|| FilterError::InvalidSemver(candidate.to_string()))?;
    if prior.is_empty() {
        return Ok(new);
    }
    let old = parse(prior).ok_or_else(|| FilterError::InvalidPriorSemver(prior.to_string()))?;
    if new < old {
        return Err(FilterError::OlderVersion {
            candidate: candidate.to_string(),
            prior: prior.to_string(),
        });
    }
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lenient_parse() {
        assert_eq!(parse("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse("4"), Some(Version::new(4, 0, 0)));
        assert_eq!(parse("1.2-rc.1").map(|v| v.pre.to_string()), Some("rc.1".to_string()));
        assert_eq!(parse("latest"), None);
        assert_eq!(parse("1..2"), None);
        assert_eq!(parse("1.2.3.4"), None);
    }

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(compare("1.2.10", "1.2.9"), Some(Ordering::Greater));
        assert_eq!(compare("1.2.10", "x"), None);
    }

    #[test]
    fn older_candidate_rejected() {
        let err = check_progression("1.2.9", "1.2.10").unwrap_err();
        assert_eq!(
            err,
            FilterError::OlderVersion {
                candidate: "1.2.9".to_string(),
                prior: "1.2.10".to_string(),
            }
        );
    }

    #[test]
    fn equal_or_newer_accepted() {
        assert!(check_progression("1.2.10", "1.2.10").is_ok());
        assert!(check_progression("1.3.0", "1.2.10").is_ok());
        assert!(check_progression("0.1.0", "").is_ok());
    }

    #[test]
    fn distinct_parse_errors() {
        assert!(matches!(
            check_progression("abc", "1.0.0"),
            Err(FilterError::InvalidSemver(_))
        ));
        assert!(matches!(
            check_progression("1.0.0", "abc"),
            Err(FilterError::InvalidPriorSemver(_))
        ));
    }
}
