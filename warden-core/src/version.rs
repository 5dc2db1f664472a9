//! Total order over version strings (semver-aware with lexicographic fallback).
//!
//! Pulled in the `semver` crate the way `rust-lang-cargo` depends on it for
//! the same problem: comparing arbitrary version strings that are usually,
//! but not always, valid semver.

use semver::Version;

/// Parses `s` as semver, tolerating a single leading `v` (e.g. `v1.2.3`).
fn parse_semver(s: &str) -> Option<Version> {
    let trimmed = s.strip_prefix('v').unwrap_or(s);
    Version::parse(trimmed).ok()
}

/// Returns `true` if `a` is newer than `b` per spec §4.3.
///
/// If both parse as semver, compares by semver ordering. Otherwise falls
/// back to lexicographic string comparison. An empty string compares less
/// than any non-empty string.
pub fn is_newer(a: &str, b: &str) -> bool {
    if a.is_empty() {
        return false;
    }
    if b.is_empty() {
        return true;
    }
    match (parse_semver(a), parse_semver(b)) {
        (Some(va), Some(vb)) => va > vb,
        _ => a > b,
    }
}

/// Returns the newer of two optional version strings, per [`is_newer`].
/// `None` behaves like an absent pointer: any version is newer than none.
pub fn max_version<'a>(current: Option<&'a str>, candidate: &'a str) -> &'a str {
    match current {
        Some(c) if !is_newer(candidate, c) => c,
        _ => candidate,
    }
}

/// Picks the maximum version string out of a non-empty iterator, or `None`
/// if the iterator is empty. Used when recomputing a [`crate::model::LatestPointer`]
/// after a delete (spec §4.4).
pub fn pick_max<'a, I: IntoIterator<Item = &'a str>>(versions: I) -> Option<&'a str> {
    versions.into_iter().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(cur) => Some(max_version(Some(cur), v)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semver_ordering() {
        assert!(is_newer("2.0.0", "1.5.0"));
        assert!(!is_newer("1.5.0", "2.0.0"));
        assert!(is_newer("1.5.0", "1.0.0"));
    }

    #[test]
    fn leading_v_tolerated() {
        assert!(is_newer("v2.0.0", "v1.0.0"));
        assert!(is_newer("v2.0.0", "1.0.0"));
    }

    #[test]
    fn lexicographic_fallback_for_non_semver() {
        assert!(is_newer("banana", "apple"));
        assert!(!is_newer("apple", "banana"));
    }

    #[test]
    fn empty_string_is_always_oldest() {
        assert!(!is_newer("", "1.0.0"));
        assert!(is_newer("1.0.0", ""));
        assert!(!is_newer("", ""));
    }

    #[test]
    fn latest_monotone_out_of_order_publish() {
        let mut latest: Option<String> = None;
        for v in ["1.0.0", "2.0.0", "1.5.0"] {
            if latest.as_deref().is_none_or(|cur| is_newer(v, cur)) {
                latest = Some(v.to_string());
            }
        }
        assert_eq!(latest.as_deref(), Some("2.0.0"));
    }

    proptest::proptest! {
        #[test]
        fn max_version_is_commutative_over_three(a in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}", b in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}", c in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}") {
            let forward = max_version(Some(max_version(Some(&a), &b)), &c);
            let backward = max_version(Some(max_version(Some(&c), &b)), &a);
            proptest::prop_assert_eq!(forward, backward);
        }
    }
}
