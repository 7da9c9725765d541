//! Release-tag recognition for Git references.
//!
//! A release tag is `refs/tags/v<N>(.<N>)*` with an optional `-<suffix>`. The
//! version handed to jobs is everything after `refs/tags/`, so `refs/tags/v1.2.3`
//! yields `v1.2.3`.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern a reference must match in full to count as a release tag.
pub const RELEASE_TAG_PATTERN: &str = r"^refs/tags/(v[0-9]+(?:\.[0-9]+)*(?:-.+)?)$";

static RELEASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RELEASE_TAG_PATTERN).expect("RELEASE_TAG_PATTERN is a valid regex"));

/// Returns the version carried by `reference` if it is a release tag.
///
/// Absence of a match is a normal outcome, not an error.
pub fn match_release_tag(reference: &str) -> Option<&str> {
    RELEASE_TAG
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
