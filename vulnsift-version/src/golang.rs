// ---------------------------------------------------------------------------
// Go module version comparison
// ---------------------------------------------------------------------------
//
// Go module versions are semver with a mandatory `v` prefix (optional
// here), an ignorable `+incompatible` build suffix, and pseudo-versions of
// the form `v0.0.0-20220101000000-abcdef123456`. Pseudo-version timestamps
// are fixed-width, so semver's lexicographic pre-release comparison orders
// them chronologically.

use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;
use crate::scheme::parse_semver;

pub(crate) fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = parse(a)?;
    let vb = parse(b)?;
    Ok(va.cmp(&vb))
}

fn parse(s: &str) -> Result<semver::Version, VersionError> {
    let trimmed = s.trim();
    let bare = trimmed.strip_suffix("+incompatible").unwrap_or(trimmed);
    parse_semver(bare, VersionScheme::Golang)
}
