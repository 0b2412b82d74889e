use std::cmp::Ordering;

use vulnsift_types::VersionScheme;

use crate::error::VersionError;
use crate::{apk, deb, fuzzy, gem, golang, maven, pep440, portage, rpm};

/// Compare two version strings under the given scheme.
///
/// `Kb` is not linearly ordered and is rejected here; KB constraints are
/// evaluated against the supersedence graph instead.
pub fn compare(scheme: VersionScheme, a: &str, b: &str) -> Result<Ordering, VersionError> {
    match scheme {
        VersionScheme::Semver => semver_compare(a, b),
        VersionScheme::Apk => apk::compare(a, b),
        VersionScheme::Deb => deb::compare(a, b),
        VersionScheme::Rpm => rpm::compare(a, b),
        VersionScheme::Maven => maven::compare(a, b),
        VersionScheme::Pep440 => pep440::compare(a, b),
        VersionScheme::Gem => gem::compare(a, b),
        VersionScheme::Golang => golang::compare(a, b),
        VersionScheme::Portage => portage::compare(a, b),
        VersionScheme::Fuzzy => fuzzy::compare(a, b),
        VersionScheme::Kb => Err(VersionError::MissingKbGraph),
    }
}

fn semver_compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let va = parse_semver(a, VersionScheme::Semver)?;
    let vb = parse_semver(b, VersionScheme::Semver)?;
    Ok(va.cmp(&vb))
}

/// Lenient semver parsing: tolerates a leading `v` and missing minor/patch
/// components ("1.2" parses as "1.2.0"), which vulnerability feeds emit
/// constantly.
pub(crate) fn parse_semver(
    s: &str,
    scheme: VersionScheme,
) -> Result<semver::Version, VersionError> {
    let trimmed = s.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(VersionError::unparsed(scheme, s));
    }

    if let Ok(v) = semver::Version::parse(bare) {
        return Ok(v);
    }

    // Pad "1" or "1.2" out to three numeric components, keeping any
    // pre-release/build suffix attached.
    let core_end = bare.find(['-', '+']).unwrap_or(bare.len());
    let (core, suffix) = bare.split_at(core_end);
    let dots = core.matches('.').count();
    if dots < 2 && !core.is_empty() {
        let padded = format!("{}{}{}", core, ".0".repeat(2 - dots), suffix);
        if let Ok(v) = semver::Version::parse(&padded) {
            return Ok(v);
        }
    }

    Err(VersionError::unparsed(scheme, s))
}
