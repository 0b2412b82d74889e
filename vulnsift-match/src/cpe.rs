// ---------------------------------------------------------------------------
// CPE-backed matching
// ---------------------------------------------------------------------------

use tracing::trace;

use vulnsift_db::{VulnStore, only_qualified_packages};
use vulnsift_types::{
    Found, Match, MatchDetail, MatchKind, MatcherType, Package, PackageRef, SearchedBy,
};
use vulnsift_version::Constraint;

use crate::error::MatchError;

/// Confidence for distro and language-ecosystem exact matches.
pub const DIRECT_CONFIDENCE: f64 = 1.0;
/// Confidence for a CPE hit where the package CPE names a concrete version.
pub const CPE_VERSIONED_CONFIDENCE: f64 = 0.9;
/// Confidence for a CPE hit reached through a wildcard version.
pub const CPE_WILDCARD_CONFIDENCE: f64 = 0.5;

/// Expand each of the package's CPEs against the provider's CPE index.
/// Version comparison happens here, under the scheme declared by each
/// record; records with no constraint match on product identity alone.
pub(crate) fn match_package_by_cpes(
    provider: &VulnStore,
    pkg: &Package,
    matcher: MatcherType,
) -> Result<Vec<Match>, MatchError> {
    let mut matches = Vec::new();

    for cpe in &pkg.cpes {
        let hits = provider
            .find_by_cpe(cpe)
            .map_err(|e| MatchError::provider(&pkg.name, format!("cpe={cpe}"), e))?;

        let mut vulns: Vec<_> = hits.into_iter().map(|(vuln, _)| vuln).collect();
        only_qualified_packages(pkg, &mut vulns);

        for vuln in vulns {
            // Prefer the CPE's own version attribute for evaluation, the
            // package version when the CPE carries a wildcard.
            let version = if cpe.has_specific_version() {
                cpe.version.as_str()
            } else {
                pkg.version.as_str()
            };

            if !vuln.constraint.trim().is_empty() {
                let satisfied = Constraint::parse(&vuln.constraint, vuln.scheme)
                    .and_then(|c| c.satisfied_by(version));
                match satisfied {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        trace!(
                            vulnerability = %vuln.id,
                            version,
                            error = %e,
                            "skipping CPE record: version not comparable"
                        );
                        continue;
                    }
                }
            }

            let confidence = if cpe.has_specific_version() {
                CPE_VERSIONED_CONFIDENCE
            } else {
                CPE_WILDCARD_CONFIDENCE
            };

            let detail = MatchDetail {
                kind: MatchKind::Cpe,
                matcher,
                searched_by: SearchedBy {
                    distro: None,
                    package: PackageRef {
                        name: pkg.name.clone(),
                        version: pkg.version.clone(),
                    },
                    namespace: vuln.namespace.clone(),
                    upstream: None,
                    cpe: Some(cpe.to_string()),
                },
                found: Found {
                    vulnerability_id: vuln.id.clone(),
                    version_constraint: vuln.constraint.clone(),
                },
                confidence,
            };
            matches.push(Match {
                vulnerability: vuln,
                package: pkg.clone(),
                details: vec![detail],
                severity: Default::default(),
                kev: None,
                epss: None,
            });
        }
    }

    Ok(matches)
}
