// ---------------------------------------------------------------------------
// Distro-backed matching
// ---------------------------------------------------------------------------

use vulnsift_db::{VulnStore, only_qualified_packages, only_vulnerable_versions};
use vulnsift_types::{
    Distro, DistroRef, Found, Match, MatchDetail, MatchKind, MatcherType, Package, PackageRef,
    SearchedBy, UpstreamPackage,
};

use crate::cpe::DIRECT_CONFIDENCE;
use crate::error::MatchError;

/// Match a package against its distro's security tracker records: once for
/// the installed identity and once per declared upstream source package.
/// Packages without a distro produce no matches.
pub(crate) fn match_package_by_distro(
    provider: &VulnStore,
    pkg: &Package,
    matcher: MatcherType,
) -> Result<Vec<Match>, MatchError> {
    let Some(distro) = &pkg.distro else {
        return Ok(Vec::new());
    };

    let mut matches = search(provider, pkg, distro, matcher, None)?;
    for upstream in &pkg.upstreams {
        matches.extend(search(provider, pkg, distro, matcher, Some(upstream))?);
    }
    Ok(matches)
}

fn search(
    provider: &VulnStore,
    pkg: &Package,
    distro: &Distro,
    matcher: MatcherType,
    upstream: Option<&UpstreamPackage>,
) -> Result<Vec<Match>, MatchError> {
    let (name, version, kind) = match upstream {
        // A source package without its own version inherits the binary's.
        Some(up) => (
            up.name.as_str(),
            up.version.as_deref().unwrap_or(&pkg.version),
            MatchKind::ExactIndirect,
        ),
        None => (pkg.name.as_str(), pkg.version.as_str(), MatchKind::ExactDirect),
    };

    let mut vulns = provider.find_by_distro(distro, name).map_err(|e| {
        MatchError::provider(&pkg.name, format!("distro={distro} package={name}"), e)
    })?;
    only_qualified_packages(pkg, &mut vulns);
    only_vulnerable_versions(version, &mut vulns, None);

    Ok(vulns
        .into_iter()
        .map(|vuln| {
            let detail = MatchDetail {
                kind,
                matcher,
                searched_by: SearchedBy {
                    distro: Some(DistroRef::from(distro)),
                    // Always the installed identity; the upstream field
                    // records what the query actually used.
                    package: PackageRef {
                        name: pkg.name.clone(),
                        version: pkg.version.clone(),
                    },
                    namespace: vuln.namespace.clone(),
                    upstream: upstream.map(|up| PackageRef {
                        name: up.name.clone(),
                        version: version.to_string(),
                    }),
                    cpe: None,
                },
                found: Found {
                    vulnerability_id: vuln.id.clone(),
                    version_constraint: vuln.constraint.clone(),
                },
                confidence: DIRECT_CONFIDENCE,
            };
            Match {
                vulnerability: vuln,
                package: pkg.clone(),
                details: vec![detail],
                severity: Default::default(),
                kev: None,
                epss: None,
            }
        })
        .collect())
}
