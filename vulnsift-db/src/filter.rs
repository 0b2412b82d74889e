// ---------------------------------------------------------------------------
// Record qualifier predicates
// ---------------------------------------------------------------------------
//
// These run between the provider query and version evaluation: records
// whose qualifiers cannot apply to the package are dropped before any
// constraint is parsed.

use tracing::trace;

use vulnsift_types::{Cpe, Package, Vulnerability};
use vulnsift_version::{Constraint, KbGraph};

/// Drop records whose RPM modularity or platform-CPE qualifiers do not
/// match the package.
pub fn only_qualified_packages(pkg: &Package, vulns: &mut Vec<Vulnerability>) {
    vulns.retain(|vuln| {
        if vuln.qualifiers.is_empty() {
            return true;
        }
        modularity_applies(pkg, vuln) && platform_applies(pkg, vuln)
    });
}

fn modularity_applies(pkg: &Package, vuln: &Vulnerability) -> bool {
    let Some(required) = vuln.qualifiers.rpm_modularity.as_deref() else {
        return true;
    };
    // A package with no modularity label may belong to any stream; only a
    // known, different label disqualifies the record.
    // Records carry "name:stream"; package labels append version/context
    // segments after the stream.
    match package_modularity(pkg) {
        Some(label) => label == required || label.starts_with(&format!("{required}:")),
        None => true,
    }
}

fn package_modularity(pkg: &Package) -> Option<&str> {
    pkg.metadata
        .as_ref()?
        .get("modularityLabel")
        .and_then(|v| v.as_str())
}

fn platform_applies(pkg: &Package, vuln: &Vulnerability) -> bool {
    if vuln.qualifiers.platform_cpes.is_empty() {
        return true;
    }
    let Some(distro) = &pkg.distro else {
        // No platform information on the package: keep the record and let
        // version evaluation decide.
        return true;
    };
    vuln.qualifiers.platform_cpes.iter().any(|raw| {
        let Ok(cpe) = Cpe::parse(raw) else {
            trace!(cpe = raw, "skipping unparseable platform CPE qualifier");
            return false;
        };
        Cpe::attribute_matches(&cpe.product, &distro.kind)
            && (Cpe::attribute_matches(&cpe.version, &distro.version)
                || Cpe::attribute_matches(&cpe.version, distro.major_version()))
    })
}

/// Drop records whose constraint is not satisfied by the package version
/// under that record's scheme. Unparseable versions or constraints drop the
/// record with a trace diagnostic; they never become matches.
pub fn only_vulnerable_versions(version: &str, vulns: &mut Vec<Vulnerability>, kb: Option<&KbGraph>) {
    vulns.retain(|vuln| {
        let constraint = match Constraint::parse(&vuln.constraint, vuln.scheme) {
            Ok(c) => c,
            Err(e) => {
                trace!(
                    vulnerability = %vuln.id,
                    constraint = %vuln.constraint,
                    error = %e,
                    "skipping record with unparseable constraint"
                );
                return false;
            }
        };
        let satisfied = match kb {
            Some(graph) => constraint.satisfied_by_kb(version, graph),
            None => constraint.satisfied_by(version),
        };
        match satisfied {
            Ok(result) => result,
            Err(e) => {
                trace!(
                    vulnerability = %vuln.id,
                    version,
                    error = %e,
                    "skipping record: version not comparable under scheme"
                );
                false
            }
        }
    });
}
