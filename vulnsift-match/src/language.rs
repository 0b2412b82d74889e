// ---------------------------------------------------------------------------
// Language-ecosystem matching
// ---------------------------------------------------------------------------

use vulnsift_db::{VulnStore, only_qualified_packages, only_vulnerable_versions};
use vulnsift_types::{
    Found, Language, Match, MatchDetail, MatchKind, MatcherType, Package, PackageRef, SearchedBy,
};

use crate::cpe::{DIRECT_CONFIDENCE, match_package_by_cpes};
use crate::error::MatchError;

/// Generic language matcher: ecosystem-name search as the primary source,
/// CPE expansion as the secondary one. Ecosystem quirks are applied to the
/// queried name before the search.
pub(crate) fn match_package_by_language(
    provider: &VulnStore,
    pkg: &Package,
    language: Language,
    matcher: MatcherType,
) -> Result<Vec<Match>, MatchError> {
    match_package_by_ecosystem(provider, pkg, language.as_str(), language, matcher)
}

/// Same search against an explicit ecosystem tag (Bitnami rows are keyed by
/// their own ecosystem rather than a source language).
pub(crate) fn match_package_by_ecosystem(
    provider: &VulnStore,
    pkg: &Package,
    ecosystem: &str,
    language: Language,
    matcher: MatcherType,
) -> Result<Vec<Match>, MatchError> {
    let mut matches = Vec::new();
    for name in search_names(pkg, language) {
        matches.extend(search(provider, pkg, ecosystem, &name, matcher, None)?);
    }
    for upstream in &pkg.upstreams {
        matches.extend(search(
            provider,
            pkg,
            ecosystem,
            &upstream.name,
            matcher,
            Some((upstream.name.as_str(), upstream.version.as_deref())),
        )?);
    }
    matches.extend(match_package_by_cpes(provider, pkg, matcher)?);
    Ok(matches)
}

/// MSRC matching: the package name is the Windows product identity and the
/// version is an installed KB; fix checks walk the supersedence graph.
pub(crate) fn match_msrc(provider: &VulnStore, pkg: &Package) -> Result<Vec<Match>, MatchError> {
    let mut vulns = provider.find_by_language("kb", &pkg.name).map_err(|e| {
        MatchError::provider(&pkg.name, format!("msrc product={}", pkg.name), e)
    })?;
    let graph = provider
        .kb_graph()
        .map_err(|e| MatchError::provider(&pkg.name, "kb supersedence graph".to_string(), e))?;
    only_qualified_packages(pkg, &mut vulns);
    only_vulnerable_versions(&pkg.version, &mut vulns, Some(graph));

    Ok(vulns
        .into_iter()
        .map(|vuln| build_match(pkg, vuln, MatcherType::MsrcMatcher, None))
        .collect())
}

fn search(
    provider: &VulnStore,
    pkg: &Package,
    ecosystem: &str,
    name: &str,
    matcher: MatcherType,
    upstream: Option<(&str, Option<&str>)>,
) -> Result<Vec<Match>, MatchError> {
    let version = upstream
        .and_then(|(_, v)| v)
        .unwrap_or(pkg.version.as_str());

    let mut vulns = provider.find_by_language(ecosystem, name).map_err(|e| {
        MatchError::provider(
            &pkg.name,
            format!("ecosystem={ecosystem} package={name}"),
            e,
        )
    })?;
    only_qualified_packages(pkg, &mut vulns);
    only_vulnerable_versions(version, &mut vulns, None);

    Ok(vulns
        .into_iter()
        .map(|vuln| {
            build_match(
                pkg,
                vuln,
                matcher,
                upstream.map(|(up_name, up_version)| PackageRef {
                    name: up_name.to_string(),
                    version: up_version.unwrap_or(&pkg.version).to_string(),
                }),
            )
        })
        .collect())
}

fn build_match(
    pkg: &Package,
    vuln: vulnsift_types::Vulnerability,
    matcher: MatcherType,
    upstream: Option<PackageRef>,
) -> Match {
    let kind = if upstream.is_some() {
        MatchKind::ExactIndirect
    } else {
        MatchKind::ExactDirect
    };
    let detail = MatchDetail {
        kind,
        matcher,
        searched_by: SearchedBy {
            distro: None,
            package: PackageRef {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
            },
            namespace: vuln.namespace.clone(),
            upstream,
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
}

/// Names to query for a package, after ecosystem normalization.
fn search_names(pkg: &Package, language: Language) -> Vec<String> {
    match language {
        Language::Python => vec![pep503_normalize(&pkg.name)],
        Language::Java => java_identifiers(pkg),
        _ => vec![pkg.name.clone()],
    }
}

/// PEP 503 canonical form: lowercase, runs of `-`, `_`, `.` collapse to a
/// single `-`.
pub(crate) fn pep503_normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_was_sep && !out.is_empty() {
                out.push('-');
            }
            last_was_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

/// Java identities to search: the Maven `group:artifact` from the purl
/// wins; the jar-manifest name is only a fallback when no purl exists.
pub(crate) fn java_identifiers(pkg: &Package) -> Vec<String> {
    if let Some(ga) = group_artifact_from_purl(&pkg.purl) {
        return vec![ga];
    }
    if let Some(manifest) = manifest_identifier(pkg) {
        return vec![manifest];
    }
    vec![pkg.name.clone()]
}

/// `pkg:maven/org.apache.logging.log4j/log4j-core@2.14.1` →
/// `org.apache.logging.log4j:log4j-core`.
fn group_artifact_from_purl(purl: &str) -> Option<String> {
    let rest = purl.strip_prefix("pkg:maven/")?;
    let rest = rest.split(['@', '?']).next()?;
    let (group, artifact) = rest.split_once('/')?;
    if group.is_empty() || artifact.is_empty() {
        return None;
    }
    Some(format!("{group}:{artifact}"))
}

fn manifest_identifier(pkg: &Package) -> Option<String> {
    pkg.metadata
        .as_ref()?
        .get("manifestName")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnsift_types::{VersionScheme, Vulnerability};

    fn language_vuln(id: &str, namespace: &str, constraint: &str, scheme: VersionScheme) -> Vulnerability {
        Vulnerability {
            id: id.into(),
            namespace: namespace.into(),
            constraint: constraint.into(),
            scheme,
            ..Vulnerability::default()
        }
    }

    #[test]
    fn python_names_are_pep503_normalized() {
        assert_eq!(pep503_normalize("Flask"), "flask");
        assert_eq!(pep503_normalize("zope.interface"), "zope-interface");
        assert_eq!(pep503_normalize("foo__bar--baz"), "foo-bar-baz");
        assert_eq!(pep503_normalize("typing_extensions"), "typing-extensions");
    }

    #[test]
    fn python_query_uses_normalized_name() {
        let store = VulnStore::open_in_memory().unwrap();
        store
            .insert_vulnerability_for_package(
                &language_vuln(
                    "GHSA-aaaa-bbbb-cccc",
                    "github:language:python",
                    "<2.31.0",
                    VersionScheme::Pep440,
                ),
                "zope-interface",
                "python",
                None,
            )
            .unwrap();

        let pkg = Package {
            id: "p1".into(),
            name: "zope.interface".into(),
            version: "2.30.0".into(),
            language: Language::Python,
            ..Package::default()
        };
        let matches =
            match_package_by_language(&store, &pkg, Language::Python, MatcherType::PythonMatcher)
                .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].details[0].kind, MatchKind::ExactDirect);
    }

    #[test]
    fn java_group_artifact_beats_manifest_name() {
        let pkg = Package {
            name: "log4j-core".into(),
            purl: "pkg:maven/org.apache.logging.log4j/log4j-core@2.14.1".into(),
            metadata: Some(serde_json::json!({"manifestName": "log4j"})),
            ..Package::default()
        };
        assert_eq!(
            java_identifiers(&pkg),
            vec!["org.apache.logging.log4j:log4j-core".to_string()]
        );

        let no_purl = Package {
            purl: String::new(),
            ..pkg
        };
        assert_eq!(java_identifiers(&no_purl), vec!["log4j".to_string()]);
    }

    #[test]
    fn go_version_quirks_are_handled_by_the_scheme() {
        let store = VulnStore::open_in_memory().unwrap();
        store
            .insert_vulnerability_for_package(
                &language_vuln(
                    "GO-2022-0969",
                    "github:language:go",
                    "<1.38.2",
                    VersionScheme::Golang,
                ),
                "github.com/gogo/protobuf",
                "go",
                None,
            )
            .unwrap();

        let pkg = Package {
            id: "p1".into(),
            name: "github.com/gogo/protobuf".into(),
            version: "v1.3.2+incompatible".into(),
            language: Language::Go,
            ..Package::default()
        };
        let matches =
            match_package_by_language(&store, &pkg, Language::Go, MatcherType::GoMatcher).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn msrc_uses_supersedence_for_fix_checks() {
        let store = VulnStore::open_in_memory().unwrap();
        store.insert_kb_supersedence("KB5005565", "KB5006670").unwrap();
        store
            .insert_vulnerability_for_package(
                &language_vuln(
                    "CVE-2021-40449",
                    "msrc:kb",
                    "<KB5006670",
                    VersionScheme::Kb,
                ),
                "10816",
                "kb",
                None,
            )
            .unwrap();

        let pkg = Package {
            id: "w1".into(),
            name: "10816".into(),
            version: "KB5005565".into(),
            ..Package::default()
        };
        let matches = match_msrc(&store, &pkg).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].details[0].matcher, MatcherType::MsrcMatcher);

        // A package already at the fixing rollup does not match.
        let patched = Package {
            version: "KB5006670".into(),
            ..pkg
        };
        assert!(match_msrc(&store, &patched).unwrap().is_empty());
    }
}
