use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vulnsift_db::VulnStore;
use vulnsift_match::{
    MatchOutcome, MatcherRegistry, apply_ignore_rules, enrich_matches, match_package,
    merge_matches, rules_from_vex, validate_rules,
};
use vulnsift_types::{
    Descriptor, IgnoreRule, IgnoredMatch, Match, Package, ReportedMatch, ScanReport,
};

use crate::config::{MAX_WORKERS, ScanConfig};
use crate::error::ScanError;

/// Run the matching core over a normalized package list.
///
/// Packages are dispatched across a bounded worker pool; the provider is
/// opened at scan start and released on every exit path. On timeout the
/// pool is cancelled at package-boundary granularity and the report is
/// assembled from fully-processed packages; a matcher or provider error
/// discards all partial results and aborts the scan.
pub async fn run_scan(config: &ScanConfig, packages: &[Package]) -> Result<ScanReport, ScanError> {
    run_scan_cancellable(config, packages, CancellationToken::new()).await
}

/// [`run_scan`] with a caller-supplied cancellation token. On cancel,
/// in-flight packages finish, pending ones are skipped, and the report is
/// assembled from the completed set.
pub async fn run_scan_cancellable(
    config: &ScanConfig,
    packages: &[Package],
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError> {
    let rules = assemble_rules(config)?;

    let store = Arc::new(VulnStore::open(&config.db_path)?);
    let registry = Arc::new(MatcherRegistry::with_default_matchers(config.cpe_matching));
    let workers = config.workers.clamp(1, MAX_WORKERS);
    info!(
        packages = packages.len(),
        workers,
        db = %config.db_path.display(),
        "starting vulnerability scan"
    );

    let outcomes = dispatch(config, packages, &store, &registry, workers, cancel.child_token()).await?;

    let mut all_matches = Vec::new();
    let mut rules = rules;
    for outcome in outcomes {
        all_matches.extend(outcome.matches);
        rules.extend(outcome.ignore_rules);
    }

    let mut merged = merge_matches(all_matches);
    enrich_matches(&store, &mut merged)?;

    let (mut kept, mut ignored) = apply_ignore_rules(merged, &rules);
    sort_matches(&mut kept);
    ignored.sort_by(|a, b| sort_key(&a.matched).cmp(&sort_key(&b.matched)));

    debug!(
        matches = kept.len(),
        ignored = ignored.len(),
        "scan complete"
    );

    let db = store.descriptor()?;
    Ok(ScanReport {
        matches: kept.into_iter().map(ReportedMatch::from).collect(),
        ignored_matches: ignored
            .into_iter()
            .map(|entry| IgnoredMatch {
                matched: entry.matched.into(),
                applied_ignore_rules: entry.applied_rules,
            })
            .collect(),
        source: config.source.clone(),
        distro: config.distro.clone(),
        descriptor: Descriptor {
            name: "vulnsift".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            db,
        },
    })
}

/// Merge user rules with VEX-derived rules and validate the result before
/// matching begins.
fn assemble_rules(config: &ScanConfig) -> Result<Vec<IgnoreRule>, ScanError> {
    let mut rules = config.ignore_rules.clone();
    for path in &config.vex_paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Config(format!("cannot read VEX document {}: {e}", path.display()))
        })?;
        let vex_rules = rules_from_vex(&text)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        rules.extend(vex_rules);
    }
    validate_rules(&rules).map_err(|e| ScanError::Config(e.to_string()))?;
    Ok(rules)
}

async fn dispatch(
    config: &ScanConfig,
    packages: &[Package],
    store: &Arc<VulnStore>,
    registry: &Arc<MatcherRegistry>,
    workers: usize,
    cancel: CancellationToken,
) -> Result<Vec<MatchOutcome>, ScanError> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut join_set: JoinSet<Result<Option<MatchOutcome>, ScanError>> = JoinSet::new();

    for pkg in packages.iter().cloned() {
        let store = store.clone();
        let registry = registry.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| ScanError::TaskJoin(e.to_string()))?;
            // Cancellation is package-boundary granular: a package either
            // runs to completion or is skipped entirely.
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let outcome = match_package(&store, &registry, &pkg)?;
            Ok(Some(outcome))
        });
    }

    let mut deadline = config.timeout.map(|t| tokio::time::Instant::now() + t);
    let mut outcomes = Vec::with_capacity(packages.len());
    let mut first_error: Option<ScanError> = None;

    loop {
        let joined = match deadline {
            Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("scan timeout reached, cancelling at package boundary");
                    cancel.cancel();
                    deadline = None;
                    continue;
                }
            },
            None => join_set.join_next().await,
        };

        match joined {
            Some(Ok(Ok(Some(outcome)))) => outcomes.push(outcome),
            Some(Ok(Ok(None))) => {}
            Some(Ok(Err(e))) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(e);
                }
            }
            Some(Err(join_error)) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(ScanError::TaskJoin(join_error.to_string()));
                }
            }
            None => break,
        }
    }

    match first_error {
        // Partial results from other packages are discarded on fatal error.
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

fn sort_key(m: &Match) -> (&str, &str, &str, &str, &str) {
    (
        &m.package.name,
        &m.package.version,
        &m.vulnerability.namespace,
        &m.vulnerability.id,
        &m.package.id,
    )
}

/// Final ordering is deterministic regardless of scheduling order.
fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnsift_types::{SeverityBucket, Vulnerability};

    fn make_match(pkg_name: &str, pkg_version: &str, namespace: &str, id: &str) -> Match {
        Match {
            vulnerability: Vulnerability {
                id: id.into(),
                namespace: namespace.into(),
                ..Vulnerability::default()
            },
            package: Package {
                id: format!("{pkg_name}-{pkg_version}"),
                name: pkg_name.into(),
                version: pkg_version.into(),
                ..Package::default()
            },
            details: vec![],
            severity: SeverityBucket::Unknown,
            kev: None,
            epss: None,
        }
    }

    #[test]
    fn sort_is_total_and_deterministic() {
        let mut a = vec![
            make_match("zlib", "1.2.13", "nvd:cpe", "CVE-2023-0002"),
            make_match("openssl", "1.1.1n", "nvd:cpe", "CVE-2022-3602"),
            make_match("openssl", "1.1.1n", "debian:distro:debian:11", "CVE-2022-3602"),
            make_match("openssl", "1.1.1k", "nvd:cpe", "CVE-2022-3602"),
        ];
        let mut b = a.clone();
        b.reverse();

        sort_matches(&mut a);
        sort_matches(&mut b);

        let keys: Vec<_> = a.iter().map(|m| sort_key(m)).map(|k| format!("{k:?}")).collect();
        let keys_b: Vec<_> = b.iter().map(|m| sort_key(m)).map(|k| format!("{k:?}")).collect();
        assert_eq!(keys, keys_b);
        assert_eq!(a[0].package.name, "openssl");
        assert_eq!(a[0].package.version, "1.1.1k");
        assert_eq!(a[1].vulnerability.namespace, "debian:distro:debian:11");
    }

    #[test]
    fn assemble_rules_rejects_bad_rules() {
        let mut config = ScanConfig::new("/tmp/none.db");
        config.ignore_rules = vec![IgnoreRule::default()];
        let err = assemble_rules(&config).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn assemble_rules_rejects_missing_vex_document() {
        let mut config = ScanConfig::new("/tmp/none.db");
        config.vex_paths = vec!["/definitely/not/here.vex.json".into()];
        let err = assemble_rules(&config).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }
}
