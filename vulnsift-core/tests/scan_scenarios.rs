// ---------------------------------------------------------------------------
// End-to-end scan scenarios
// ---------------------------------------------------------------------------
//
// Each test builds a database in a temp directory, closes it (dropping the
// query indices, as a shipped artifact would), reopens it read-only through
// the scan path, and checks the report document.

use std::path::PathBuf;

use tempfile::TempDir;

use tokio_util::sync::CancellationToken;
use vulnsift_core::{
    EXIT_CLEAN, EXIT_FAIL_ON, ScanConfig, exit_code, run_scan, run_scan_cancellable,
};
use vulnsift_db::VulnStore;
use vulnsift_types::{
    Cpe, Distro, Fix, FixState, IgnoreRule, KevRecord, MatchKind, Package, PackageType, Severity,
    SeverityBucket, SeverityScheme, UpstreamPackage, VersionScheme, Vulnerability,
};

fn debian_openssl_record() -> Vulnerability {
    Vulnerability {
        id: "CVE-2022-3602".into(),
        namespace: "debian:distro:debian:11".into(),
        constraint: "<1.1.1n-0+deb11u4".into(),
        scheme: VersionScheme::Deb,
        fix: Fix {
            state: FixState::Fixed,
            versions: vec!["1.1.1n-0+deb11u4".into()],
        },
        severities: vec![Severity::cvss(SeverityScheme::CvssV3, 7.5)],
        ..Vulnerability::default()
    }
}

fn build_db(dir: &TempDir, seed: impl FnOnce(&VulnStore)) -> PathBuf {
    let path = dir.path().join("vulnsift.db");
    let store = VulnStore::create(&path).unwrap();
    store.set_metadata("build_time", "2024-06-01T00:00:00Z").unwrap();
    seed(&store);
    store.close().unwrap();
    path
}

fn deb_package(name: &str, version: &str) -> Package {
    Package {
        id: format!("{name}@{version}"),
        name: name.into(),
        version: version.into(),
        kind: PackageType::Deb,
        distro: Some(Distro::new("debian", "11")),
        ..Package::default()
    }
}

#[tokio::test]
async fn debian_direct_match() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan(&config, &packages).await.unwrap();

    assert_eq!(report.matches.len(), 1);
    let m = &report.matches[0];
    assert_eq!(m.vulnerability.id, "CVE-2022-3602");
    assert_eq!(m.match_details.len(), 1);
    assert_eq!(m.match_details[0].kind, MatchKind::ExactDirect);
    assert_eq!(m.match_details[0].confidence, 1.0);
    assert_eq!(m.severity, SeverityBucket::High);
    assert!(report.ignored_matches.is_empty());
}

#[tokio::test]
async fn upstream_source_expansion() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let mut pkg = deb_package("libssl1.1", "1.1.1n-0+deb11u3");
    pkg.upstreams = vec![UpstreamPackage {
        name: "openssl".into(),
        version: None,
    }];
    let report = run_scan(&config, &[pkg]).await.unwrap();

    assert_eq!(report.matches.len(), 1);
    let detail = &report.matches[0].match_details[0];
    assert_eq!(detail.kind, MatchKind::ExactIndirect);
    // The installed binary identity is what was searched by; the upstream
    // source identity is recorded alongside it.
    assert_eq!(detail.searched_by.package.name, "libssl1.1");
    assert_eq!(detail.searched_by.upstream.as_ref().unwrap().name, "openssl");
}

#[tokio::test]
async fn cpe_only_match() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        let vuln = Vulnerability {
            id: "CVE-2022-30184".into(),
            namespace: "nvd:cpe".into(),
            constraint: "<4.11.4".into(),
            scheme: VersionScheme::Fuzzy,
            ..Vulnerability::default()
        };
        store
            .insert_vulnerability_for_cpe(&vuln, &Cpe::parse("cpe:2.3:a:jenkins:git:*").unwrap())
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let pkg = Package {
        id: "jenkins-git".into(),
        name: "git".into(),
        version: "4.11.3".into(),
        cpes: vec![Cpe::parse("cpe:2.3:a:jenkins:git:4.11.3:*:*:*:*:*:*:*").unwrap()],
        ..Package::default()
    };
    let report = run_scan(&config, &[pkg]).await.unwrap();

    assert_eq!(report.matches.len(), 1);
    let detail = &report.matches[0].match_details[0];
    assert_eq!(detail.kind, MatchKind::Cpe);
    assert_eq!(detail.confidence, 0.9);
}

#[tokio::test]
async fn unknown_version_is_skipped() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let packages = vec![deb_package("openssl", "unknown")];
    let report = run_scan(&config, &packages).await.unwrap();

    assert!(report.matches.is_empty());
    assert!(report.ignored_matches.is_empty());
}

#[tokio::test]
async fn ignore_by_fix_state() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        let mut record = debian_openssl_record();
        record.fix = Fix {
            state: FixState::WontFix,
            versions: vec![],
        };
        store
            .insert_vulnerability_for_package(&record, "openssl", "deb", Some(("debian", "11")))
            .unwrap();
    });

    let mut config = ScanConfig::new(db);
    config.ignore_rules = vec![IgnoreRule {
        fix_state: Some(FixState::WontFix),
        ..IgnoreRule::default()
    }];
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan(&config, &packages).await.unwrap();

    assert!(report.matches.is_empty());
    assert_eq!(report.ignored_matches.len(), 1);
    let entry = &report.ignored_matches[0];
    assert_eq!(entry.matched.vulnerability.id, "CVE-2022-3602");
    assert_eq!(entry.applied_ignore_rules.len(), 1);
    assert_eq!(
        entry.applied_ignore_rules[0].fix_state,
        Some(FixState::WontFix)
    );
}

#[tokio::test]
async fn kb_supersedence_governs_windows_matches() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store.insert_kb_supersedence("KB5005565", "KB5006670").unwrap();
        store
            .insert_vulnerability_for_package(
                &Vulnerability {
                    id: "CVE-2021-40449".into(),
                    namespace: "msrc:kb".into(),
                    constraint: "<KB5006670".into(),
                    scheme: VersionScheme::Kb,
                    ..Vulnerability::default()
                },
                "10816",
                "kb",
                None,
            )
            .unwrap();
        store
            .insert_vulnerability_for_package(
                &Vulnerability {
                    id: "CVE-2021-99999".into(),
                    namespace: "msrc:kb".into(),
                    constraint: "<KB5005565".into(),
                    scheme: VersionScheme::Kb,
                    ..Vulnerability::default()
                },
                "10816",
                "kb",
                None,
            )
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let pkg = Package {
        id: "win-10816".into(),
        name: "10816".into(),
        version: "KB5005565".into(),
        kind: PackageType::Kb,
        ..Package::default()
    };
    let report = run_scan(&config, &[pkg]).await.unwrap();

    // KB5005565 precedes KB5006670 in the supersedence chain, so only the
    // `<KB5006670` record matches; `<KB5005565` does not.
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].vulnerability.id, "CVE-2021-40449");
}

#[tokio::test]
async fn determinism_two_runs_byte_identical() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
        store
            .insert_vulnerability_for_package(
                &Vulnerability {
                    id: "CVE-2023-0464".into(),
                    namespace: "debian:distro:debian:11".into(),
                    constraint: "<1.1.1n-0+deb11u5".into(),
                    scheme: VersionScheme::Deb,
                    ..Vulnerability::default()
                },
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
        store
            .insert_known_exploited(&KevRecord {
                cve: "CVE-2022-3602".into(),
                date_added: "2022-11-01".into(),
                known_ransomware: false,
            })
            .unwrap();
    });

    let config = ScanConfig::new(db);
    // Enough packages to keep the pool busy in arbitrary orders.
    let packages: Vec<Package> = (0..16)
        .map(|i| {
            let mut p = deb_package("openssl", "1.1.1n-0+deb11u3");
            p.id = format!("openssl-{i}");
            p
        })
        .collect();

    let first = run_scan(&config, &packages).await.unwrap();
    let second = run_scan(&config, &packages).await.unwrap();
    let first_json = serde_json::to_string_pretty(&first).unwrap();
    let second_json = serde_json::to_string_pretty(&second).unwrap();
    assert_eq!(first_json, second_json);
    assert_eq!(first.matches.len(), 32);
}

#[tokio::test]
async fn conservation_across_ignore_partition() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        let mut wontfix = debian_openssl_record();
        wontfix.fix.state = FixState::WontFix;
        store
            .insert_vulnerability_for_package(&wontfix, "openssl", "deb", Some(("debian", "11")))
            .unwrap();
        store
            .insert_vulnerability_for_package(
                &Vulnerability {
                    id: "CVE-2023-0464".into(),
                    namespace: "debian:distro:debian:11".into(),
                    constraint: "<9.9".into(),
                    scheme: VersionScheme::Deb,
                    fix: Fix {
                        state: FixState::Fixed,
                        versions: vec!["9.9".into()],
                    },
                    ..Vulnerability::default()
                },
                "zlib1g",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let mut config = ScanConfig::new(db);
    config.ignore_rules = vec![IgnoreRule {
        fix_state: Some(FixState::WontFix),
        ..IgnoreRule::default()
    }];
    let packages = vec![
        deb_package("openssl", "1.1.1n-0+deb11u3"),
        deb_package("zlib1g", "1.2.13"),
    ];
    let report = run_scan(&config, &packages).await.unwrap();

    // |matches| + |ignoredMatches| equals the pre-ignore total; every
    // ignored entry lists at least one applied rule.
    assert_eq!(report.matches.len() + report.ignored_matches.len(), 2);
    assert!(
        report
            .ignored_matches
            .iter()
            .all(|e| !e.applied_ignore_rules.is_empty())
    );
    let kept_ids: Vec<&str> = report
        .matches
        .iter()
        .map(|m| m.vulnerability.id.as_str())
        .collect();
    assert!(!kept_ids.contains(&"CVE-2022-3602"));
    assert!(kept_ids.contains(&"CVE-2023-0464"));
}

#[tokio::test]
async fn enrichment_attaches_kev_and_epss() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
        store
            .insert_known_exploited(&KevRecord {
                cve: "CVE-2022-3602".into(),
                date_added: "2022-11-01".into(),
                known_ransomware: false,
            })
            .unwrap();
        store
            .insert_epss(&vulnsift_types::EpssRecord {
                cve: "CVE-2022-3602".into(),
                score: 0.42,
                percentile: 0.91,
                date: "2024-05-01".into(),
            })
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan(&config, &packages).await.unwrap();

    let m = &report.matches[0];
    assert_eq!(m.kev.as_ref().unwrap().date_added, "2022-11-01");
    let epss = m.epss.as_ref().unwrap();
    assert!((epss.score - 0.42).abs() < f64::EPSILON);
    assert!((epss.percentile - 0.91).abs() < f64::EPSILON);
}

#[tokio::test]
async fn fail_on_threshold_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let mut config = ScanConfig::new(db);
    config.fail_on_severity = Some(SeverityBucket::High);
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let result = run_scan(&config, &packages).await;

    // The report is still emitted; only the exit kind changes.
    assert!(result.as_ref().unwrap().matches.len() == 1);
    assert_eq!(exit_code(&result, config.fail_on_severity), EXIT_FAIL_ON);
    assert_eq!(exit_code(&result, Some(SeverityBucket::Critical)), EXIT_CLEAN);
}

#[tokio::test]
async fn vex_document_suppresses_and_affected_overrides() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let vex_path = dir.path().join("statement.vex.json");
    std::fs::write(
        &vex_path,
        r#"{
            "statements": [
                {
                    "vulnerability": {"name": "CVE-2022-3602"},
                    "products": [{"@id": "pkg:deb/debian/openssl@1.1.1n-0+deb11u3"}],
                    "status": "not_affected",
                    "justification": "vulnerable_code_not_present"
                }
            ]
        }"#,
    )
    .unwrap();

    let mut config = ScanConfig::new(db);
    config.vex_paths = vec![vex_path];
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan(&config, &packages).await.unwrap();
    assert!(report.matches.is_empty());
    assert_eq!(report.ignored_matches.len(), 1);

    // An affected statement for the same CVE forces retention.
    config.ignore_rules = vec![IgnoreRule {
        vulnerability: Some("CVE-2022-3602".into()),
        vex_status: Some(vulnsift_types::VexStatus::Affected),
        ..IgnoreRule::default()
    }];
    let report = run_scan(&config, &packages).await.unwrap();
    assert_eq!(report.matches.len(), 1);
    assert!(report.ignored_matches.is_empty());
}

#[tokio::test]
async fn cancelled_scan_emits_no_partial_packages() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let config = ScanConfig::new(db);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan_cancellable(&config, &packages, cancel)
        .await
        .unwrap();

    // Every package was skipped at the boundary; the report is well-formed
    // but empty.
    assert!(report.matches.is_empty());
    assert!(report.ignored_matches.is_empty());
}

#[tokio::test]
async fn schema_mismatch_aborts_with_distinct_kind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vulnsift.db");
    {
        let store = VulnStore::create(&path).unwrap();
        store.set_metadata("model", "99").unwrap();
        store.close().unwrap();
    }

    let config = ScanConfig::new(path);
    let result = run_scan(&config, &[deb_package("openssl", "1.0")]).await;
    let err = result.err().unwrap();
    assert!(err.is_schema_mismatch());
    assert!(err.to_string().contains("not a v1 database"));
}

#[tokio::test]
async fn report_document_shape() {
    let dir = TempDir::new().unwrap();
    let db = build_db(&dir, |store| {
        store
            .insert_vulnerability_for_package(
                &debian_openssl_record(),
                "openssl",
                "deb",
                Some(("debian", "11")),
            )
            .unwrap();
    });

    let mut config = ScanConfig::new(db);
    config.source = vulnsift_types::SourceDescription {
        name: "debian:11-slim".into(),
        kind: "image".into(),
    };
    config.distro = Some(vulnsift_types::DistroDescription {
        name: "debian".into(),
        version: "11".into(),
        id_like: vec![],
    });

    let packages = vec![deb_package("openssl", "1.1.1n-0+deb11u3")];
    let report = run_scan(&config, &packages).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert!(json.get("matches").is_some());
    assert!(json.get("ignoredMatches").is_some());
    assert_eq!(json["source"]["type"], "image");
    assert_eq!(json["distro"]["name"], "debian");
    assert_eq!(json["descriptor"]["name"], "vulnsift");
    assert_eq!(json["descriptor"]["db"]["schemaVersion"], 1);
    assert_eq!(json["descriptor"]["db"]["built"], "2024-06-01T00:00:00Z");
    let details = &json["matches"][0]["matchDetails"][0];
    assert_eq!(details["type"], "exact-direct");
    assert_eq!(details["matcher"], "dpkg-matcher");
    assert_eq!(details["found"]["vulnerabilityID"], "CVE-2022-3602");
}
