// ---------------------------------------------------------------------------
// Ignore/exclusion engine
// ---------------------------------------------------------------------------

use tracing::warn;

use vulnsift_types::{IgnoreRule, Match, VexStatus};

use crate::error::MatchError;

/// A suppressed match and every rule that suppressed it.
#[derive(Debug, Clone)]
pub struct IgnoredEntry {
    pub matched: Match,
    pub applied_rules: Vec<IgnoreRule>,
}

/// Validate rules before the scan starts: a rule with no criteria or an
/// unparseable location glob is a configuration error.
pub fn validate_rules(rules: &[IgnoreRule]) -> Result<(), MatchError> {
    for rule in rules {
        if rule.has_no_criteria() {
            return Err(MatchError::IgnoreRule(
                "rule has no matching criteria".to_string(),
            ));
        }
        if let Some(pattern) = &rule.package_location
            && glob::Pattern::new(pattern).is_err()
        {
            return Err(MatchError::IgnoreRule(format!(
                "invalid location glob {pattern:?}"
            )));
        }
    }
    Ok(())
}

/// Partition matches into `(kept, ignored)`.
///
/// A match is suppressed iff every populated field of some suppressing rule
/// matches it. A matching VEX `affected` rule forces retention even when
/// another rule would have suppressed the match.
pub fn apply_ignore_rules(
    matches: Vec<Match>,
    rules: &[IgnoreRule],
) -> (Vec<Match>, Vec<IgnoredEntry>) {
    let mut kept = Vec::new();
    let mut ignored = Vec::new();

    for m in matches {
        let applied: Vec<&IgnoreRule> = rules.iter().filter(|rule| rule_matches(rule, &m)).collect();
        let force_keep = applied
            .iter()
            .any(|rule| rule.vex_status == Some(VexStatus::Affected));
        let suppressing: Vec<IgnoreRule> = applied
            .iter()
            .filter(|rule| is_suppressing(rule))
            .map(|rule| (*rule).clone())
            .collect();

        if !force_keep && !suppressing.is_empty() {
            ignored.push(IgnoredEntry {
                matched: m,
                applied_rules: suppressing,
            });
        } else {
            kept.push(m);
        }
    }

    (kept, ignored)
}

/// `affected` and `under_investigation` VEX statements never suppress;
/// plain ignore rules and `not_affected`/`fixed` statements do.
fn is_suppressing(rule: &IgnoreRule) -> bool {
    match rule.vex_status {
        None => true,
        Some(VexStatus::NotAffected) | Some(VexStatus::Fixed) => true,
        Some(VexStatus::Affected) | Some(VexStatus::UnderInvestigation) => false,
    }
}

fn rule_matches(rule: &IgnoreRule, m: &Match) -> bool {
    if rule.has_no_criteria() {
        return false;
    }
    if let Some(vuln_id) = &rule.vulnerability
        && !vuln_id.eq_ignore_ascii_case(&m.vulnerability.id)
    {
        return false;
    }
    if let Some(fix_state) = rule.fix_state
        && fix_state != m.vulnerability.fix.state
    {
        return false;
    }
    if let Some(name) = &rule.package_name
        && name != &m.package.name
    {
        return false;
    }
    if let Some(version) = &rule.package_version
        && version != &m.package.version
    {
        return false;
    }
    if let Some(kind) = rule.package_type
        && kind != m.package.kind
    {
        return false;
    }
    if let Some(namespace) = &rule.namespace
        && namespace != &m.vulnerability.namespace
    {
        return false;
    }
    if let Some(location) = &rule.package_location {
        let pattern = match glob::Pattern::new(location) {
            Ok(p) => p,
            Err(e) => {
                // Rules are validated up front; tolerate a stray bad glob
                // rather than suppressing on garbage.
                warn!(pattern = location, error = %e, "unparseable location glob in ignore rule");
                return false;
            }
        };
        if !m.package.locations.iter().any(|loc| pattern.matches(loc)) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnsift_types::{Fix, FixState, Package, PackageType, SeverityBucket, Vulnerability};

    fn sample_match(fix: FixState) -> Match {
        Match {
            vulnerability: Vulnerability {
                id: "CVE-2022-3602".into(),
                namespace: "debian:distro:debian:11".into(),
                fix: Fix {
                    state: fix,
                    versions: vec![],
                },
                ..Vulnerability::default()
            },
            package: Package {
                id: "p1".into(),
                name: "openssl".into(),
                version: "1.1.1n-0+deb11u3".into(),
                kind: PackageType::Deb,
                locations: vec!["/usr/lib/ssl/libssl.so".into()],
                ..Package::default()
            },
            details: vec![],
            severity: SeverityBucket::Unknown,
            kev: None,
            epss: None,
        }
    }

    #[test]
    fn fix_state_rule_partitions() {
        let rules = vec![IgnoreRule {
            fix_state: Some(FixState::WontFix),
            ..IgnoreRule::default()
        }];
        let (kept, ignored) =
            apply_ignore_rules(vec![sample_match(FixState::WontFix)], &rules);
        assert!(kept.is_empty());
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].applied_rules.len(), 1);

        let (kept, ignored) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert_eq!(kept.len(), 1);
        assert!(ignored.is_empty());
    }

    #[test]
    fn all_populated_fields_must_match() {
        let rules = vec![IgnoreRule {
            vulnerability: Some("CVE-2022-3602".into()),
            package_name: Some("nginx".into()),
            ..IgnoreRule::default()
        }];
        // Vulnerability matches but package does not: kept.
        let (kept, ignored) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert_eq!(kept.len(), 1);
        assert!(ignored.is_empty());
    }

    #[test]
    fn vulnerability_id_is_case_insensitive() {
        let rules = vec![IgnoreRule {
            vulnerability: Some("cve-2022-3602".into()),
            ..IgnoreRule::default()
        }];
        let (kept, ignored) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert!(kept.is_empty());
        assert_eq!(ignored.len(), 1);
    }

    #[test]
    fn location_glob_rule() {
        let rules = vec![IgnoreRule {
            package_location: Some("/usr/lib/ssl/*".into()),
            ..IgnoreRule::default()
        }];
        let (kept, ignored) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert!(kept.is_empty());
        assert_eq!(ignored.len(), 1);

        let rules = vec![IgnoreRule {
            package_location: Some("/opt/**".into()),
            ..IgnoreRule::default()
        }];
        let (kept, _) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn vex_not_affected_suppresses_affected_retains() {
        let suppress = IgnoreRule {
            vulnerability: Some("CVE-2022-3602".into()),
            vex_status: Some(VexStatus::NotAffected),
            ..IgnoreRule::default()
        };
        let (kept, ignored) =
            apply_ignore_rules(vec![sample_match(FixState::Fixed)], &[suppress.clone()]);
        assert!(kept.is_empty());
        assert_eq!(ignored.len(), 1);

        // An `affected` statement overrides the suppression.
        let retain = IgnoreRule {
            vulnerability: Some("CVE-2022-3602".into()),
            vex_status: Some(VexStatus::Affected),
            ..IgnoreRule::default()
        };
        let (kept, ignored) =
            apply_ignore_rules(vec![sample_match(FixState::Fixed)], &[suppress, retain]);
        assert_eq!(kept.len(), 1);
        assert!(ignored.is_empty());
    }

    #[test]
    fn under_investigation_does_not_suppress() {
        let rules = vec![IgnoreRule {
            vulnerability: Some("CVE-2022-3602".into()),
            vex_status: Some(VexStatus::UnderInvestigation),
            ..IgnoreRule::default()
        }];
        let (kept, ignored) = apply_ignore_rules(vec![sample_match(FixState::Fixed)], &rules);
        assert_eq!(kept.len(), 1);
        assert!(ignored.is_empty());
    }

    #[test]
    fn conservation_no_entry_in_both_sets() {
        let rules = vec![
            IgnoreRule {
                fix_state: Some(FixState::WontFix),
                ..IgnoreRule::default()
            },
            IgnoreRule {
                package_name: Some("openssl".into()),
                ..IgnoreRule::default()
            },
        ];
        let input = vec![
            sample_match(FixState::WontFix),
            sample_match(FixState::Fixed),
        ];
        let total = input.len();
        let (kept, ignored) = apply_ignore_rules(input, &rules);
        assert_eq!(kept.len() + ignored.len(), total);
        // The wont-fix match collected both applicable rules.
        assert_eq!(ignored[0].applied_rules.len(), 2);
    }

    #[test]
    fn validation_rejects_empty_rules_and_bad_globs() {
        assert!(validate_rules(&[IgnoreRule::default()]).is_err());
        assert!(
            validate_rules(&[IgnoreRule {
                package_location: Some("[".into()),
                package_name: Some("x".into()),
                ..IgnoreRule::default()
            }])
            .is_err()
        );
        assert!(
            validate_rules(&[IgnoreRule {
                vulnerability: Some("CVE-2024-0001".into()),
                ..IgnoreRule::default()
            }])
            .is_ok()
        );
    }
}
