// ---------------------------------------------------------------------------
// Aggregation and de-duplication
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use tracing::warn;

use vulnsift_types::{FixState, Match, MatchKind};

/// Merge raw matches on `(package.id, vulnerability.id, namespace)`.
///
/// Details concatenate in arrival order with duplicates dropped, fix state
/// resolves distro-over-CPE then concrete-over-unknown, and the effective
/// severity bucket is computed from the record's severities. Running the
/// merge twice over its own output yields the same result.
pub fn merge_matches(all: Vec<Match>) -> Vec<Match> {
    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut merged: HashMap<(String, String, String), Match> = HashMap::new();

    for m in all {
        let key = m.dedup_key();
        match merged.get_mut(&key) {
            Some(existing) => merge_into(existing, m),
            None => {
                order.push(key.clone());
                merged.insert(key, m);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .map(|mut m| {
            m.severity = m.vulnerability.effective_severity();
            m
        })
        .collect()
}

fn merge_into(dst: &mut Match, src: Match) {
    if fix_rank(&src) > fix_rank(dst) {
        if dst.vulnerability.fix.state != FixState::Unknown
            && src.vulnerability.fix.state != dst.vulnerability.fix.state
        {
            warn!(
                vulnerability = %dst.vulnerability.id,
                package = %dst.package.name,
                kept = %src.vulnerability.fix.state,
                dropped = %dst.vulnerability.fix.state,
                "conflicting fix states across matchers"
            );
        }
        dst.vulnerability.fix = src.vulnerability.fix.clone();
    }

    // Back-fill severities from a source that has them when the kept record
    // does not (a CPE record often carries CVSS the distro record lacks).
    if dst.vulnerability.severities.is_empty() && !src.vulnerability.severities.is_empty() {
        dst.vulnerability.severities = src.vulnerability.severities.clone();
    }

    for detail in src.details {
        if !dst.details.contains(&detail) {
            dst.details.push(detail);
        }
    }
}

/// Fix precedence: any concrete state beats unknown, then distro-sourced
/// beats CPE-sourced, remaining ties go to the highest detail confidence.
fn fix_rank(m: &Match) -> (u8, u8, u64) {
    let source = if m
        .details
        .iter()
        .any(|d| matches!(d.kind, MatchKind::ExactDirect | MatchKind::ExactIndirect))
    {
        2
    } else {
        1
    };
    let state = match m.vulnerability.fix.state {
        FixState::Unknown => 0,
        _ => 1,
    };
    let confidence = m
        .details
        .iter()
        .map(|d| (d.confidence * 1000.0) as u64)
        .max()
        .unwrap_or(0);
    (state, source, confidence)
}
