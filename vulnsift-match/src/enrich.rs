// ---------------------------------------------------------------------------
// KEV / EPSS enrichment
// ---------------------------------------------------------------------------

use vulnsift_db::VulnStore;
use vulnsift_types::Match;

use crate::error::MatchError;

/// Attach KEV and EPSS records to each surviving match.
///
/// KEV: the first record whose CVE equals the vulnerability id or any
/// related id. EPSS: the most recent record for the CVE. Enrichment never
/// alters match identity or the severity bucket.
pub fn enrich_matches(provider: &VulnStore, matches: &mut [Match]) -> Result<(), MatchError> {
    for m in matches {
        let ids = std::iter::once(&m.vulnerability.id).chain(m.vulnerability.related_ids.iter());
        for id in ids {
            let kev = provider.known_exploited(id).map_err(|e| {
                MatchError::provider(&m.package.name, format!("kev lookup cve={id}"), e)
            })?;
            if let Some(record) = kev {
                m.kev = Some(record);
                break;
            }
        }

        m.epss = provider.epss(&m.vulnerability.id).map_err(|e| {
            MatchError::provider(
                &m.package.name,
                format!("epss lookup cve={}", m.vulnerability.id),
                e,
            )
        })?;
    }
    Ok(())
}
