use serde::{Deserialize, Serialize};

use crate::ignore::IgnoreRule;
use crate::matched::{EpssRecord, KevRecord, Match, MatchDetail};
use crate::package::Package;
use crate::severity::SeverityBucket;
use crate::vulnerability::Vulnerability;

/// The result document handed to presenters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub matches: Vec<ReportedMatch>,
    pub ignored_matches: Vec<IgnoredMatch>,
    pub source: SourceDescription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<DistroDescription>,
    pub descriptor: Descriptor,
}

/// One surviving finding in presenter shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedMatch {
    pub vulnerability: Vulnerability,
    pub artifact: Package,
    pub match_details: Vec<MatchDetail>,
    pub related_vulnerabilities: Vec<String>,
    pub severity: SeverityBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kev: Option<KevRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epss: Option<EpssRecord>,
}

impl From<Match> for ReportedMatch {
    fn from(m: Match) -> Self {
        Self {
            related_vulnerabilities: m.vulnerability.related_ids.clone(),
            vulnerability: m.vulnerability,
            artifact: m.package,
            match_details: m.details,
            severity: m.severity,
            kev: m.kev,
            epss: m.epss,
        }
    }
}

/// A finding suppressed by the ignore pipeline, together with every rule
/// that suppressed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredMatch {
    #[serde(rename = "match")]
    pub matched: ReportedMatch,
    pub applied_ignore_rules: Vec<IgnoreRule>,
}

/// What was scanned (an image reference, a directory, an SBOM file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// OS release detected in the scanned source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistroDescription {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub id_like: Vec<String>,
}

/// Tool and database provenance for the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub version: String,
    pub db: DbDescriptor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDescriptor {
    pub built: String,
    pub schema_version: i64,
    pub location: String,
    pub checksum: String,
}
