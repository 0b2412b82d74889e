use std::fmt;

use serde::{Deserialize, Serialize};

use crate::package::{Distro, Package};
use crate::severity::SeverityBucket;
use crate::vulnerability::Vulnerability;

/// A single finding: one vulnerability applied to one package, justified by
/// one or more match details.
///
/// Matches are created by matchers, mutated only during merge (detail
/// concatenation, fix/severity back-fill, enrichment), and frozen before the
/// ignore filter runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub vulnerability: Vulnerability,
    pub package: Package,
    pub details: Vec<MatchDetail>,
    /// Effective severity, computed during aggregation.
    #[serde(default)]
    pub severity: SeverityBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kev: Option<KevRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epss: Option<EpssRecord>,
}

impl Match {
    /// De-duplication key: `(package.id, vulnerability.id, namespace)`
    /// uniquely identifies the source record applied to the package.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.package.id.clone(),
            self.vulnerability.id.clone(),
            self.vulnerability.namespace.clone(),
        )
    }
}

/// How a match was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub matcher: MatcherType,
    pub searched_by: SearchedBy,
    pub found: Found,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    /// The installed package identity matched the record directly.
    ExactDirect,
    /// A declared upstream (source) package matched the record.
    ExactIndirect,
    /// The match came from CPE expansion.
    Cpe,
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::ExactDirect => "exact-direct",
            MatchKind::ExactIndirect => "exact-indirect",
            MatchKind::Cpe => "cpe",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the matcher that produced a detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherType {
    ApkMatcher,
    DpkgMatcher,
    RpmMatcher,
    JavaMatcher,
    JavascriptMatcher,
    PythonMatcher,
    RubyMatcher,
    GoMatcher,
    DotnetMatcher,
    RustMatcher,
    PortageMatcher,
    BitnamiMatcher,
    MsrcMatcher,
    StockMatcher,
    CpeMatcher,
}

impl MatcherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherType::ApkMatcher => "apk-matcher",
            MatcherType::DpkgMatcher => "dpkg-matcher",
            MatcherType::RpmMatcher => "rpm-matcher",
            MatcherType::JavaMatcher => "java-matcher",
            MatcherType::JavascriptMatcher => "javascript-matcher",
            MatcherType::PythonMatcher => "python-matcher",
            MatcherType::RubyMatcher => "ruby-matcher",
            MatcherType::GoMatcher => "go-matcher",
            MatcherType::DotnetMatcher => "dotnet-matcher",
            MatcherType::RustMatcher => "rust-matcher",
            MatcherType::PortageMatcher => "portage-matcher",
            MatcherType::BitnamiMatcher => "bitnami-matcher",
            MatcherType::MsrcMatcher => "msrc-matcher",
            MatcherType::StockMatcher => "stock-matcher",
            MatcherType::CpeMatcher => "cpe-matcher",
        }
    }
}

impl fmt::Display for MatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the matcher searched with. For indirect matches both the installed
/// binary package and the upstream source identity are recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchedBy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<DistroRef>,
    /// The installed package identity as it appears in the inventory.
    pub package: PackageRef,
    pub namespace: String,
    /// The upstream (source) identity actually used in the query, when the
    /// match is indirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<PackageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpe: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

impl From<&Distro> for DistroRef {
    fn from(d: &Distro) -> Self {
        Self {
            kind: d.kind.clone(),
            version: d.version.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

/// What the search found: the record identity and its constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Found {
    #[serde(rename = "vulnerabilityID")]
    pub vulnerability_id: String,
    pub version_constraint: String,
}

/// A CISA Known Exploited Vulnerabilities catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KevRecord {
    pub cve: String,
    #[serde(default)]
    pub date_added: String,
    #[serde(default)]
    pub known_ransomware: bool,
}

/// An EPSS probability record; score and percentile are copied verbatim
/// from the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpssRecord {
    pub cve: String,
    pub score: f64,
    pub percentile: f64,
    #[serde(default)]
    pub date: String,
}
