use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::severity::{Severity, SeverityBucket};

/// A vulnerability record as returned by the provider.
///
/// This is the merged read-side view: identity and severity columns come
/// from the `vulnerability` table, the constraint/fix columns from the
/// `affected_package` or `affected_cpe` row that selected it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    /// Provenance and applicability label, e.g. `"nvd:cpe"`,
    /// `"debian:distro:debian:11"`, `"github:language:python"`.
    pub namespace: String,
    /// Textual version expression interpreted under `scheme`. Empty means
    /// the record applies to every version.
    #[serde(default)]
    pub constraint: String,
    #[serde(default)]
    pub scheme: VersionScheme,
    #[serde(default)]
    pub qualifiers: Qualifiers,
    #[serde(default)]
    pub fix: Fix,
    #[serde(default)]
    pub severities: Vec<Severity>,
    #[serde(default)]
    pub related_ids: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Vulnerability {
    /// Effective severity bucket: the value from the highest-precedence
    /// severity scheme present (CVSS v4 > v3 > v2 > vendor string), taking
    /// the maximum score within that scheme.
    pub fn effective_severity(&self) -> SeverityBucket {
        let Some(best_scheme) = self
            .severities
            .iter()
            .map(|s| s.scheme)
            .max_by_key(|s| s.precedence())
        else {
            return SeverityBucket::Unknown;
        };
        self.severities
            .iter()
            .filter(|s| s.scheme == best_scheme)
            .map(Severity::bucket)
            .max_by_key(|b| b.rank())
            .unwrap_or(SeverityBucket::Unknown)
    }
}

/// Record-level qualifiers consulted before version evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualifiers {
    /// RPM modularity label (`"nodejs:16"`) the record is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm_modularity: Option<String>,
    /// Platform CPEs the record is scoped to (e.g. a RHEL product CPE).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platform_cpes: Vec<String>,
}

impl Qualifiers {
    pub fn is_empty(&self) -> bool {
        self.rpm_modularity.is_none() && self.platform_cpes.is_empty()
    }
}

/// Fix availability for a vulnerability record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub state: FixState,
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixState {
    Fixed,
    NotFixed,
    WontFix,
    #[default]
    Unknown,
}

impl FixState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixState::Fixed => "fixed",
            FixState::NotFixed => "not-fixed",
            FixState::WontFix => "wont-fix",
            FixState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FixState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FixState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(FixState::Fixed),
            "not-fixed" => Ok(FixState::NotFixed),
            "wont-fix" => Ok(FixState::WontFix),
            "unknown" => Ok(FixState::Unknown),
            _ => Err(()),
        }
    }
}

/// The versioning discipline a constraint is interpreted under.
///
/// Schemes are genuinely incompatible; cross-scheme comparison is undefined
/// and never attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    Semver,
    Apk,
    Deb,
    Rpm,
    Maven,
    #[serde(rename = "python")]
    Pep440,
    Gem,
    Golang,
    Portage,
    Kb,
    #[default]
    Fuzzy,
}

impl VersionScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionScheme::Semver => "semver",
            VersionScheme::Apk => "apk",
            VersionScheme::Deb => "deb",
            VersionScheme::Rpm => "rpm",
            VersionScheme::Maven => "maven",
            VersionScheme::Pep440 => "python",
            VersionScheme::Gem => "gem",
            VersionScheme::Golang => "golang",
            VersionScheme::Portage => "portage",
            VersionScheme::Kb => "kb",
            VersionScheme::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a scheme tag the implementation does not know.
#[derive(Debug, thiserror::Error)]
#[error("unsupported version scheme {0:?}")]
pub struct UnknownScheme(pub String);

impl FromStr for VersionScheme {
    type Err = UnknownScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semver" => Ok(VersionScheme::Semver),
            "apk" => Ok(VersionScheme::Apk),
            "deb" | "dpkg" => Ok(VersionScheme::Deb),
            "rpm" => Ok(VersionScheme::Rpm),
            "maven" => Ok(VersionScheme::Maven),
            "python" | "pep440" => Ok(VersionScheme::Pep440),
            "gem" => Ok(VersionScheme::Gem),
            "golang" | "go" => Ok(VersionScheme::Golang),
            "portage" => Ok(VersionScheme::Portage),
            "kb" => Ok(VersionScheme::Kb),
            "fuzzy" | "unknown" | "" => Ok(VersionScheme::Fuzzy),
            other => Err(UnknownScheme(other.to_string())),
        }
    }
}
