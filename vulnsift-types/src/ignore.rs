use serde::{Deserialize, Serialize};

use crate::package::PackageType;
use crate::vulnerability::FixState;

/// A rule that suppresses (or, for VEX `affected`, force-retains) matches.
///
/// A match is suppressed iff every populated field of the rule matches it.
/// A rule with no populated fields matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IgnoreRule {
    /// Vulnerability id (CVE or advisory id), compared case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_state: Option<FixState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
    /// Glob over the package's recorded locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vex_status: Option<VexStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IgnoreRule {
    /// True when no matching criterion is populated (`vex_status` and
    /// `reason` describe behavior, not criteria).
    pub fn has_no_criteria(&self) -> bool {
        self.vulnerability.is_none()
            && self.fix_state.is_none()
            && self.package_name.is_none()
            && self.package_version.is_none()
            && self.package_type.is_none()
            && self.package_location.is_none()
            && self.namespace.is_none()
    }
}

/// VEX statement status, as carried by an ignore rule derived from a VEX
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VexStatus {
    NotAffected,
    Affected,
    Fixed,
    UnderInvestigation,
}
