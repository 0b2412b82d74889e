use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cpe::Cpe;

/// A normalized package from the SBOM inventory.
///
/// Packages are immutable within one scan; matchers only read them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    /// Stable identity within the inventory (assigned by the SBOM producer).
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type", default)]
    pub kind: PackageType,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub cpes: Vec<Cpe>,
    #[serde(default)]
    pub purl: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub licenses: Vec<String>,
    /// Source packages this binary package was built from (e.g. the SRPM for
    /// an RPM, or the Debian source package for a .deb).
    #[serde(default)]
    pub upstreams: Vec<UpstreamPackage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro: Option<Distro>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Package {
    /// True when the inventory could not determine an installed version.
    /// Such packages are skipped entirely by the dispatcher.
    pub fn has_unknown_version(&self) -> bool {
        self.version.is_empty() || self.version.eq_ignore_ascii_case("unknown")
    }
}

/// A source-level identity a binary package was built from.
///
/// Upstreams form a shallow list, never a chain: source packages are not
/// built from other binaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamPackage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The Linux distribution (or other OS release) a package belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distro {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default)]
    pub id_like: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codename: Option<String>,
}

impl Distro {
    pub fn new(kind: &str, version: &str) -> Self {
        Self {
            kind: kind.to_string(),
            version: version.to_string(),
            id_like: Vec::new(),
            codename: None,
        }
    }

    /// The major component of the release version ("11" for "11.6").
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or(&self.version)
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.version)
    }
}

/// Ecosystem tag of a package, mirroring the SBOM producer's catalogers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    Apk,
    Deb,
    Rpm,
    JavaArchive,
    Npm,
    Python,
    Gem,
    GoModule,
    Nuget,
    Cargo,
    Portage,
    Bitnami,
    Kb,
    #[default]
    Unknown,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Apk => "apk",
            PackageType::Deb => "deb",
            PackageType::Rpm => "rpm",
            PackageType::JavaArchive => "java-archive",
            PackageType::Npm => "npm",
            PackageType::Python => "python",
            PackageType::Gem => "gem",
            PackageType::GoModule => "go-module",
            PackageType::Nuget => "nuget",
            PackageType::Cargo => "cargo",
            PackageType::Portage => "portage",
            PackageType::Bitnami => "bitnami",
            PackageType::Kb => "kb",
            PackageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language of a package, used as a secondary dispatch key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Javascript,
    Python,
    Ruby,
    Go,
    Dotnet,
    Rust,
    #[default]
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Go => "go",
            Language::Dotnet => "dotnet",
            Language::Rust => "rust",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
