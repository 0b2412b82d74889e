use tracing::trace;

use vulnsift_db::VulnStore;
use vulnsift_types::{IgnoreRule, Language, Match, MatcherType, Package, PackageType};

use crate::cpe::match_package_by_cpes;
use crate::distro::match_package_by_distro;
use crate::error::MatchError;
use crate::language::{match_msrc, match_package_by_ecosystem, match_package_by_language};
use crate::registry::MatcherRegistry;

/// One matcher variant. Registration is a static table built at startup;
/// dispatch selects variants by package type, then language, then the stock
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Apk,
    Dpkg,
    Rpm,
    Java,
    Javascript,
    Python,
    Ruby,
    Go,
    Dotnet,
    Rust,
    Portage,
    Bitnami,
    Msrc,
    Stock,
    Cpe,
}

impl Matcher {
    pub fn kind(&self) -> MatcherType {
        match self {
            Matcher::Apk => MatcherType::ApkMatcher,
            Matcher::Dpkg => MatcherType::DpkgMatcher,
            Matcher::Rpm => MatcherType::RpmMatcher,
            Matcher::Java => MatcherType::JavaMatcher,
            Matcher::Javascript => MatcherType::JavascriptMatcher,
            Matcher::Python => MatcherType::PythonMatcher,
            Matcher::Ruby => MatcherType::RubyMatcher,
            Matcher::Go => MatcherType::GoMatcher,
            Matcher::Dotnet => MatcherType::DotnetMatcher,
            Matcher::Rust => MatcherType::RustMatcher,
            Matcher::Portage => MatcherType::PortageMatcher,
            Matcher::Bitnami => MatcherType::BitnamiMatcher,
            Matcher::Msrc => MatcherType::MsrcMatcher,
            Matcher::Stock => MatcherType::StockMatcher,
            Matcher::Cpe => MatcherType::CpeMatcher,
        }
    }

    /// The package types this matcher claims as primary handler.
    pub fn ecosystems_handled(&self) -> &'static [PackageType] {
        match self {
            Matcher::Apk => &[PackageType::Apk],
            Matcher::Dpkg => &[PackageType::Deb],
            Matcher::Rpm => &[PackageType::Rpm],
            Matcher::Java => &[PackageType::JavaArchive],
            Matcher::Javascript => &[PackageType::Npm],
            Matcher::Python => &[PackageType::Python],
            Matcher::Ruby => &[PackageType::Gem],
            Matcher::Go => &[PackageType::GoModule],
            Matcher::Dotnet => &[PackageType::Nuget],
            Matcher::Rust => &[PackageType::Cargo],
            Matcher::Portage => &[PackageType::Portage],
            Matcher::Bitnami => &[PackageType::Bitnami],
            Matcher::Msrc => &[PackageType::Kb],
            Matcher::Stock | Matcher::Cpe => &[],
        }
    }

    /// Run this matcher against one package. Matchers tolerate packages
    /// with no distro or no CPEs and return empty results in that case.
    pub fn find_matches(
        &self,
        provider: &VulnStore,
        pkg: &Package,
    ) -> Result<(Vec<Match>, Vec<IgnoreRule>), MatchError> {
        let matches = match self {
            Matcher::Apk => {
                // Alpine's secdb is sparse; NVD CPE records fill the gaps.
                let mut matches = match_package_by_distro(provider, pkg, self.kind())?;
                matches.extend(match_package_by_cpes(provider, pkg, self.kind())?);
                matches
            }
            Matcher::Dpkg | Matcher::Rpm | Matcher::Portage => {
                match_package_by_distro(provider, pkg, self.kind())?
            }
            Matcher::Java => {
                let mut primary =
                    match_package_by_language(provider, pkg, Language::Java, self.kind())?;
                fold_cpe_details(&mut primary);
                primary
            }
            Matcher::Javascript => {
                match_package_by_language(provider, pkg, Language::Javascript, self.kind())?
            }
            Matcher::Python => {
                match_package_by_language(provider, pkg, Language::Python, self.kind())?
            }
            Matcher::Ruby => match_package_by_language(provider, pkg, Language::Ruby, self.kind())?,
            Matcher::Go => match_package_by_language(provider, pkg, Language::Go, self.kind())?,
            Matcher::Dotnet => {
                match_package_by_language(provider, pkg, Language::Dotnet, self.kind())?
            }
            Matcher::Rust => match_package_by_language(provider, pkg, Language::Rust, self.kind())?,
            Matcher::Bitnami => {
                // Bitnami stacks publish their own ecosystem rows plus NVD
                // CPEs; both sources apply.
                match_package_by_ecosystem(provider, pkg, "bitnami", Language::Unknown, self.kind())?
            }
            Matcher::Msrc => match_msrc(provider, pkg)?,
            Matcher::Stock | Matcher::Cpe => match_package_by_cpes(provider, pkg, self.kind())?,
        };
        Ok((matches, Vec::new()))
    }
}

/// Java quirk: when the Maven `group:artifact` search already produced a
/// match for a vulnerability, CPE hits for the same id become supporting
/// details of that match instead of standing alone.
fn fold_cpe_details(matches: &mut Vec<Match>) {
    let mut folded = Vec::with_capacity(matches.len());
    for m in std::mem::take(matches) {
        let is_cpe_only = m
            .details
            .iter()
            .all(|d| d.kind == vulnsift_types::MatchKind::Cpe);
        if is_cpe_only
            && let Some(primary) = folded.iter_mut().find(|existing: &&mut Match| {
                existing.vulnerability.id == m.vulnerability.id
                    && existing.package.id == m.package.id
            })
        {
            for detail in m.details {
                if !primary.details.contains(&detail) {
                    primary.details.push(detail);
                }
            }
            continue;
        }
        folded.push(m);
    }
    *matches = folded;
}

/// Result of dispatching one package.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matches: Vec<Match>,
    pub ignore_rules: Vec<IgnoreRule>,
}

/// Dispatch one package through its registered matchers in registration
/// order, accumulating matches and matcher-supplied ignore rules.
pub fn match_package(
    provider: &VulnStore,
    registry: &MatcherRegistry,
    pkg: &Package,
) -> Result<MatchOutcome, MatchError> {
    if pkg.has_unknown_version() {
        trace!(package = %pkg.name, "skipping package with unknown version");
        return Ok(MatchOutcome::default());
    }

    let mut outcome = MatchOutcome::default();
    for matcher in registry.matchers_for(pkg) {
        let (matches, ignores) = matcher.find_matches(provider, pkg)?;
        outcome.matches.extend(matches);
        outcome.ignore_rules.extend(ignores);
    }
    Ok(outcome)
}
