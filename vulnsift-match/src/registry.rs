use std::sync::LazyLock;

use vulnsift_types::{Language, Package, PackageType};

use crate::matchers::Matcher;

/// Static registration table. Order is registration order: when several
/// matchers claim a package, they run (and their details concatenate) in
/// this order.
static DEFAULT_MATCHERS: LazyLock<Vec<Matcher>> = LazyLock::new(|| {
    vec![
        Matcher::Apk,
        Matcher::Dpkg,
        Matcher::Rpm,
        Matcher::Java,
        Matcher::Javascript,
        Matcher::Python,
        Matcher::Ruby,
        Matcher::Go,
        Matcher::Dotnet,
        Matcher::Rust,
        Matcher::Portage,
        Matcher::Bitnami,
        Matcher::Msrc,
    ]
});

/// Maps a package to the ordered, de-duplicated set of matchers that should
/// process it: package type first, then language, then the stock fallback
/// (CPE-backed, when enabled).
pub struct MatcherRegistry {
    matchers: Vec<Matcher>,
    cpe_enabled: bool,
}

impl MatcherRegistry {
    pub fn with_default_matchers(cpe_enabled: bool) -> Self {
        Self {
            matchers: DEFAULT_MATCHERS.clone(),
            cpe_enabled,
        }
    }

    pub fn cpe_enabled(&self) -> bool {
        self.cpe_enabled
    }

    pub fn matchers_for(&self, pkg: &Package) -> Vec<Matcher> {
        let mut selected = Vec::new();

        // 1. Package type is the strongest signal.
        for matcher in &self.matchers {
            if matcher.ecosystems_handled().contains(&pkg.kind) {
                selected.push(*matcher);
            }
        }

        // 2. Language routes archives the type key missed (e.g. a fat jar
        //    cataloged with an unknown type but a java language tag).
        if selected.is_empty()
            && let Some(matcher) = language_matcher(pkg.language)
        {
            selected.push(matcher);
        }

        // 3. Stock fallback: CPE expansion only.
        if selected.is_empty() && self.cpe_enabled {
            selected.push(Matcher::Stock);
        }

        selected.dedup();
        selected
    }
}

fn language_matcher(language: Language) -> Option<Matcher> {
    match language {
        Language::Java => Some(Matcher::Java),
        Language::Javascript => Some(Matcher::Javascript),
        Language::Python => Some(Matcher::Python),
        Language::Ruby => Some(Matcher::Ruby),
        Language::Go => Some(Matcher::Go),
        Language::Dotnet => Some(Matcher::Dotnet),
        Language::Rust => Some(Matcher::Rust),
        Language::Unknown => None,
    }
}
