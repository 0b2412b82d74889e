//! Matcher dispatch and the post-match pipeline.
//!
//! Each package is routed through the matchers registered for its type and
//! language; raw matches are merged and de-duplicated, enriched with KEV
//! and EPSS data, and partitioned by the ignore/VEX engine.

mod aggregate;
mod cpe;
mod distro;
mod enrich;
mod error;
mod ignore;
mod language;
mod matchers;
mod registry;
mod vex;

pub use aggregate::merge_matches;
pub use cpe::{CPE_VERSIONED_CONFIDENCE, CPE_WILDCARD_CONFIDENCE, DIRECT_CONFIDENCE};
pub use enrich::enrich_matches;
pub use error::MatchError;
pub use ignore::{IgnoredEntry, apply_ignore_rules, validate_rules};
pub use matchers::{MatchOutcome, Matcher, match_package};
pub use registry::MatcherRegistry;
pub use vex::rules_from_vex;
