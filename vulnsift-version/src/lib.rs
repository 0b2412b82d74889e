//! Version orderings and constraint evaluation.
//!
//! Each ecosystem scheme provides `parse` + `compare`; constraint parsing is
//! scheme-agnostic and evaluation parameterizes on the scheme. There is no
//! unified version type: schemes are genuinely incompatible and cross-scheme
//! comparison is never attempted.

mod apk;
mod constraint;
mod deb;
mod error;
mod fuzzy;
mod gem;
mod golang;
mod kb;
mod maven;
mod pep440;
mod portage;
mod rpm;
mod scheme;

pub use constraint::{Constraint, Op, Range};
pub use error::VersionError;
pub use kb::KbGraph;
pub use scheme::compare;
