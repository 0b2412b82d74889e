pub mod cpe;
pub mod document;
pub mod ignore;
pub mod matched;
pub mod package;
pub mod severity;
pub mod vulnerability;

pub use cpe::{Cpe, CpeError};
pub use document::{
    DbDescriptor, Descriptor, DistroDescription, IgnoredMatch, ReportedMatch, ScanReport,
    SourceDescription,
};
pub use ignore::{IgnoreRule, VexStatus};
pub use matched::{
    DistroRef, EpssRecord, Found, KevRecord, Match, MatchDetail, MatchKind, MatcherType,
    PackageRef, SearchedBy,
};
pub use package::{Distro, Language, Package, PackageType, UpstreamPackage};
pub use severity::{Severity, SeverityBucket, SeverityScheme};
pub use vulnerability::{Fix, FixState, Qualifiers, UnknownScheme, VersionScheme, Vulnerability};
