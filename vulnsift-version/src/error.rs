use vulnsift_types::VersionScheme;

#[derive(Debug, Clone, thiserror::Error)]
pub enum VersionError {
    /// The version string does not parse under the scheme. Matchers treat
    /// this as "no match" and log at trace level.
    #[error("unparseable {scheme} version {version:?}")]
    Unparsed {
        scheme: VersionScheme,
        version: String,
    },
    #[error("invalid constraint {constraint:?}: {reason}")]
    InvalidConstraint { constraint: String, reason: String },
    /// KB constraints are graph-ordered and need the supersedence table.
    #[error("kb constraints require a supersedence graph")]
    MissingKbGraph,
}

impl VersionError {
    pub(crate) fn unparsed(scheme: VersionScheme, version: &str) -> Self {
        VersionError::Unparsed {
            scheme,
            version: version.to_string(),
        }
    }
}
