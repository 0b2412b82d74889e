use vulnsift_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A provider query failed. Fatal for the scan; carries the package and
    /// query context for the message.
    #[error("provider query failed for package {package:?} ({context}): {source}")]
    Provider {
        package: String,
        context: String,
        #[source]
        source: DbError,
    },
    #[error("invalid VEX document: {0}")]
    Vex(String),
    #[error("invalid ignore rule: {0}")]
    IgnoreRule(String),
}

impl MatchError {
    pub(crate) fn provider(package: &str, context: String, source: DbError) -> Self {
        MatchError::Provider {
            package: package.to_string(),
            context,
            source,
        }
    }
}
