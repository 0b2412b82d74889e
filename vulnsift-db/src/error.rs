#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The file is a database, but not one this build can read. The CLI
    /// maps this to its database-upgrade hint.
    #[error("not a v{expected} database (found model {found:?})")]
    SchemaMismatch { expected: i64, found: Option<String> },
    #[error("unsupported version scheme {0:?}")]
    UnknownScheme(String),
    #[error("vulnerability database not found at {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}
