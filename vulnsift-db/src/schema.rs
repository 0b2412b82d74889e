use rusqlite::Connection;

use crate::error::DbError;

/// Database model version; opening any other model is a hard error.
pub const MODEL_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
-- Schema model + provenance for the report descriptor
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Upstream feed a record came from (debian tracker, github advisories, ...)
CREATE TABLE IF NOT EXISTS provider (
    id            TEXT PRIMARY KEY,
    version       TEXT NOT NULL DEFAULT '',
    processor     TEXT,
    date_captured TEXT
);

CREATE TABLE IF NOT EXISTS operating_system (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    major_version TEXT NOT NULL DEFAULT '',
    minor_version TEXT NOT NULL DEFAULT '',
    codename      TEXT
);

-- Large free-form payloads (descriptions), joined on demand
CREATE TABLE IF NOT EXISTS blob (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vulnerability (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    vuln_id     TEXT NOT NULL,
    namespace   TEXT NOT NULL,
    provider_id TEXT REFERENCES provider(id),
    severities  TEXT,
    related_ids TEXT,
    refs        TEXT,
    blob_id     INTEGER REFERENCES blob(id),
    UNIQUE(vuln_id, namespace)
);

-- Normalized (name, ecosystem) pairs so affected rows join in one pass
CREATE TABLE IF NOT EXISTS package (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL,
    ecosystem TEXT NOT NULL DEFAULT '',
    UNIQUE(name, ecosystem)
);

CREATE TABLE IF NOT EXISTS affected_package (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    vulnerability_id   INTEGER NOT NULL REFERENCES vulnerability(id) ON DELETE CASCADE,
    package_id         INTEGER NOT NULL REFERENCES package(id),
    os_id              INTEGER REFERENCES operating_system(id),
    version_constraint TEXT NOT NULL DEFAULT '',
    version_scheme     TEXT NOT NULL DEFAULT 'fuzzy',
    fix_state          TEXT NOT NULL DEFAULT 'unknown',
    fix_versions       TEXT,
    rpm_modularity     TEXT,
    platform_cpes      TEXT
);

CREATE TABLE IF NOT EXISTS affected_cpe (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    vulnerability_id   INTEGER NOT NULL REFERENCES vulnerability(id) ON DELETE CASCADE,
    part               TEXT NOT NULL DEFAULT 'a',
    vendor             TEXT NOT NULL,
    product            TEXT NOT NULL,
    target_sw          TEXT NOT NULL DEFAULT '*',
    version_constraint TEXT NOT NULL DEFAULT '',
    version_scheme     TEXT NOT NULL DEFAULT 'fuzzy',
    fix_state          TEXT NOT NULL DEFAULT 'unknown',
    fix_versions       TEXT
);

-- CISA KEV catalog
CREATE TABLE IF NOT EXISTS known_exploited (
    cve              TEXT PRIMARY KEY,
    date_added       TEXT NOT NULL DEFAULT '',
    known_ransomware INTEGER NOT NULL DEFAULT 0
);

-- EPSS probabilities, one row per (cve, feed date)
CREATE TABLE IF NOT EXISTS epss (
    cve        TEXT NOT NULL,
    score      REAL NOT NULL,
    percentile REAL NOT NULL,
    date       TEXT NOT NULL,
    PRIMARY KEY (cve, date)
);

-- Microsoft KB supersedence edges consumed by the kb version scheme
CREATE TABLE IF NOT EXISTS kb_supersedence (
    kb            TEXT NOT NULL,
    superseded_by TEXT NOT NULL,
    PRIMARY KEY (kb, superseded_by)
);
"#;

/// Query indices. Not part of the distributed artifact: a writable store
/// drops them on close, a read-only store creates them on first use.
const NONESSENTIAL_INDICES: &[(&str, &str)] = &[
    (
        "idx_package_name",
        "CREATE INDEX IF NOT EXISTS idx_package_name ON package(name, ecosystem)",
    ),
    (
        "idx_vuln_identity",
        "CREATE INDEX IF NOT EXISTS idx_vuln_identity ON vulnerability(vuln_id)",
    ),
    (
        "idx_affected_package",
        "CREATE INDEX IF NOT EXISTS idx_affected_package ON affected_package(package_id)",
    ),
    (
        "idx_affected_cpe_product",
        "CREATE INDEX IF NOT EXISTS idx_affected_cpe_product ON affected_cpe(product)",
    ),
    (
        "idx_epss_cve",
        "CREATE INDEX IF NOT EXISTS idx_epss_cve ON epss(cve, date)",
    ),
];

pub(crate) fn initialize(conn: &Connection) -> Result<(), DbError> {
    // WAL before DDL so concurrent readers never block each other.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub(crate) fn create_indices(conn: &Connection) -> Result<(), DbError> {
    for (_, sql) in NONESSENTIAL_INDICES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

pub(crate) fn drop_indices(conn: &Connection) -> Result<(), DbError> {
    for (name, _) in NONESSENTIAL_INDICES {
        conn.execute(&format!("DROP INDEX IF EXISTS {name}"), [])?;
    }
    Ok(())
}

/// Check `metadata.model` against this build's expected model.
pub(crate) fn verify_model(conn: &Connection) -> Result<(), DbError> {
    let found: Option<String> = conn
        .query_row("SELECT value FROM metadata WHERE key = 'model'", [], |row| {
            row.get(0)
        })
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match found.as_deref().map(str::parse::<i64>) {
        Some(Ok(model)) if model == MODEL_VERSION => Ok(()),
        _ => Err(DbError::SchemaMismatch {
            expected: MODEL_VERSION,
            found,
        }),
    }
}
