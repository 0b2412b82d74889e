use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use rusqlite::{Connection, OpenFlags, params};
use tracing::debug;

use vulnsift_types::{
    Cpe, DbDescriptor, Distro, EpssRecord, Fix, FixState, KevRecord, Qualifiers, Severity,
    VersionScheme, Vulnerability,
};
use vulnsift_version::KbGraph;

use crate::error::DbError;
use crate::schema::{self, MODEL_VERSION};

/// Read connections opened for a scanning store. Workers round-robin over
/// them so concurrent read transactions do not serialize on one handle.
const READ_POOL_SIZE: usize = 4;

const BASE_SELECT: &str = "\
    SELECT v.vuln_id, v.namespace, v.severities, v.related_ids, v.refs, \
           ap.version_constraint, ap.version_scheme, ap.fix_state, ap.fix_versions, \
           ap.rpm_modularity, ap.platform_cpes, b.value \
    FROM affected_package ap \
    JOIN vulnerability v ON v.id = ap.vulnerability_id \
    JOIN package p ON p.id = ap.package_id \
    LEFT JOIN operating_system os ON os.id = ap.os_id \
    LEFT JOIN blob b ON b.id = v.blob_id";

/// The local vulnerability database.
///
/// Owned by the scan; matchers borrow it for the duration. All query
/// methods take `&self` and are safe for concurrent readers. The handle is
/// released (and, for writable stores, the query indices dropped) on every
/// exit path via `Drop`.
#[derive(Debug)]
pub struct VulnStore {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    path: PathBuf,
    writable: bool,
    released: bool,
    kb: OnceLock<KbGraph>,
}

impl VulnStore {
    /// Open an existing database read-only for scanning. Validates the
    /// schema model and creates the query indices on first use.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if !path.is_file() {
            return Err(DbError::NotFound(path.display().to_string()));
        }

        // The first connection verifies the model and materializes indices,
        // so it must be able to write; the rest are strictly read-only.
        let first = Connection::open(path)?;
        schema::verify_model(&first)?;
        schema::create_indices(&first)?;

        let mut pool = vec![Mutex::new(first)];
        for _ in 1..READ_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            pool.push(Mutex::new(conn));
        }

        debug!(path = %path.display(), connections = pool.len(), "vulnerability database opened");
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
            path: path.to_path_buf(),
            writable: false,
            released: false,
            kb: OnceLock::new(),
        })
    }

    /// Create (or open) a database in write mode, as used by database
    /// builders and tests. Stamps the model version into `metadata`.
    pub fn create(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Other(format!(
                    "failed to create db directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::from_writable(conn, path.to_path_buf())
    }

    /// In-memory writable database for tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::from_writable(conn, PathBuf::from(":memory:"))
    }

    fn from_writable(conn: Connection, path: PathBuf) -> Result<Self, DbError> {
        schema::initialize(&conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata (key, value) VALUES ('model', ?1)",
            params![MODEL_VERSION.to_string()],
        )?;
        Ok(Self {
            pool: vec![Mutex::new(conn)],
            next: AtomicUsize::new(0),
            path,
            writable: true,
            released: false,
            kb: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        match self.pool[idx].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Explicit close. A writable store drops its non-essential indices so
    /// the artifact ships small; a read-only store just releases handles.
    pub fn close(mut self) -> Result<(), DbError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), DbError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.writable {
            schema::drop_indices(&self.conn())?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Query surface
    // -----------------------------------------------------------------------

    /// All records affecting `name`, optionally narrowed to a distro
    /// release. Provider, OS, package, and blob columns come back in one
    /// joined pass.
    pub fn find_by_package_name(
        &self,
        name: &str,
        distro: Option<&Distro>,
    ) -> Result<Vec<Vulnerability>, DbError> {
        match distro {
            Some(d) => self.query_affected(
                &format!(
                    "{BASE_SELECT} WHERE p.name = ?1 AND os.name = ?2 AND os.major_version = ?3"
                ),
                params![name, d.kind.to_ascii_lowercase(), d.major_version()],
            ),
            None => self.query_affected(&format!("{BASE_SELECT} WHERE p.name = ?1"), params![name]),
        }
    }

    /// Distro-scoped subset: requires a distro-specific namespace to exist.
    pub fn find_by_distro(
        &self,
        distro: &Distro,
        name: &str,
    ) -> Result<Vec<Vulnerability>, DbError> {
        self.find_by_package_name(name, Some(distro))
    }

    /// Records for a language ecosystem (distro-less rows only).
    pub fn find_by_language(
        &self,
        ecosystem: &str,
        name: &str,
    ) -> Result<Vec<Vulnerability>, DbError> {
        self.query_affected(
            &format!("{BASE_SELECT} WHERE p.name = ?1 AND p.ecosystem = ?2 AND ap.os_id IS NULL"),
            params![name, ecosystem],
        )
    }

    /// Wildcard-aware CPE lookup on vendor/product/target-sw. Version
    /// comparison is deferred to the version algebra; each hit returns the
    /// record's own CPE attributes alongside the vulnerability.
    pub fn find_by_cpe(&self, cpe: &Cpe) -> Result<Vec<(Vulnerability, Cpe)>, DbError> {
        let sql = format!(
            "SELECT v.vuln_id, v.namespace, v.severities, v.related_ids, v.refs, \
                    ac.version_constraint, ac.version_scheme, ac.fix_state, ac.fix_versions, \
                    NULL, NULL, b.value, \
                    ac.part, ac.vendor, ac.product, ac.target_sw \
             FROM affected_cpe ac \
             JOIN vulnerability v ON v.id = ac.vulnerability_id \
             LEFT JOIN blob b ON b.id = v.blob_id \
             {}",
            if cpe.product == "*" {
                ""
            } else {
                "WHERE ac.product = ?1 OR ac.product = '*'"
            }
        );

        let product = cpe.product.to_ascii_lowercase();
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut collect = |row: &rusqlite::Row<'_>| -> Result<(Vulnerability, Cpe), rusqlite::Error> {
            let vuln = row_to_vulnerability(row)?;
            let record_cpe = Cpe {
                part: row.get(12)?,
                vendor: row.get(13)?,
                product: row.get(14)?,
                version: "*".to_string(),
                update: "*".to_string(),
                target_sw: row.get(15)?,
            };
            Ok((vuln, record_cpe))
        };

        let rows: Vec<(Vulnerability, Cpe)> = if cpe.product == "*" {
            let mapped = stmt.query_map([], |row| collect(row))?;
            mapped.collect::<Result<_, _>>()?
        } else {
            let mapped = stmt.query_map(params![product], |row| collect(row))?;
            mapped.collect::<Result<_, _>>()?
        };

        // Vendor and target-sw comparison happens here, wildcard-aware and
        // case-insensitive on both sides.
        Ok(rows
            .into_iter()
            .filter(|(_, record_cpe)| record_cpe.matches_product(cpe))
            .collect())
    }

    /// KEV catalog lookup, case-insensitive on the CVE id.
    pub fn known_exploited(&self, cve: &str) -> Result<Option<KevRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT cve, date_added, known_ransomware FROM known_exploited WHERE cve = ?1",
        )?;
        let mut rows = stmt.query(params![cve.to_ascii_uppercase()])?;
        match rows.next()? {
            Some(row) => Ok(Some(KevRecord {
                cve: row.get(0)?,
                date_added: row.get(1)?,
                known_ransomware: row.get::<_, i64>(2)? != 0,
            })),
            None => Ok(None),
        }
    }

    /// Most recent EPSS record for a CVE (feed date descending).
    pub fn epss(&self, cve: &str) -> Result<Option<EpssRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT cve, score, percentile, date FROM epss WHERE cve = ?1 \
             ORDER BY date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![cve.to_ascii_uppercase()])?;
        match rows.next()? {
            Some(row) => Ok(Some(EpssRecord {
                cve: row.get(0)?,
                score: row.get(1)?,
                percentile: row.get(2)?,
                date: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    /// The KB supersedence graph, loaded once per scan.
    pub fn kb_graph(&self) -> Result<&KbGraph, DbError> {
        if let Some(graph) = self.kb.get() {
            return Ok(graph);
        }
        let graph = self.load_kb_graph()?;
        let _ = self.kb.set(graph);
        self.kb
            .get()
            .ok_or_else(|| DbError::Other("kb supersedence graph unavailable".to_string()))
    }

    fn load_kb_graph(&self) -> Result<KbGraph, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT kb, superseded_by FROM kb_supersedence")?;
        let mut graph = KbGraph::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let kb: String = row.get(0)?;
            let successor: String = row.get(1)?;
            graph.insert(&kb, &successor);
        }
        Ok(graph)
    }

    /// Database provenance for the report descriptor.
    pub fn descriptor(&self) -> Result<DbDescriptor, DbError> {
        Ok(DbDescriptor {
            built: self.metadata("build_time")?.unwrap_or_default(),
            schema_version: MODEL_VERSION,
            location: self.path.display().to_string(),
            checksum: self.metadata("checksum")?.unwrap_or_default(),
        })
    }

    pub fn metadata(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn query_affected(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Vulnerability>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let mapped = stmt.query_map(params, row_to_vulnerability)?;
        Ok(mapped.collect::<Result<_, _>>()?)
    }

    // -----------------------------------------------------------------------
    // Write surface (database builders and tests)
    // -----------------------------------------------------------------------

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn insert_provider(&self, id: &str, version: &str) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR IGNORE INTO provider (id, version) VALUES (?1, ?2)",
            params![id, version],
        )?;
        Ok(())
    }

    /// Insert a record affecting a named package. `distro` is
    /// `(name, version)`; language rows pass `None` and an ecosystem tag.
    pub fn insert_vulnerability_for_package(
        &self,
        vuln: &Vulnerability,
        package: &str,
        ecosystem: &str,
        distro: Option<(&str, &str)>,
    ) -> Result<(), DbError> {
        let conn = self.conn();
        let vuln_row = upsert_vulnerability(&conn, vuln)?;
        let package_row = upsert_package(&conn, package, ecosystem)?;
        let os_row = match distro {
            Some((name, version)) => Some(upsert_os(&conn, name, version)?),
            None => None,
        };

        conn.execute(
            "INSERT INTO affected_package (vulnerability_id, package_id, os_id, \
             version_constraint, version_scheme, fix_state, fix_versions, \
             rpm_modularity, platform_cpes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                vuln_row,
                package_row,
                os_row,
                vuln.constraint,
                vuln.scheme.as_str(),
                vuln.fix.state.as_str(),
                serde_json::to_string(&vuln.fix.versions)?,
                vuln.qualifiers.rpm_modularity,
                serde_json::to_string(&vuln.qualifiers.platform_cpes)?,
            ],
        )?;
        Ok(())
    }

    /// Insert a record keyed by CPE attributes instead of a package name.
    pub fn insert_vulnerability_for_cpe(
        &self,
        vuln: &Vulnerability,
        cpe: &Cpe,
    ) -> Result<(), DbError> {
        let conn = self.conn();
        let vuln_row = upsert_vulnerability(&conn, vuln)?;
        conn.execute(
            "INSERT INTO affected_cpe (vulnerability_id, part, vendor, product, target_sw, \
             version_constraint, version_scheme, fix_state, fix_versions) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                vuln_row,
                cpe.part.to_ascii_lowercase(),
                cpe.vendor.to_ascii_lowercase(),
                cpe.product.to_ascii_lowercase(),
                cpe.target_sw.to_ascii_lowercase(),
                vuln.constraint,
                vuln.scheme.as_str(),
                vuln.fix.state.as_str(),
                serde_json::to_string(&vuln.fix.versions)?,
            ],
        )?;
        Ok(())
    }

    pub fn insert_known_exploited(&self, record: &KevRecord) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO known_exploited (cve, date_added, known_ransomware) \
             VALUES (?1, ?2, ?3)",
            params![
                record.cve.to_ascii_uppercase(),
                record.date_added,
                record.known_ransomware as i64
            ],
        )?;
        Ok(())
    }

    pub fn insert_epss(&self, record: &EpssRecord) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO epss (cve, score, percentile, date) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.cve.to_ascii_uppercase(),
                record.score,
                record.percentile,
                record.date
            ],
        )?;
        Ok(())
    }

    pub fn insert_kb_supersedence(&self, kb: &str, superseded_by: &str) -> Result<(), DbError> {
        self.conn().execute(
            "INSERT OR IGNORE INTO kb_supersedence (kb, superseded_by) VALUES (?1, ?2)",
            params![kb.to_ascii_uppercase(), superseded_by.to_ascii_uppercase()],
        )?;
        Ok(())
    }
}

impl Drop for VulnStore {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            debug!(error = %e, "vulnerability database release failed");
        }
    }
}

fn upsert_vulnerability(conn: &Connection, vuln: &Vulnerability) -> Result<i64, DbError> {
    let blob_id = match &vuln.description {
        Some(description) => {
            conn.execute("INSERT INTO blob (value) VALUES (?1)", params![description])?;
            Some(conn.last_insert_rowid())
        }
        None => None,
    };

    conn.execute(
        "INSERT OR IGNORE INTO vulnerability \
         (vuln_id, namespace, severities, related_ids, refs, blob_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            vuln.id,
            vuln.namespace,
            serde_json::to_string(&vuln.severities)?,
            serde_json::to_string(&vuln.related_ids)?,
            serde_json::to_string(&vuln.references)?,
            blob_id,
        ],
    )?;
    let id = conn.query_row(
        "SELECT id FROM vulnerability WHERE vuln_id = ?1 AND namespace = ?2",
        params![vuln.id, vuln.namespace],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn upsert_package(conn: &Connection, name: &str, ecosystem: &str) -> Result<i64, DbError> {
    conn.execute(
        "INSERT OR IGNORE INTO package (name, ecosystem) VALUES (?1, ?2)",
        params![name, ecosystem],
    )?;
    let id = conn.query_row(
        "SELECT id FROM package WHERE name = ?1 AND ecosystem = ?2",
        params![name, ecosystem],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn upsert_os(conn: &Connection, name: &str, version: &str) -> Result<i64, DbError> {
    let name = name.to_ascii_lowercase();
    let (major, minor) = match version.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (version, ""),
    };
    conn.execute(
        "INSERT INTO operating_system (name, major_version, minor_version) \
         SELECT ?1, ?2, ?3 WHERE NOT EXISTS \
         (SELECT 1 FROM operating_system WHERE name = ?1 AND major_version = ?2 AND minor_version = ?3)",
        params![name, major, minor],
    )?;
    let id = conn.query_row(
        "SELECT id FROM operating_system WHERE name = ?1 AND major_version = ?2 AND minor_version = ?3",
        params![name, major, minor],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Map one joined row onto the provider-facing record. Column order matches
/// `BASE_SELECT`.
fn row_to_vulnerability(row: &rusqlite::Row<'_>) -> Result<Vulnerability, rusqlite::Error> {
    let severities: Option<String> = row.get(2)?;
    let related: Option<String> = row.get(3)?;
    let references: Option<String> = row.get(4)?;
    let scheme_text: String = row.get(6)?;
    let fix_state_text: String = row.get(7)?;
    let fix_versions: Option<String> = row.get(8)?;
    let platform_cpes: Option<String> = row.get(10)?;

    let severities: Vec<Severity> = parse_json_column(severities.as_deref());
    let related_ids: Vec<String> = parse_json_column(related.as_deref());
    let references: Vec<String> = parse_json_column(references.as_deref());
    let fix_versions: Vec<String> = parse_json_column(fix_versions.as_deref());
    let platform_cpes: Vec<String> = parse_json_column(platform_cpes.as_deref());

    let scheme: VersionScheme = scheme_text.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            Box::new(vulnsift_types::UnknownScheme(scheme_text.clone())),
        )
    })?;

    Ok(Vulnerability {
        id: row.get(0)?,
        namespace: row.get(1)?,
        constraint: row.get(5)?,
        scheme,
        qualifiers: Qualifiers {
            rpm_modularity: row.get(9)?,
            platform_cpes,
        },
        fix: Fix {
            state: fix_state_text.parse().unwrap_or(FixState::Unknown),
            versions: fix_versions,
        },
        severities,
        related_ids,
        references,
        description: row.get(11)?,
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned + Default>(value: Option<&str>) -> T {
    match value {
        Some(text) if !text.is_empty() => serde_json::from_str(text).unwrap_or_default(),
        _ => T::default(),
    }
}
