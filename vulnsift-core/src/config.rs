use std::path::PathBuf;
use std::time::Duration;

use vulnsift_types::{DistroDescription, IgnoreRule, SeverityBucket, SourceDescription};

use crate::error::ScanError;

pub const MAX_WORKERS: usize = 32;

/// Worker pool default: hardware threads clamped to `[1, MAX_WORKERS]`.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

/// Everything a scan needs beyond the package list.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub db_path: PathBuf,
    pub workers: usize,
    pub fail_on_severity: Option<SeverityBucket>,
    /// Per-scan deadline. There is no per-package timeout; a misbehaving
    /// matcher is a bug.
    pub timeout: Option<Duration>,
    pub ignore_rules: Vec<IgnoreRule>,
    /// Paths to OpenVEX documents merged into the rule set before matching.
    pub vex_paths: Vec<PathBuf>,
    pub cpe_matching: bool,
    pub source: SourceDescription,
    pub distro: Option<DistroDescription>,
}

impl ScanConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            workers: default_workers(),
            fail_on_severity: None,
            timeout: None,
            ignore_rules: Vec::new(),
            vex_paths: Vec::new(),
            cpe_matching: true,
            source: SourceDescription::default(),
            distro: None,
        }
    }

    /// Build a config from the environment knobs:
    /// `VULNSIFT_DB_PATH` (or `VULNSIFT_DB_CACHE` as the base directory),
    /// `VULNSIFT_WORKERS`, `VULNSIFT_FAIL_ON`, `VULNSIFT_IGNORE_FILE`
    /// (JSON array of rules), `VULNSIFT_VEX` (colon-separated paths).
    pub fn from_env() -> Result<Self, ScanError> {
        let db_path = match std::env::var("VULNSIFT_DB_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_db_path(),
        };
        let mut config = Self::new(db_path);

        if let Ok(raw) = std::env::var("VULNSIFT_WORKERS") {
            let workers: usize = raw
                .parse()
                .map_err(|_| ScanError::Config(format!("VULNSIFT_WORKERS={raw:?} is not a number")))?;
            config.workers = workers.clamp(1, MAX_WORKERS);
        }

        if let Ok(raw) = std::env::var("VULNSIFT_FAIL_ON") {
            let bucket: SeverityBucket = raw.parse().map_err(|_| {
                ScanError::Config(format!("VULNSIFT_FAIL_ON={raw:?} is not a severity"))
            })?;
            config.fail_on_severity = Some(bucket);
        }

        if let Ok(path) = std::env::var("VULNSIFT_IGNORE_FILE") {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                ScanError::Config(format!("cannot read ignore rules file {path:?}: {e}"))
            })?;
            config.ignore_rules = serde_json::from_str(&text).map_err(|e| {
                ScanError::Config(format!("cannot parse ignore rules file {path:?}: {e}"))
            })?;
        }

        if let Ok(raw) = std::env::var("VULNSIFT_VEX") {
            config.vex_paths = raw
                .split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        Ok(config)
    }
}

fn default_db_path() -> PathBuf {
    let base = match std::env::var("VULNSIFT_DB_CACHE") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".cache").join("vulnsift")
        }
    };
    base.join("vulnsift.db")
}
