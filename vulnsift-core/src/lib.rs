//! Scan orchestration: a bounded worker pool dispatches packages through
//! the matcher registry, and the results flow through merge → enrichment →
//! ignore filter → deterministic sort into the report document.

mod config;
mod error;
mod scan;

pub use config::{MAX_WORKERS, ScanConfig, default_workers};
pub use error::{
    EXIT_CLEAN, EXIT_DB_UPGRADE, EXIT_ERROR, EXIT_FAIL_ON, ScanError, exit_code,
};
pub use scan::{run_scan, run_scan_cancellable};
