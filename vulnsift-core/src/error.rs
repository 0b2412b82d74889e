use vulnsift_db::DbError;
use vulnsift_match::MatchError;
use vulnsift_types::{ScanReport, SeverityBucket};

pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
/// A finding met the `--fail-on` severity threshold.
pub const EXIT_FAIL_ON: i32 = 2;
/// The local database cannot be read by this build; an upgrade is needed.
pub const EXIT_DB_UPGRADE: i32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Bad ignore rule, unsupported scheme, unreadable VEX document.
    /// Surfaced before matching begins.
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("worker task failed: {0}")]
    TaskJoin(String),
}

impl ScanError {
    /// Whether this error means the database needs an upgrade rather than
    /// the scan being wrong.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, ScanError::Db(DbError::SchemaMismatch { .. }))
    }
}

/// Exit-code mapping for the CLI collaborator: 0 clean, 1 error, 2 fail-on
/// threshold met, 100 database upgrade needed.
pub fn exit_code(
    result: &Result<ScanReport, ScanError>,
    fail_on: Option<SeverityBucket>,
) -> i32 {
    match result {
        Ok(report) => match fail_on {
            Some(threshold)
                if report
                    .matches
                    .iter()
                    .any(|m| m.severity.meets_threshold(threshold)) =>
            {
                EXIT_FAIL_ON
            }
            _ => EXIT_CLEAN,
        },
        Err(e) if e.is_schema_mismatch() => EXIT_DB_UPGRADE,
        Err(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnsift_types::{Descriptor, SourceDescription};

    fn empty_report() -> ScanReport {
        ScanReport {
            matches: vec![],
            ignored_matches: vec![],
            source: SourceDescription::default(),
            distro: None,
            descriptor: Descriptor::default(),
        }
    }

    #[test]
    fn clean_scan_is_zero() {
        let result = Ok(empty_report());
        assert_eq!(exit_code(&result, None), EXIT_CLEAN);
        assert_eq!(exit_code(&result, Some(SeverityBucket::Low)), EXIT_CLEAN);
    }

    #[test]
    fn schema_mismatch_maps_to_upgrade_code() {
        let result: Result<ScanReport, ScanError> = Err(ScanError::Db(DbError::SchemaMismatch {
            expected: 1,
            found: Some("99".into()),
        }));
        assert_eq!(exit_code(&result, None), EXIT_DB_UPGRADE);
    }

    #[test]
    fn generic_errors_map_to_one() {
        let result: Result<ScanReport, ScanError> =
            Err(ScanError::Config("bad rule".into()));
        assert_eq!(exit_code(&result, None), EXIT_ERROR);
    }
}
