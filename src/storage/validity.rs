//! Structural validity gate for extracted databases

use super::schema::VALIDITY_CHECKS;
use super::sqlite::CorpusDb;
use crate::Result;
use rusqlite::Connection;
use std::path::Path;

/// Names of the checks that evaluate false. A query error (missing table or
/// column) is returned as an error rather than a failed check.
pub fn failed_checks(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut failed = Vec::new();
    for (name, sql) in VALIDITY_CHECKS {
        let passed: bool = conn.query_row(sql, [], |row| row.get(0))?;
        if !passed {
            failed.push(*name);
        }
    }
    Ok(failed)
}

/// True only if the file opens and every check holds. Never creates the file.
pub fn is_valid(path: &Path) -> bool {
    let db = match CorpusDb::open_read_only(path) {
        Ok(db) => db,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot open database");
            return false;
        }
    };
    match failed_checks(db.conn()) {
        Ok(failed) if failed.is_empty() => true,
        Ok(failed) => {
            tracing::debug!(path = %path.display(), ?failed, "database rejected");
            false
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "database rejected");
            false
        }
    }
}
