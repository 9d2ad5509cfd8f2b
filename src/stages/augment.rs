//! Closure augmentation stage

use super::DbPath;
use crate::runner::Outcome;
use crate::storage::{self, CorpusDb};
use crate::Result;

/// Add the `ancestors` and `filenames` tables to one database
pub fn augment_database(item: &DbPath) -> Result<Outcome> {
    let mut db = CorpusDb::open(item.path())?;
    let report = storage::augment(&mut db).inspect_err(|e| {
        tracing::error!(db = %item, error = %e, "augmentation aborted");
    })?;

    if report.computed {
        tracing::info!(
            db = %item,
            ancestors = report.ancestors,
            filenames = report.filenames,
            "closure tables built"
        );
        Ok(Outcome::Done)
    } else {
        Ok(Outcome::skipped("closure tables present"))
    }
}
