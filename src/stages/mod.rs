//! Pipeline stages
//!
//! Each stage turns one item (a repository or a database path) into one
//! durable artifact and is driven by a `StageRunner`:
//!
//! ```text
//! fetch    -> {metadata}/{owner}/{name}.json
//! clone    -> {clones}/{owner}/{name}.git
//! extract  -> {dbs}/{owner}/{name}.rev-list, {dbs}/{owner}/{name}.db
//! export   -> list of databases passing the validity gate
//! augment  -> ancestors / filenames tables inside each database
//! metrics  -> contents.loc / contents.lloc inside each database
//! ```

pub mod augment;
pub mod clone;
pub mod export;
pub mod extract;
pub mod metadata;
pub mod metrics;

pub use augment::augment_database;
pub use clone::CloneStage;
pub use export::{export_valid, ExportReport};
pub use extract::ExtractStage;
pub use metadata::MetadataStage;
pub use metrics::{MetricsStage, StagingMap};

use std::fmt;
use std::path::{Path, PathBuf};

/// A database path as a work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPath(pub PathBuf);

impl DbPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DbPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Load a path list (see `repo::load_path_list`) as work items
pub fn load_db_items(list: &Path) -> crate::Result<Vec<DbPath>> {
    Ok(crate::repo::load_path_list(list)?
        .into_iter()
        .map(DbPath)
        .collect())
}
