//! Line metrics stage: `contents.loc` / `contents.lloc` from the line counter
//!
//! File contents are staged into a temporary directory under synthetic names
//! (`<uuid><.ext>`), because two files whose paths differ only by case would
//! collide on a case-insensitive filesystem. The counter's report is mapped
//! back through a `StagingMap` and merged in a single transaction.

use super::DbPath;
use crate::linecount::{FileCount, LineCounter};
use crate::runner::Outcome;
use crate::storage::{schema, CorpusDb, EntityKey};
use crate::Result;
use rusqlite::types::ValueRef;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Staged file name <-> (original filename, content id)
#[derive(Debug, Default)]
pub struct StagingMap {
    by_staged: HashMap<String, (String, EntityKey)>,
    by_content: HashMap<EntityKey, String>,
}

impl StagingMap {
    /// Register a file; returns the staged name when its content is new
    pub fn insert(&mut self, filename: &str, content_id: EntityKey) -> Option<String> {
        if self.by_content.contains_key(&content_id) {
            return None;
        }
        let staged = staged_name(filename);
        self.by_content.insert(content_id.clone(), staged.clone());
        self.by_staged
            .insert(staged.clone(), (filename.to_string(), content_id));
        Some(staged)
    }

    pub fn resolve(&self, staged: &str) -> Option<&(String, EntityKey)> {
        self.by_staged.get(staged)
    }

    pub fn staged_name_of(&self, content_id: &EntityKey) -> Option<&str> {
        self.by_content.get(content_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_staged.is_empty()
    }
}

/// `<uuid-v4>` plus the original extension, lower-cased
fn staged_name(filename: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match Path::new(filename).extension() {
        Some(ext) => format!("{}.{}", id, ext.to_string_lossy().to_lowercase()),
        None => id.to_string(),
    }
}

struct PendingFile {
    staged: String,
    content: Vec<u8>,
}

fn flush(dir: &Path, pending: &mut Vec<PendingFile>) -> Result<()> {
    for file in pending.drain(..) {
        fs::write(dir.join(&file.staged), &file.content)?;
    }
    Ok(())
}

/// Write every distinct file content into `dir`, `chunk_size` rows at a time
pub fn stage_contents(db: &CorpusDb, dir: &Path, chunk_size: usize) -> Result<StagingMap> {
    let chunk_size = chunk_size.max(1);
    let mut map = StagingMap::default();
    let mut pending = Vec::with_capacity(chunk_size);

    let mut stmt = db.conn().prepare(schema::SELECT_FILE_CONTENTS)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let filename: String = row.get(0)?;
        let content_id: EntityKey = row.get(1)?;
        let Some(staged) = map.insert(&filename, content_id) else {
            continue;
        };
        let content = match row.get_ref(2)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
            _ => Vec::new(),
        };
        pending.push(PendingFile { staged, content });
        if pending.len() >= chunk_size {
            flush(dir, &mut pending)?;
        }
    }
    flush(dir, &mut pending)?;
    Ok(map)
}

/// Both metric columns exist and no content row lacks them
pub fn is_processed(db: &CorpusDb) -> Result<bool> {
    if !(db.column_exists("contents", "loc")? && db.column_exists("contents", "lloc")?) {
        return Ok(false);
    }
    let missing: i64 = db
        .conn()
        .query_row(schema::COUNT_MISSING_METRICS, [], |row| row.get(0))?;
    Ok(missing == 0)
}

fn ensure_metric_columns(db: &CorpusDb) -> Result<()> {
    if !db.column_exists("contents", "loc")? {
        db.conn().execute(schema::ADD_COLUMN_LOC, [])?;
    }
    if !db.column_exists("contents", "lloc")? {
        db.conn().execute(schema::ADD_COLUMN_LLOC, [])?;
    }
    Ok(())
}

/// Merge counts into `contents`; returns the number of rows updated
fn apply_counts(db: &mut CorpusDb, map: &StagingMap, counts: &[FileCount]) -> Result<usize> {
    let tx = db.conn_mut().transaction()?;
    let mut updated = 0;
    {
        let mut update = tx.prepare(schema::UPDATE_METRICS)?;
        for count in counts {
            match map.resolve(&count.name) {
                Some((_, content_id)) => {
                    updated += update.execute((count.lines, count.code, content_id))?;
                }
                None => tracing::warn!(file = %count.name, "line counter reported an unknown file"),
            }
        }
    }
    tx.commit()?;
    Ok(updated)
}

pub struct MetricsStage<L> {
    counter: L,
    chunk_size: usize,
}

impl<L: LineCounter> MetricsStage<L> {
    pub fn new(counter: L, chunk_size: usize) -> Self {
        Self { counter, chunk_size }
    }

    pub fn process(&self, item: &DbPath) -> Result<Outcome> {
        let mut db = CorpusDb::open(item.path())?;
        if is_processed(&db)? {
            return Ok(Outcome::skipped("metrics present"));
        }

        let staging = tempfile::tempdir()?;
        let map = stage_contents(&db, staging.path(), self.chunk_size)?;
        tracing::debug!(db = %item, staged = map.len(), "contents staged");

        let counts = self.counter.count(staging.path())?;
        ensure_metric_columns(&db)?;
        let updated = apply_counts(&mut db, &map, &counts)?;

        tracing::info!(db = %item, staged = map.len(), counted = counts.len(), updated, "line metrics merged");
        Ok(Outcome::Done)
    }
}
