//! Storage Layer - per-repository SQLite databases
//!
//! The extractor writes the base tables:
//! - entities(id, parent_id, kind, name, simple_id, content_id)
//! - contents(content_id, content)
//! - deps(src, tgt)
//! - changes(simple_id, commit_id)
//!
//! This crate derives, inside the same file:
//! - ancestors(entity_id, ancestor_id)
//! - filenames(entity_id, simple_id, file_id, content_id, filename)
//! - contents.loc / contents.lloc

pub mod schema;
pub mod sqlite;
pub mod closure;
pub mod validity;

pub use closure::{augment, AugmentReport, EntityForest, EntityKey, EntityRow, IntegrityError};
pub use sqlite::{CorpusDb, DbStats};
pub use validity::{is_valid, failed_checks};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::CorpusDb;
    use rusqlite::params;

    /// The subset of the extractor's schema read by this crate
    pub const EXTRACTOR_TABLES: &str = r#"
        CREATE TABLE entities (
            id INTEGER PRIMARY KEY,
            parent_id INTEGER,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            simple_id INTEGER NOT NULL,
            content_id INTEGER
        );
        CREATE TABLE contents (content_id INTEGER PRIMARY KEY, content TEXT NOT NULL);
        CREATE TABLE deps (src INTEGER NOT NULL, tgt INTEGER NOT NULL);
        CREATE TABLE changes (simple_id INTEGER NOT NULL, commit_id TEXT NOT NULL);
    "#;

    pub fn empty_db() -> CorpusDb {
        let db = CorpusDb::open_in_memory().unwrap();
        db.conn().execute_batch(EXTRACTOR_TABLES).unwrap();
        db
    }

    pub fn insert_entity(
        db: &CorpusDb,
        id: i64,
        parent: Option<i64>,
        kind: &str,
        name: &str,
        content: Option<i64>,
    ) {
        db.conn()
            .execute(
                "INSERT INTO entities (id, parent_id, name, kind, simple_id, content_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, parent, name, kind, id * 100, content],
            )
            .unwrap();
    }

    /// File "A.java" (1) → Class (2) → Method (3), with content, a dep and a change
    pub fn sample_db() -> CorpusDb {
        let db = empty_db();
        db.conn()
            .execute("INSERT INTO contents (content_id, content) VALUES (10, 'class A { void m() {} }')", [])
            .unwrap();
        insert_entity(&db, 1, None, "File", "A.java", Some(10));
        insert_entity(&db, 2, Some(1), "Class", "A", None);
        insert_entity(&db, 3, Some(2), "Method", "m", None);
        db.conn().execute("INSERT INTO deps (src, tgt) VALUES (3, 2)", []).unwrap();
        db.conn()
            .execute("INSERT INTO changes (simple_id, commit_id) VALUES (300, 'abc123')", [])
            .unwrap();
        db
    }
}
