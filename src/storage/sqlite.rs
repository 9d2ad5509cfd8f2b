//! SQLite access to one extracted repository database

use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use crate::Result;

/// Handle to one repository's database file.
///
/// Opening never creates a file: a missing database is an error, so a typo
/// in a path list cannot leave empty databases behind.
pub struct CorpusDb {
    conn: Connection,
    path: Option<PathBuf>,
}

impl CorpusDb {
    /// Open an existing database for reading and writing
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing database read-only
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Path shown in logs
    pub fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Run `CREATE INDEX IF NOT EXISTS` statements
    pub fn ensure_indexes(&self, statements: &[&str]) -> Result<()> {
        for stmt in statements {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    /// Count the rows of a table (names come from this crate, never user input)
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics; derived tables report `None` until built
    pub fn stats(&self) -> Result<DbStats> {
        let optional = |table: &str| -> Result<Option<usize>> {
            if self.table_exists(table)? {
                Ok(Some(self.count_rows(table)?))
            } else {
                Ok(None)
            }
        };
        let missing_metrics = if self.column_exists("contents", "loc")?
            && self.column_exists("contents", "lloc")?
        {
            let count: i64 = self.conn.query_row(
                super::schema::COUNT_MISSING_METRICS,
                [],
                |row| row.get(0),
            )?;
            Some(count as usize)
        } else {
            None
        };
        Ok(DbStats {
            entities: self.count_rows("entities")?,
            contents: self.count_rows("contents")?,
            deps: self.count_rows("deps")?,
            changes: self.count_rows("changes")?,
            ancestors: optional("ancestors")?,
            filenames: optional("filenames")?,
            missing_metrics,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub entities: usize,
    pub contents: usize,
    pub deps: usize,
    pub changes: usize,
    pub ancestors: Option<usize>,
    pub filenames: Option<usize>,
    pub missing_metrics: Option<usize>,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let derived = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Entities: {}", self.entities)?;
        writeln!(f, "  Contents: {}", self.contents)?;
        writeln!(f, "  Deps: {}", self.deps)?;
        writeln!(f, "  Changes: {}", self.changes)?;
        writeln!(f, "  Ancestors: {}", derived(self.ancestors))?;
        writeln!(f, "  Filenames: {}", derived(self.filenames))?;
        write!(f, "  Contents without metrics: {}", derived(self.missing_metrics))
    }
}
