//! Ancestor and owning-file closure over the entity forest
//!
//! `ancestors` is the reflexive-transitive closure of `entities.parent_id`
//! and `filenames` maps every entity to its unique root (File) ancestor.
//! Both are computed in memory with an explicit worklist walk up the parent
//! chains: each chain is followed until it reaches a root or an entity whose
//! root is already known, and a chain that revisits an entity on the current
//! path is a cycle. Malformed hierarchies are reported, never patched.

use super::schema;
use super::sqlite::CorpusDb;
use crate::Result;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use std::collections::HashMap;

/// An entity id as stored by the extractor (integer, text or blob)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl FromSql for EntityKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(EntityKey::Integer(i)),
            ValueRef::Text(t) => Ok(EntityKey::Text(String::from_utf8_lossy(t).into_owned())),
            ValueRef::Blob(b) => Ok(EntityKey::Blob(b.to_vec())),
            ValueRef::Null | ValueRef::Real(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for EntityKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            EntityKey::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            EntityKey::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            EntityKey::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKey::Integer(i) => write!(f, "{}", i),
            EntityKey::Text(t) => write!(f, "{}", t),
            EntityKey::Blob(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Hierarchy violations that make a database's closure undefined
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("parent cycle through entity {entity}")]
    Cycle { entity: String },

    #[error("entity {entity} references missing parent {parent}")]
    DanglingParent { entity: String, parent: String },

    #[error("entity id {entity} appears more than once")]
    DuplicateEntity { entity: String },
}

/// One row of `entities`, with the columns the derived tables copy through
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: EntityKey,
    pub parent_id: Option<EntityKey>,
    pub simple_id: Value,
    pub content_id: Value,
    pub name: Value,
}

/// Entities indexed by position, with parent links resolved
pub struct EntityForest {
    rows: Vec<EntityRow>,
    parent: Vec<Option<usize>>,
    root: Vec<usize>,
}

impl EntityForest {
    /// Resolve parent links and roots, rejecting anything that is not a forest
    pub fn build(rows: Vec<EntityRow>) -> std::result::Result<Self, IntegrityError> {
        let mut index: HashMap<&EntityKey, usize> = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if index.insert(&row.id, i).is_some() {
                return Err(IntegrityError::DuplicateEntity {
                    entity: row.id.to_string(),
                });
            }
        }

        let mut parent = Vec::with_capacity(rows.len());
        for row in &rows {
            let link = match &row.parent_id {
                None => None,
                Some(p) => match index.get(p) {
                    Some(&i) => Some(i),
                    None => {
                        return Err(IntegrityError::DanglingParent {
                            entity: row.id.to_string(),
                            parent: p.to_string(),
                        });
                    }
                },
            };
            parent.push(link);
        }
        drop(index);

        let root = resolve_roots(&rows, &parent)?;
        Ok(Self { rows, parent, root })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, i: usize) -> &EntityRow {
        &self.rows[i]
    }

    /// Position of the root ancestor of entity `i`
    pub fn root_of(&self, i: usize) -> usize {
        self.root[i]
    }

    /// `i` itself, then its parent, up to and including its root
    pub fn ancestors(&self, i: usize) -> Ancestors<'_> {
        Ancestors {
            parent: &self.parent,
            next: Some(i),
        }
    }
}

/// Iterator up one parent chain
pub struct Ancestors<'a> {
    parent: &'a [Option<usize>],
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = self.parent[current];
        Some(current)
    }
}

fn resolve_roots(
    rows: &[EntityRow],
    parent: &[Option<usize>],
) -> std::result::Result<Vec<usize>, IntegrityError> {
    let n = parent.len();
    let mut root: Vec<Option<usize>> = vec![None; n];
    let mut on_path = vec![false; n];
    let mut path = Vec::new();

    for start in 0..n {
        if root[start].is_some() {
            continue;
        }
        path.clear();
        let mut current = start;
        let found = loop {
            if let Some(r) = root[current] {
                break r;
            }
            if on_path[current] {
                return Err(IntegrityError::Cycle {
                    entity: rows[current].id.to_string(),
                });
            }
            on_path[current] = true;
            path.push(current);
            match parent[current] {
                None => break current,
                Some(p) => current = p,
            }
        };
        for &i in &path {
            root[i] = Some(found);
            on_path[i] = false;
        }
    }

    Ok(root.into_iter().map(|r| r.unwrap_or_default()).collect())
}

/// Load the whole `entities` table
pub fn load_entities(db: &CorpusDb) -> Result<Vec<EntityRow>> {
    let mut stmt = db.conn().prepare(schema::SELECT_ENTITIES)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(EntityRow {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                simple_id: row.get(2)?,
                content_id: row.get(3)?,
                name: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// What an augmentation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentReport {
    /// False when both derived tables already existed
    pub computed: bool,
    pub ancestors: usize,
    pub filenames: usize,
}

/// Build `ancestors` and `filenames` plus their indices, then compact.
///
/// Support indices are always (re)ensured. When both derived tables already
/// exist nothing is recomputed. The tables are created and filled in a
/// single transaction, so a failure leaves neither behind and a later run
/// starts over.
pub fn augment(db: &mut CorpusDb) -> Result<AugmentReport> {
    db.ensure_indexes(schema::SUPPORT_INDEXES)?;

    let has_ancestors = db.table_exists("ancestors")?;
    let has_filenames = db.table_exists("filenames")?;
    if has_ancestors && has_filenames {
        db.ensure_indexes(schema::CLOSURE_INDEXES)?;
        return Ok(AugmentReport {
            computed: false,
            ancestors: db.count_rows("ancestors")?,
            filenames: db.count_rows("filenames")?,
        });
    }

    let forest = EntityForest::build(load_entities(db)?)?;
    tracing::debug!(db = %db.display_path(), entities = forest.len(), "closure resolved");

    let tx = db.conn_mut().transaction()?;
    if has_ancestors || has_filenames {
        tracing::warn!("rebuilding half-built closure tables");
        tx.execute_batch("DROP TABLE IF EXISTS ancestors; DROP TABLE IF EXISTS filenames;")?;
    }
    tx.execute(schema::CREATE_ANCESTORS_TABLE, [])?;
    tx.execute(schema::CREATE_FILENAMES_TABLE, [])?;

    let mut ancestors = 0;
    let mut filenames = 0;
    {
        let mut insert_ancestor = tx.prepare(schema::INSERT_ANCESTOR)?;
        let mut insert_filename = tx.prepare(schema::INSERT_FILENAME)?;
        for i in 0..forest.len() {
            let entity = forest.row(i);
            for a in forest.ancestors(i) {
                insert_ancestor.execute((&entity.id, &forest.row(a).id))?;
                ancestors += 1;
            }
            let file = forest.row(forest.root_of(i));
            insert_filename.execute((
                &entity.id,
                &entity.simple_id,
                &file.id,
                &file.content_id,
                &file.name,
            ))?;
            filenames += 1;
        }
    }
    tx.commit()?;

    db.ensure_indexes(schema::CLOSURE_INDEXES)?;
    db.vacuum()?;

    Ok(AugmentReport {
        computed: true,
        ancestors,
        filenames,
    })
}
