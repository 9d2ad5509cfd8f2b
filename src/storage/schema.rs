//! SQL for the derived tables, indices and validity predicates

/// Indices over the extractor's own tables
pub const SUPPORT_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name)",
    "CREATE INDEX IF NOT EXISTS idx_entities_parent_id ON entities(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_deps_src_tgt ON deps(src, tgt)",
    "CREATE INDEX IF NOT EXISTS idx_changes_simple_commit ON changes(simple_id, commit_id)",
];

/// Columns are left untyped so entity ids keep whatever type the extractor used
pub const CREATE_ANCESTORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ancestors (
    entity_id,
    ancestor_id
)
"#;

pub const CREATE_FILENAMES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS filenames (
    entity_id,
    simple_id,
    file_id,
    content_id,
    filename
)
"#;

pub const INSERT_ANCESTOR: &str = "INSERT INTO ancestors (entity_id, ancestor_id) VALUES (?1, ?2)";

pub const INSERT_FILENAME: &str = r#"
INSERT INTO filenames (entity_id, simple_id, file_id, content_id, filename)
VALUES (?1, ?2, ?3, ?4, ?5)
"#;

pub const SELECT_ENTITIES: &str = "SELECT id, parent_id, simple_id, content_id, name FROM entities";

pub const CLOSURE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_ancestors_entity_id ON ancestors(entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_ancestors_ancestor_id ON ancestors(ancestor_id)",
    "CREATE INDEX IF NOT EXISTS idx_filenames_entity_id ON filenames(entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_filenames_simple_id ON filenames(simple_id)",
    "CREATE INDEX IF NOT EXISTS idx_filenames_content_id ON filenames(content_id)",
];

/// Structural predicates a usable database must pass; each yields 1 or 0
pub const VALIDITY_CHECKS: &[(&str, &str)] = &[
    ("changes present", "SELECT COUNT(*) > 0 FROM changes"),
    ("contents present", "SELECT COUNT(*) > 0 FROM contents"),
    ("deps present", "SELECT COUNT(*) > 0 FROM deps"),
    ("entities present", "SELECT COUNT(*) > 0 FROM entities"),
    (
        "one content per file",
        "SELECT (SELECT COUNT(*) FROM contents) = (SELECT COUNT(*) FROM entities WHERE kind = 'File')",
    ),
];

/// File entities joined to their content, in filename order
pub const SELECT_FILE_CONTENTS: &str = r#"
SELECT E.name, C.content_id, C.content
FROM entities E
JOIN contents C ON C.content_id = E.content_id
WHERE E.kind = 'File'
ORDER BY E.name
"#;

pub const ADD_COLUMN_LOC: &str = "ALTER TABLE contents ADD COLUMN loc INTEGER";
pub const ADD_COLUMN_LLOC: &str = "ALTER TABLE contents ADD COLUMN lloc INTEGER";

pub const COUNT_MISSING_METRICS: &str =
    "SELECT COUNT(*) FROM contents WHERE loc IS NULL OR lloc IS NULL";

pub const UPDATE_METRICS: &str = "UPDATE contents SET loc = ?1, lloc = ?2 WHERE content_id = ?3";
