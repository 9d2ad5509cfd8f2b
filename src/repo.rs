//! Repository identifiers and the artifact paths derived from them
//!
//! Every per-repository artifact lives at `{root}/{owner}/{name}{ext}`, so two
//! stages never race on the same file and any stage can be restarted on any
//! subset of the collection.

use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

static SEGMENT: OnceLock<Regex> = OnceLock::new();

fn segment_pattern() -> &'static Regex {
    SEGMENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static pattern"))
}

/// Extensions used for the per-repository artifacts.
pub mod ext {
    pub const METADATA: &str = "json";
    pub const MIRROR: &str = "git";
    pub const REV_LIST: &str = "rev-list";
    pub const DATABASE: &str = "db";
}

/// A GitHub repository, identified by `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Create an identifier, validating both segments
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        for segment in [&owner, &name] {
            // "." and ".." would escape the artifact root
            if !segment_pattern().is_match(segment) || segment == "." || segment == ".." {
                return Err(Error::InvalidRepo(format!("{}/{}", owner, name)));
            }
        }
        Ok(Self { owner, name })
    }

    /// Parse `owner/name`; exactly one slash is allowed
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) => Self::new(owner, name),
            _ => Err(Error::InvalidRepo(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// `{root}/{owner}/{name}.{ext}`
    pub fn artifact(&self, root: &Path, ext: &str) -> PathBuf {
        root.join(&self.owner).join(format!("{}.{}", self.name, ext))
    }

    pub fn metadata_path(&self, root: &Path) -> PathBuf {
        self.artifact(root, ext::METADATA)
    }

    pub fn mirror_path(&self, root: &Path) -> PathBuf {
        self.artifact(root, ext::MIRROR)
    }

    pub fn rev_list_path(&self, root: &Path) -> PathBuf {
        self.artifact(root, ext::REV_LIST)
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        self.artifact(root, ext::DATABASE)
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Deserialize)]
struct NamedRow {
    full_name: String,
}

/// Load an ordered repository list.
///
/// Each non-empty line is either `owner/name` or a JSON object carrying a
/// `full_name` field (the catalog's JSON Lines output).
pub fn load_repo_list(path: &Path) -> Result<Vec<RepoId>> {
    let text = std::fs::read_to_string(path)?;
    parse_repo_list(&text)
}

pub fn parse_repo_list(text: &str) -> Result<Vec<RepoId>> {
    let mut repos = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let repo = if line.starts_with('{') {
            let row: NamedRow = serde_json::from_str(line)?;
            RepoId::parse(&row.full_name)?
        } else {
            RepoId::parse(line)?
        };
        repos.push(repo);
    }
    Ok(repos)
}

/// Load a list of paths (one per line); relative entries are resolved
/// against the list file's own directory.
pub fn load_path_list(path: &Path) -> Result<Vec<PathBuf>> {
    let list = std::fs::canonicalize(path)?;
    let root = list.parent().map(Path::to_path_buf).unwrap_or_default();
    let text = std::fs::read_to_string(&list)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| root.join(l))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_name() {
        let repo = RepoId::parse("apache/deltaspike").unwrap();
        assert_eq!(repo.owner(), "apache");
        assert_eq!(repo.name(), "deltaspike");
        assert_eq!(repo.to_string(), "apache/deltaspike");
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!(RepoId::parse("apache").is_err());
        assert!(RepoId::parse("a/b/c").is_err());
        assert!(RepoId::parse("/b").is_err());
        assert!(RepoId::parse("owner/..").is_err());
        assert!(RepoId::parse("owner/na me").is_err());
    }

    #[test]
    fn test_artifact_paths() {
        let repo = RepoId::parse("google/guava").unwrap();
        let root = Path::new("/data");
        assert_eq!(repo.metadata_path(root), PathBuf::from("/data/google/guava.json"));
        assert_eq!(repo.mirror_path(root), PathBuf::from("/data/google/guava.git"));
        assert_eq!(repo.rev_list_path(root), PathBuf::from("/data/google/guava.rev-list"));
        assert_eq!(repo.database_path(root), PathBuf::from("/data/google/guava.db"));
    }

    #[test]
    fn test_repo_list_accepts_names_and_records() {
        let text = "apache/kafka\n\n{\"full_name\": \"google/guava\", \"id\": 1}\n";
        let repos = parse_repo_list(text).unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].full_name(), "apache/kafka");
        assert_eq!(repos[1].full_name(), "google/guava");
    }

    #[test]
    fn test_path_list_resolves_against_list_dir() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("valid.txt");
        std::fs::write(&list, "dbs/a/b.db\n/abs/c.db\n").unwrap();

        let paths = load_path_list(&list).unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(paths[0], root.join("dbs/a/b.db"));
        assert_eq!(paths[1], PathBuf::from("/abs/c.db"));
    }
}
