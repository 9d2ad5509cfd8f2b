//! Repository catalog built from downloaded metadata documents
//!
//! `generate` turns the metadata directory into ordered `RepoRecord`s and
//! `Filter` narrows them down to the candidates worth cloning. Records are
//! stored as JSON Lines, which the repo list loader also accepts.

use crate::gate;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Repositories flagged with any of these are never catalogued
const EXCLUDE_IF_TRUE: &[&str] = &["private", "is_template", "archived", "disabled"];

/// One catalogued repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: u64,
    pub full_name: String,
    pub html_url: String,
    /// Reported in KB
    pub size: u64,
    pub language: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
}

impl RepoRecord {
    fn rank(&self) -> (Reverse<u64>, Reverse<u64>, Reverse<u64>, u64) {
        (
            Reverse(self.stargazers_count),
            Reverse(self.forks_count),
            Reverse(self.open_issues_count),
            self.id,
        )
    }
}

/// Most starred first, then forks, then open issues
pub fn sort_records(records: &mut [RepoRecord]) {
    records.sort_by_key(RepoRecord::rank);
}

/// Forks are catalogued as the repository they were forked from
fn find_root(mut doc: &Value) -> &Value {
    while let Some(parent) = doc.get("parent").filter(|p| !p.is_null()) {
        doc = parent;
    }
    doc
}

fn is_excluded(doc: &Value) -> bool {
    EXCLUDE_IF_TRUE
        .iter()
        .any(|key| doc.get(*key).and_then(Value::as_bool).unwrap_or(false))
}

/// Decode one metadata document. `Ok(None)` means "nothing to catalog".
pub fn load_record(path: &Path) -> Result<Option<RepoRecord>> {
    let text = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&text)?;
    if doc.is_null() {
        return Ok(None);
    }
    let root = find_root(&doc);
    if is_excluded(root) {
        return Ok(None);
    }
    Ok(Some(RepoRecord::deserialize(root)?))
}

/// Scan `{metadata_dir}/**/*.json` into sorted, de-duplicated records
pub fn generate(metadata_dir: &Path) -> Result<Vec<RepoRecord>> {
    let pattern = format!(
        "{}/**/*.json",
        glob::Pattern::escape(&metadata_dir.to_string_lossy())
    );
    let files: Vec<_> = glob::glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    tracing::info!(files = files.len(), dir = %metadata_dir.display(), "scanning metadata");

    let mut by_id: HashMap<u64, RepoRecord> = HashMap::new();
    for file in &files {
        match load_record(file) {
            Ok(Some(record)) => {
                by_id.insert(record.id, record);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    file = %file.display(),
                    error = %e,
                    "failed to decode metadata; delete the file so it is fetched again"
                );
            }
        }
    }

    let mut records: Vec<RepoRecord> = by_id.into_values().collect();
    sort_records(&mut records);
    tracing::info!(repos = records.len(), files = files.len(), "catalog generated");
    Ok(records)
}

/// Candidate selection thresholds
#[derive(Debug, Clone)]
pub struct Filter {
    pub languages: HashSet<String>,
    /// In GB
    pub max_size: f64,
    pub min_stars: u64,
    pub min_forks: u64,
    pub min_open_issues: u64,
    /// Lower-cased; a name containing any of these tokens is dropped
    pub keywords: HashSet<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            languages: HashSet::from(["Java".to_string()]),
            max_size: 2.0,
            min_stars: 64,
            min_forks: 64,
            min_open_issues: 16,
            keywords: HashSet::new(),
        }
    }
}

impl Filter {
    /// Parse a comma-separated language list
    pub fn with_languages(mut self, list: &str) -> Self {
        self.languages = list
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn keeps(&self, record: &RepoRecord) -> bool {
        let language_ok = record
            .language
            .as_ref()
            .is_some_and(|l| self.languages.contains(l));
        language_ok
            && (record.size as f64) <= self.max_size * 1_000_000.0
            && record.stargazers_count >= self.min_stars
            && record.forks_count >= self.min_forks
            && record.open_issues_count >= self.min_open_issues
            && (self.keywords.is_empty()
                || split_identifier(&record.full_name).into_iter().collect::<HashSet<_>>().is_disjoint(&self.keywords))
    }

    /// Keep matching records, sorted like `generate`
    pub fn apply(&self, records: Vec<RepoRecord>) -> Vec<RepoRecord> {
        let mut kept: Vec<RepoRecord> = records.into_iter().filter(|r| self.keeps(r)).collect();
        sort_records(&mut kept);
        kept
    }
}

/// Newline-delimited keyword file, lower-cased
pub fn load_keywords(path: &Path) -> Result<HashSet<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect())
}

fn join_singles(terms: Vec<String>) -> Vec<String> {
    let mut joined = Vec::new();
    let mut run = String::new();
    for term in terms {
        match term.chars().count() {
            0 => {}
            1 => run.push_str(&term),
            _ => {
                if !run.is_empty() {
                    joined.push(std::mem::take(&mut run));
                }
                joined.push(term);
            }
        }
    }
    if !run.is_empty() {
        joined.push(run);
    }
    joined
}

fn split_camel(word: &str) -> Vec<String> {
    let has_upper = word.chars().any(char::is_uppercase);
    let has_lower = word.chars().any(char::is_lowercase);
    if has_upper && !has_lower {
        return vec![word.to_lowercase()];
    }

    let mut cuts = vec![0];
    cuts.extend(
        word.char_indices()
            .filter(|(_, c)| c.is_uppercase() || c.is_numeric())
            .map(|(i, _)| i),
    );
    cuts.push(word.len());
    join_singles(
        cuts.windows(2)
            .map(|w| word[w[0]..w[1]].to_lowercase())
            .collect(),
    )
}

/// Lower-cased tokens of a repository name.
///
/// Splits on spaces, slashes, dashes and underscores, then on camel case
/// and digits; runs of single letters (acronyms) are joined back together.
pub fn split_identifier(name: &str) -> BTreeSet<String> {
    name.split([' ', '/', '\\', '-', '_'])
        .flat_map(split_camel)
        .collect()
}

/// Write records as JSON Lines, atomically
pub fn write_records(path: &Path, records: &[RepoRecord]) -> Result<()> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    gate::write_atomic(path, &out)
}

pub fn read_records(path: &Path) -> Result<Vec<RepoRecord>> {
    let text = std::fs::read_to_string(path)?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}
