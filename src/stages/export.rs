//! Export stage: list the extracted databases that pass the validity gate

use crate::gate;
use crate::repo::RepoId;
use crate::runner::{Outcome, RunSummary, StageRunner};
use crate::storage::is_valid;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub summary: RunSummary,
    /// Databases that passed the checks in this run
    pub valid: Vec<PathBuf>,
    /// Entries in the written list, including ones kept from an earlier run
    pub listed: usize,
}

/// How a database path is written into a list stored in `list_dir`
fn list_entry(list_dir: &Path, db: &Path) -> String {
    let db = fs::canonicalize(db).unwrap_or_else(|_| db.to_path_buf());
    match db.strip_prefix(list_dir) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => db.display().to_string(),
    }
}

fn read_entries(output: &Path) -> Result<Vec<String>> {
    if !output.exists() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(output)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Check every scheduled repository's database and write the passing paths,
/// in input order, to `output`.
///
/// Repositories outside the schedule keep whatever the existing list said
/// about them, so a run with `--skip` never drops earlier results.
pub fn export_valid(
    runner: &StageRunner,
    repos: &[RepoId],
    dbs_dir: &Path,
    output: &Path,
) -> Result<ExportReport> {
    gate::ensure_parent(output)?;
    let list_dir = match output.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::canonicalize(parent)?,
        None => std::env::current_dir()?,
    };
    let previous = read_entries(output)?;

    let mut valid = Vec::new();
    let mut checked: HashMap<String, bool> = HashMap::new();
    let summary = runner.run(repos, |repo| {
        let db = repo.database_path(dbs_dir);
        let passed = is_valid(&db);
        checked.insert(list_entry(&list_dir, &db), passed);
        if passed {
            valid.push(db);
            Ok(Outcome::Done)
        } else {
            Ok(Outcome::skipped("invalid"))
        }
    });

    let kept: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let mut entries = Vec::new();
    let mut known = HashSet::new();
    for repo in repos {
        let entry = list_entry(&list_dir, &repo.database_path(dbs_dir));
        let listed = match checked.get(&entry) {
            Some(passed) => *passed,
            None => kept.contains(entry.as_str()),
        };
        known.insert(entry.clone());
        if listed {
            entries.push(entry);
        }
    }
    let carried = previous.iter().filter(|e| !known.contains(*e)).count();
    if carried > 0 {
        tracing::warn!(output = %output.display(), carried, "keeping entries for repositories not in the input list");
    }
    entries.extend(previous.into_iter().filter(|e| !known.contains(e)));

    let mut text = String::new();
    for entry in &entries {
        text.push_str(entry);
        text.push('\n');
    }
    gate::write_atomic(output, text.as_bytes())?;
    tracing::info!(output = %output.display(), valid = valid.len(), listed = entries.len(), "database list written");

    Ok(ExportReport {
        summary,
        valid,
        listed: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::load_path_list;
    use crate::runner::Schedule;
    use crate::storage::fixtures;

    fn save(dbs: &Path, repo: &RepoId, db: &crate::CorpusDb) {
        let path = repo.database_path(dbs);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        db.conn()
            .execute("VACUUM INTO ?1", [path.to_str().unwrap()])
            .unwrap();
    }

    #[test]
    fn test_only_valid_databases_are_listed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = dir.path().join("dbs");
        let repos: Vec<RepoId> = ["b/valid", "a/empty", "c/missing", "a/valid"]
            .iter()
            .map(|s| RepoId::parse(s).unwrap())
            .collect();

        save(&dbs, &repos[0], &fixtures::sample_db());
        save(&dbs, &repos[1], &fixtures::empty_db());
        save(&dbs, &repos[3], &fixtures::sample_db());

        let output = dir.path().join("valid-dbs.txt");
        let runner = StageRunner::new("export", Schedule::default());
        let report = export_valid(&runner, &repos, &dbs, &output).unwrap();

        assert_eq!(report.summary.done, 2);
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "dbs/b/valid.db\ndbs/a/valid.db\n"
        );
        assert!(!dbs.join("c/missing.db").exists());

        let listed = load_path_list(&output).unwrap();
        assert!(listed.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_databases_outside_list_dir_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = dir.path().join("dbs");
        let repo = RepoId::parse("a/valid").unwrap();
        save(&dbs, &repo, &fixtures::sample_db());

        let output = dir.path().join("lists/valid.txt");
        let runner = StageRunner::new("export", Schedule::default());
        export_valid(&runner, &[repo.clone()], &dbs, &output).unwrap();

        let line = fs::read_to_string(&output).unwrap();
        let path = PathBuf::from(line.trim());
        assert!(path.is_absolute());
        assert_eq!(path, fs::canonicalize(repo.database_path(&dbs)).unwrap());
    }

    #[test]
    fn test_skipped_prefix_keeps_earlier_entries() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = dir.path().join("dbs");
        let repos: Vec<RepoId> = ["a/one", "b/two", "c/three"]
            .iter()
            .map(|s| RepoId::parse(s).unwrap())
            .collect();
        save(&dbs, &repos[0], &fixtures::sample_db());
        save(&dbs, &repos[2], &fixtures::sample_db());

        let output = dir.path().join("valid-dbs.txt");
        let full = StageRunner::new("export", Schedule::default());
        export_valid(&full, &repos, &dbs, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "dbs/a/one.db\ndbs/c/three.db\n");

        // b/two gets extracted later; only the tail is re-checked
        save(&dbs, &repos[1], &fixtures::sample_db());
        let tail = StageRunner::new("export", Schedule::new(1, 1).unwrap());
        let report = export_valid(&tail, &repos, &dbs, &output).unwrap();

        assert_eq!(report.summary.visited, 2);
        assert_eq!(report.valid.len(), 2);
        assert_eq!(report.listed, 3);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "dbs/a/one.db\ndbs/b/two.db\ndbs/c/three.db\n"
        );
    }

    #[test]
    fn test_rechecked_database_that_turned_invalid_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = dir.path().join("dbs");
        let repo = RepoId::parse("a/one").unwrap();
        save(&dbs, &repo, &fixtures::sample_db());

        let output = dir.path().join("valid-dbs.txt");
        let runner = StageRunner::new("export", Schedule::default());
        export_valid(&runner, &[repo.clone()], &dbs, &output).unwrap();

        fs::remove_file(repo.database_path(&dbs)).unwrap();
        let report = export_valid(&runner, &[repo], &dbs, &output).unwrap();
        assert_eq!(report.listed, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }
}
