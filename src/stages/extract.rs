//! Extraction stage: run the dependency extractor over a mirror's history

use crate::config::{ExtractorConfig, GitConfig};
use crate::gate;
use crate::process::{run_captured, ScopedChild};
use crate::repo::RepoId;
use crate::runner::Outcome;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct ExtractStage {
    git: String,
    extractor: ExtractorConfig,
    clones_dir: PathBuf,
    dbs_dir: PathBuf,
}

/// Absolute form of a path whose parent exists
fn absolute(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let parent = fs::canonicalize(parent)?;
    Ok(match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

impl ExtractStage {
    pub fn new(git: &GitConfig, extractor: &ExtractorConfig, clones_dir: PathBuf, dbs_dir: PathBuf) -> Self {
        Self {
            git: git.program.clone(),
            extractor: extractor.clone(),
            clones_dir,
            dbs_dir,
        }
    }

    /// Arguments passed to the extractor, in order
    pub fn extractor_args(&self, output: &Path, rev_list: &Path) -> Vec<String> {
        vec![
            format!("--output={}", output.display()),
            "-D".to_string(),
            format!("-l{}", self.extractor.language),
            format!("--{}={}", self.extractor.memory_flag, self.extractor.memory_ceiling),
            rev_list.display().to_string(),
        ]
    }

    /// `git rev-list HEAD` in the mirror, stored next to the database
    fn write_rev_list(&self, mirror: &Path, rev_list: &Path) -> Result<()> {
        if gate::is_done(rev_list) {
            return Ok(());
        }
        let mut command = Command::new(&self.git);
        command.args(["rev-list", "HEAD"]).current_dir(mirror);
        let revisions = run_captured(&mut command, "git")?;
        gate::write_atomic(rev_list, &revisions)
    }

    pub fn process(&self, repo: &RepoId) -> Result<Outcome> {
        let db = repo.database_path(&self.dbs_dir);
        if gate::is_done(&db) {
            return Ok(Outcome::skipped("already extracted"));
        }
        let mirror = repo.mirror_path(&self.clones_dir);
        if !mirror.is_dir() {
            return Ok(Outcome::skipped("not cloned"));
        }

        let rev_list = repo.rev_list_path(&self.dbs_dir);
        self.write_rev_list(&mirror, &rev_list)?;

        // The extractor runs inside the mirror, so hand it absolute paths
        let partial = absolute(&gate::partial_path(&db))?;
        let rev_list = absolute(&rev_list)?;
        gate::discard(&partial);

        let mut command = Command::new(&self.extractor.program);
        command
            .args(self.extractor_args(&partial, &rev_list))
            .current_dir(&mirror);
        tracing::info!(repo = %repo, program = %self.extractor.program, "running extractor");

        let tool = self.extractor.program.as_str();
        let result = ScopedChild::spawn(&mut command, tool)
            .and_then(|child| {
                child.stream_lines(|stream, line| {
                    tracing::info!(target: "depcorpus::extractor", repo = %repo, ?stream, "{}", line);
                })
            })
            .and_then(|()| {
                if partial.is_file() {
                    gate::promote(&partial, &db)
                } else {
                    Err(Error::ToolFailure {
                        tool: tool.to_string(),
                        status: "exited 0 without writing a database".to_string(),
                    })
                }
            });

        match result {
            Ok(()) => Ok(Outcome::Done),
            Err(e) => {
                gate::discard(&partial);
                Err(e)
            }
        }
    }
}
