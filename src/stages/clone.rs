//! Clone stage: one bare mirror per repository

use crate::config::GitConfig;
use crate::gate;
use crate::process::ScopedChild;
use crate::repo::RepoId;
use crate::runner::Outcome;
use crate::Result;
use std::path::PathBuf;
use std::process::Command;

pub struct CloneStage {
    git: String,
    base_url: String,
    clones_dir: PathBuf,
}

impl CloneStage {
    pub fn new(config: &GitConfig, clones_dir: PathBuf) -> Self {
        Self {
            git: config.program.clone(),
            base_url: config.clone_base_url.trim_end_matches('/').to_string(),
            clones_dir,
        }
    }

    pub fn clone_url(&self, repo: &RepoId) -> String {
        format!("{}/{}/{}", self.base_url, repo.owner(), repo.name())
    }

    /// Clone into a hidden partial directory and rename it into place
    pub fn process(&self, repo: &RepoId) -> Result<Outcome> {
        let mirror = repo.mirror_path(&self.clones_dir);
        if gate::is_done(&mirror) {
            return Ok(Outcome::skipped("already cloned"));
        }
        gate::ensure_parent(&mirror)?;
        let partial = gate::partial_path(&mirror);
        // Left over from an interrupted run
        gate::discard(&partial);

        let mut command = Command::new(&self.git);
        command
            .args(["clone", "--bare", "--quiet"])
            .arg(self.clone_url(repo))
            .arg(&partial)
            .env("GIT_TERMINAL_PROMPT", "0");

        let result = ScopedChild::spawn(&mut command, "git").and_then(|child| {
            child.stream_lines(|stream, line| {
                tracing::info!(target: "depcorpus::git", repo = %repo, ?stream, "{}", line);
            })
        });
        match result.and_then(|()| gate::promote(&partial, &mirror)) {
            Ok(()) => Ok(Outcome::Done),
            Err(e) => {
                gate::discard(&partial);
                Err(e)
            }
        }
    }
}
