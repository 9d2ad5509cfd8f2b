//! # depcorpus - Dependency Database Corpus Builder
//!
//! Drives a resumable sequence of stages over thousands of GitHub
//! repositories and leaves one queryable dependency database per repository.
//!
//! depcorpus provides:
//! - Idempotent, `skip`/`step` partitionable stage execution
//! - Quota-aware metadata fetching with a single pause-and-retry
//! - Bare mirror cloning and streamed external extractor runs
//! - Ancestor and owning-file closure tables over the entity forest
//! - Validity screening and per-file line metrics

pub mod repo;
pub mod config;
pub mod gate;
pub mod runner;
pub mod process;
pub mod fetch;
pub mod catalog;
pub mod storage;
pub mod linecount;
pub mod stages;
pub mod ui;

// Re-exports for convenient access
pub use repo::RepoId;
pub use runner::{Outcome, RunSummary, Schedule, StageRunner};
pub use storage::{CorpusDb, IntegrityError};

/// Result type alias for depcorpus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for depcorpus operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid repository name: {0}")]
    InvalidRepo(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Data integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited unsuccessfully ({status})")]
    ToolFailure { tool: String, status: String },

    #[error("Malformed line counter report: {0}")]
    Report(String),

    #[error("Config error: {0}")]
    Config(String),
}
