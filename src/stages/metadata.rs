//! Metadata stage: one JSON document per repository

use crate::fetch::{Clock, FetchOutcome, FetchReport, MetadataSource, RateLimitedFetcher, Token};
use crate::gate;
use crate::repo::RepoId;
use crate::runner::Outcome;
use crate::{Error, Result};
use std::path::PathBuf;

/// Marker written for repositories the API does not know
const NOT_FOUND_MARKER: &[u8] = b"null";

/// `[N requests remaining]`, when the response carried quota headers
fn quota_note(report: &FetchReport) -> Option<String> {
    report
        .rate_limit
        .map(|rate| format!("[{} requests remaining]", rate.remaining))
}

fn with_note(text: &str, note: Option<&str>) -> String {
    match note {
        Some(note) => format!("{} {}", text, note),
        None => text.to_string(),
    }
}

pub struct MetadataStage<S, C> {
    fetcher: RateLimitedFetcher<S, C>,
    token: Token,
    output: PathBuf,
}

impl<S: MetadataSource, C: Clock> MetadataStage<S, C> {
    pub fn new(fetcher: RateLimitedFetcher<S, C>, token: Token, output: PathBuf) -> Self {
        Self {
            fetcher,
            token,
            output,
        }
    }

    /// Fetch and store metadata for one repository.
    ///
    /// Only terminal outcomes produce an artifact; a transient failure
    /// leaves the repository eligible for the next run.
    pub fn process(&self, repo: &RepoId) -> Result<Outcome> {
        let artifact = repo.metadata_path(&self.output);
        if gate::is_done(&artifact) {
            return Ok(Outcome::skipped("already fetched"));
        }

        let report = self.fetcher.fetch(repo, &self.token);
        if let Some(rate) = report.rate_limit {
            tracing::info!(repo = %repo, remaining = rate.remaining, attempts = report.attempts, "fetched");
        }
        let note = quota_note(&report);
        match report.outcome {
            FetchOutcome::Document(doc) => {
                gate::write_atomic(&artifact, &serde_json::to_vec_pretty(&doc)?)?;
                Ok(Outcome::done_with(with_note("done", note.as_deref())))
            }
            FetchOutcome::NotFound => {
                gate::write_atomic(&artifact, NOT_FOUND_MARKER)?;
                Ok(Outcome::skipped(with_note("not found", note.as_deref())))
            }
            FetchOutcome::Transient(reason) => Err(Error::Transient(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{MetadataResponse, RateLimit};
    use chrono::{DateTime, Utc};
    use std::cell::Cell;
    use std::time::Duration;

    struct StaticSource {
        status: u16,
        body: &'static str,
        remaining: Option<u64>,
        calls: Cell<usize>,
    }

    impl MetadataSource for &StaticSource {
        fn get_repo(&self, _repo: &RepoId, _token: &Token) -> Result<MetadataResponse> {
            self.calls.set(self.calls.get() + 1);
            Ok(MetadataResponse {
                status: self.status,
                rate_limit: self.remaining.map(|remaining| RateLimit {
                    remaining,
                    reset_at: Utc::now(),
                }),
                body: self.body.to_string(),
            })
        }
    }

    struct NoSleep;

    impl Clock for NoSleep {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }

        fn sleep(&self, _duration: Duration) {}
    }

    fn stage<'a>(source: &'a StaticSource, output: PathBuf) -> MetadataStage<&'a StaticSource, NoSleep> {
        MetadataStage::new(
            RateLimitedFetcher::with_clock(source, NoSleep),
            Token::new("t"),
            output,
        )
    }

    fn source(status: u16, body: &'static str) -> StaticSource {
        StaticSource {
            status,
            body,
            remaining: None,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_document_written_then_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(200, r#"{"id": 1, "full_name": "apache/kafka"}"#);
        let stage = stage(&source, dir.path().to_path_buf());
        let repo = RepoId::parse("apache/kafka").unwrap();

        assert_eq!(stage.process(&repo).unwrap(), Outcome::done_with("done"));
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("apache/kafka.json")).unwrap()).unwrap();
        assert_eq!(written["id"], 1);

        assert!(matches!(stage.process(&repo).unwrap(), Outcome::Skipped(_)));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_not_found_writes_null_marker() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(404, r#"{"message": "Not Found"}"#);
        let stage = stage(&source, dir.path().to_path_buf());
        let repo = RepoId::parse("gone/away").unwrap();

        assert_eq!(stage.process(&repo).unwrap(), Outcome::skipped("not found"));
        assert_eq!(std::fs::read(dir.path().join("gone/away.json")).unwrap(), b"null");
    }

    #[test]
    fn test_remaining_quota_is_reported_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut found = source(200, r#"{"id": 2}"#);
        found.remaining = Some(4321);
        let stage_found = stage(&found, dir.path().to_path_buf());
        assert_eq!(
            stage_found.process(&RepoId::parse("apache/kafka").unwrap()).unwrap(),
            Outcome::done_with("done [4321 requests remaining]")
        );

        let mut missing = source(404, "{}");
        missing.remaining = Some(4320);
        let stage_missing = stage(&missing, dir.path().to_path_buf());
        assert_eq!(
            stage_missing.process(&RepoId::parse("gone/away").unwrap()).unwrap(),
            Outcome::skipped("not found [4320 requests remaining]")
        );
    }

    #[test]
    fn test_transient_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = source(500, "oops");
        let stage = stage(&source, dir.path().to_path_buf());
        let repo = RepoId::parse("flaky/server").unwrap();

        assert!(matches!(stage.process(&repo), Err(Error::Transient(_))));
        assert!(!dir.path().join("flaky/server.json").exists());
        assert!(!dir.path().join("flaky/.server.partial.json").exists());
    }
}
