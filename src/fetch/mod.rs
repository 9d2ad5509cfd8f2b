//! Quota-aware metadata fetching
//!
//! Every response carries the remaining request budget and the time the
//! budget resets. When the budget is exhausted the fetcher blocks until the
//! reset, and a request that was rejected for quota reasons is retried
//! exactly once after such a pause. The quota is read fresh from each
//! response and returned to the caller; nothing is cached between requests.

pub mod github;

use crate::repo::RepoId;
use crate::{ui, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use github::GithubSource;

/// Request budget reported by the metadata source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimit {
    /// Parse the `X-RateLimit-Remaining` / `X-RateLimit-Reset` header values
    pub fn from_header_values(remaining: &str, reset: &str) -> Option<Self> {
        let remaining = remaining.trim().parse::<u64>().ok()?;
        let reset = reset.trim().parse::<i64>().ok()?;
        let reset_at = DateTime::from_timestamp(reset, 0)?;
        Some(Self { remaining, reset_at })
    }

    /// How long to block before the next request, if at all
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining != 0 {
            return None;
        }
        (self.reset_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

/// Access token for the metadata source; never printed
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

/// One raw response from the metadata source
#[derive(Debug, Clone)]
pub struct MetadataResponse {
    pub status: u16,
    pub rate_limit: Option<RateLimit>,
    pub body: String,
}

/// Answers "give me the metadata for this repository"
pub trait MetadataSource {
    fn get_repo(&self, repo: &RepoId, token: &Token) -> Result<MetadataResponse>;
}

/// Wall clock and sleeping, injectable for tests
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Terminal result of a fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Document(serde_json::Value),
    /// The repository does not exist; never retried
    NotFound,
    /// Quota, network or server trouble; the item stays eligible for a later run
    Transient(String),
}

/// Outcome plus the quota state observed on the last response
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub rate_limit: Option<RateLimit>,
    pub paused: Option<Duration>,
    pub attempts: u32,
}

enum Status {
    Success(serde_json::Value),
    NotFound,
    QuotaRejected(u16),
    Failed(String),
}

struct Attempt {
    status: Status,
    rate_limit: Option<RateLimit>,
    paused: Option<Duration>,
}

pub struct RateLimitedFetcher<S, C> {
    source: S,
    clock: C,
}

impl<S: MetadataSource> RateLimitedFetcher<S, SystemClock> {
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock)
    }
}

impl<S: MetadataSource, C: Clock> RateLimitedFetcher<S, C> {
    pub fn with_clock(source: S, clock: C) -> Self {
        Self { source, clock }
    }

    /// Fetch metadata for `repo`, pausing on an exhausted quota and retrying
    /// a quota rejection once after the pause.
    pub fn fetch(&self, repo: &RepoId, token: &Token) -> FetchReport {
        let first = self.attempt(repo, token);
        let retry = matches!(first.status, Status::QuotaRejected(_)) && first.paused.is_some();
        let (last, attempts) = if retry {
            tracing::info!(repo = %repo, "retrying after quota pause");
            // Both the identifier and the credential go into the retry
            (self.attempt(repo, token), 2)
        } else {
            (first, 1)
        };

        let outcome = match last.status {
            Status::Success(doc) => FetchOutcome::Document(doc),
            Status::NotFound => FetchOutcome::NotFound,
            Status::QuotaRejected(code) => {
                FetchOutcome::Transient(format!("rejected by quota (HTTP {})", code))
            }
            Status::Failed(reason) => FetchOutcome::Transient(reason),
        };
        FetchReport {
            outcome,
            rate_limit: last.rate_limit,
            paused: last.paused,
            attempts,
        }
    }

    fn attempt(&self, repo: &RepoId, token: &Token) -> Attempt {
        let response = match self.source.get_repo(repo, token) {
            Ok(response) => response,
            Err(e) => {
                return Attempt {
                    status: Status::Failed(e.to_string()),
                    rate_limit: None,
                    paused: None,
                };
            }
        };

        if let Some(rate) = response.rate_limit {
            tracing::debug!(repo = %repo, remaining = rate.remaining, reset_at = %rate.reset_at, "quota");
        }
        let paused = response.rate_limit.and_then(|rate| self.pause(&rate));

        let status = match response.status {
            200..=299 => match serde_json::from_str(&response.body) {
                Ok(doc) => Status::Success(doc),
                Err(e) => Status::Failed(format!("undecodable metadata: {}", e)),
            },
            404 => Status::NotFound,
            403 | 429 => Status::QuotaRejected(response.status),
            code => Status::Failed(format!("HTTP {}", code)),
        };
        Attempt {
            status,
            rate_limit: response.rate_limit,
            paused,
        }
    }

    fn pause(&self, rate: &RateLimit) -> Option<Duration> {
        let wait = rate.wait_from(self.clock.now())?;
        let until = rate.reset_at.to_rfc3339();
        tracing::warn!(until = %until, seconds = wait.as_secs(), "quota exhausted, pausing");
        ui::pause(&until, wait.as_secs() as i64);
        self.clock.sleep(wait);
        Some(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FakeSource {
        responses: RefCell<VecDeque<Result<MetadataResponse>>>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FakeSource {
        fn new(responses: Vec<Result<MetadataResponse>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl MetadataSource for &FakeSource {
        fn get_repo(&self, repo: &RepoId, token: &Token) -> Result<MetadataResponse> {
            self.calls
                .borrow_mut()
                .push((repo.full_name(), token.expose().to_string()));
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("unexpected extra request")
        }
    }

    struct FakeClock {
        now: DateTime<Utc>,
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Clock for &FakeClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn clock() -> FakeClock {
        FakeClock {
            now: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    fn response(status: u16, remaining: u64, reset_at: DateTime<Utc>, body: &str) -> Result<MetadataResponse> {
        Ok(MetadataResponse {
            status,
            rate_limit: Some(RateLimit { remaining, reset_at }),
            body: body.to_string(),
        })
    }

    fn repo() -> RepoId {
        RepoId::parse("apache/kafka").unwrap()
    }

    #[test]
    fn test_success_returns_document_without_pause() {
        let clock = clock();
        let source = FakeSource::new(vec![response(200, 4999, clock.now, r#"{"id": 7}"#)]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert_eq!(report.outcome, FetchOutcome::Document(serde_json::json!({"id": 7})));
        assert_eq!(report.attempts, 1);
        assert!(report.paused.is_none());
        assert_eq!(report.rate_limit.unwrap().remaining, 4999);
    }

    #[test]
    fn test_not_found_is_terminal() {
        let clock = clock();
        let source = FakeSource::new(vec![response(404, 10, clock.now, "{}")]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert_eq!(report.outcome, FetchOutcome::NotFound);
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn test_quota_rejection_pauses_until_reset_then_retries_once() {
        let clock = clock();
        let reset = clock.now + chrono::Duration::seconds(5);
        let source = FakeSource::new(vec![
            response(403, 0, reset, r#"{"message": "API rate limit exceeded"}"#),
            response(200, 5000, reset + chrono::Duration::hours(1), r#"{"full_name": "apache/kafka"}"#),
        ]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("secret"));
        assert!(matches!(report.outcome, FetchOutcome::Document(_)));
        assert_eq!(report.attempts, 2);
        assert_eq!(*clock.sleeps.borrow(), vec![Duration::from_secs(5)]);

        let calls = source.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("apache/kafka".to_string(), "secret".to_string()));
    }

    #[test]
    fn test_second_quota_rejection_is_transient() {
        let clock = clock();
        let reset = clock.now + chrono::Duration::seconds(30);
        let source = FakeSource::new(vec![
            response(403, 0, reset, "{}"),
            response(403, 12, reset, "{}"),
        ]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert!(matches!(report.outcome, FetchOutcome::Transient(_)));
        assert_eq!(source.calls.borrow().len(), 2);
    }

    #[test]
    fn test_quota_rejection_without_pause_is_not_retried() {
        let clock = clock();
        let source = FakeSource::new(vec![response(403, 17, clock.now, "{}")]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert!(matches!(report.outcome, FetchOutcome::Transient(_)));
        assert_eq!(source.calls.borrow().len(), 1);
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_reset_in_the_past_does_not_pause() {
        let clock = clock();
        let reset = clock.now - chrono::Duration::seconds(3);
        let source = FakeSource::new(vec![response(200, 0, reset, "{}")]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert!(report.paused.is_none());
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_exhausted_quota_on_success_still_pauses() {
        let clock = clock();
        let reset = clock.now + chrono::Duration::seconds(60);
        let source = FakeSource::new(vec![response(200, 0, reset, "{}")]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        let report = fetcher.fetch(&repo(), &Token::new("t"));
        assert!(matches!(report.outcome, FetchOutcome::Document(_)));
        assert_eq!(report.paused, Some(Duration::from_secs(60)));
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_server_errors_and_transport_errors_are_transient() {
        let clock = clock();
        let source = FakeSource::new(vec![
            response(502, 100, clock.now, "bad gateway"),
            Err(Error::Transient("connection reset".to_string())),
            response(200, 100, clock.now, "not json"),
        ]);
        let fetcher = RateLimitedFetcher::with_clock(&source, &clock);

        for _ in 0..3 {
            let report = fetcher.fetch(&repo(), &Token::new("t"));
            assert!(matches!(report.outcome, FetchOutcome::Transient(_)));
        }
        assert_eq!(source.calls.borrow().len(), 3);
    }

    #[test]
    fn test_rate_limit_header_parsing() {
        let rate = RateLimit::from_header_values("0", "1700000005").unwrap();
        assert_eq!(rate.remaining, 0);
        assert_eq!(rate.reset_at.timestamp(), 1_700_000_005);
        assert!(RateLimit::from_header_values("x", "1").is_none());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", Token::new("ghp_abc")), "Token(***)");
    }
}
