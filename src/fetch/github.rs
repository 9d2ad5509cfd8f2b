//! GitHub REST metadata source

use super::{MetadataResponse, MetadataSource, RateLimit, Token};
use crate::config::GithubConfig;
use crate::repo::RepoId;
use crate::Result;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use std::time::Duration;

const REMAINING: &str = "x-ratelimit-remaining";
const RESET: &str = "x-ratelimit-reset";

/// `GET /repos/{owner}/{name}` against the GitHub API
pub struct GithubSource {
    client: Client,
    api_base: String,
}

impl GithubSource {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn repo_url(&self, repo: &RepoId) -> String {
        format!("{}/repos/{}/{}", self.api_base, repo.owner(), repo.name())
    }
}

impl MetadataSource for GithubSource {
    fn get_repo(&self, repo: &RepoId, token: &Token) -> Result<MetadataResponse> {
        let response = self
            .client
            .get(self.repo_url(repo))
            .header(AUTHORIZATION, format!("token {}", token.expose()))
            .header(ACCEPT, "application/vnd.github+json")
            .send()?;

        let status = response.status().as_u16();
        let rate_limit = rate_limit_from(response.headers());
        let body = response.text()?;
        Ok(MetadataResponse {
            status,
            rate_limit,
            body,
        })
    }
}

/// Quota headers are optional; a response without them never pauses
pub fn rate_limit_from(headers: &HeaderMap) -> Option<RateLimit> {
    let remaining = headers.get(REMAINING)?.to_str().ok()?;
    let reset = headers.get(RESET)?.to_str().ok()?;
    RateLimit::from_header_values(remaining, reset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_repo_url() {
        let config = GithubConfig {
            api_base: "https://api.example.com/".to_string(),
            ..GithubConfig::default()
        };
        let source = GithubSource::new(&config).unwrap();
        let repo = RepoId::parse("apache/kafka").unwrap();
        assert_eq!(source.repo_url(&repo), "https://api.example.com/repos/apache/kafka");
    }

    #[test]
    fn test_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let rate = rate_limit_from(&headers).unwrap();
        assert_eq!(rate.remaining, 42);
        assert_eq!(rate.reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_headers_yield_none() {
        assert!(rate_limit_from(&HeaderMap::new()).is_none());
    }
}
