//! Runtime configuration for the grader.

use std::time::Duration;

use crate::classroom::http::DEFAULT_BASE_URL;
use crate::classroom::ClientConfig;

#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// API root of the classroom service.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Assignments whose submissions are listed concurrently.
    pub fetch_concurrency: usize,
    /// Assignments written back concurrently during reconciliation.
    pub patch_concurrency: usize,
    /// Upper bound on pages followed by one listing.
    pub max_pages: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            fetch_concurrency: 4,
            patch_concurrency: 4,
            max_pages: ClientConfig::default().max_pages,
        }
    }
}

impl GraderConfig {
    /// Defaults overridden by `CLASSROOM_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("CLASSROOM_BASE_URL").unwrap_or(defaults.base_url);

        let timeout = env_parse::<u64>("CLASSROOM_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let fetch_concurrency =
            env_parse("CLASSROOM_FETCH_CONCURRENCY").unwrap_or(defaults.fetch_concurrency);
        let patch_concurrency =
            env_parse("CLASSROOM_PATCH_CONCURRENCY").unwrap_or(defaults.patch_concurrency);

        Self {
            base_url,
            timeout,
            fetch_concurrency,
            patch_concurrency,
            max_pages: defaults.max_pages,
        }
        .normalized()
    }

    /// Clamp concurrency caps to at least one in-flight request.
    pub fn normalized(mut self) -> Self {
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.patch_concurrency = self.patch_concurrency.max(1);
        self.max_pages = self.max_pages.max(1);
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            max_pages: self.max_pages,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
