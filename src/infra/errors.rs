// src/infra/errors.rs — Error types for patentscout

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    // Input errors (fatal, reported immediately)
    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("Environment variable {var} is not set. Add it to your shell or a .env file.")]
    MissingApiKey { var: &'static str },

    // Upstream errors (abort the current session)
    #[error("{service} error: {message}")]
    Upstream { service: String, message: String },

    #[error("{service} quota exhausted: {message}. Wait for the quota to reset and retry.")]
    QuotaExceeded { service: String, message: String },

    // Non-fatal: converted into a warning by the cache loader
    #[error("Cache file {} is corrupt: {message}", path.display())]
    CacheCorrupt { path: PathBuf, message: String },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScoutError {
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        ScoutError::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn quota(service: impl Into<String>, message: impl Into<String>) -> Self {
        ScoutError::QuotaExceeded {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Quota exhaustion is a kind of upstream failure.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ScoutError::Upstream { .. } | ScoutError::QuotaExceeded { .. }
        )
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, ScoutError::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_upstream() {
        let e = ScoutError::quota("serpapi", "run out of searches");
        assert!(e.is_upstream());
        assert!(e.is_quota());
    }

    #[test]
    fn test_upstream_is_not_quota() {
        let e = ScoutError::upstream("openai", "HTTP 500");
        assert!(e.is_upstream());
        assert!(!e.is_quota());
    }

    #[test]
    fn test_empty_query_not_upstream() {
        assert!(!ScoutError::EmptyQuery.is_upstream());
    }

    #[test]
    fn test_quota_message_tells_user_to_wait() {
        let e = ScoutError::quota("serpapi", "HTTP 429");
        let msg = e.to_string();
        assert!(msg.contains("serpapi"));
        assert!(msg.contains("Wait"));
    }

    #[test]
    fn test_missing_key_message() {
        let e = ScoutError::MissingApiKey {
            var: "SERPAPI_KEY",
        };
        assert!(e.to_string().contains("SERPAPI_KEY"));
    }
}
