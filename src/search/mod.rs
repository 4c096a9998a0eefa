// src/search/mod.rs — Patent search backends

pub mod serpapi;

use async_trait::async_trait;

use crate::core::types::PatentRecord;
use crate::infra::errors::ScoutError;

/// A patent search API.
///
/// Implementations return at most `count` records, in the backend's ranking
/// order. Blank queries fail with `ScoutError::EmptyQuery`; no retries.
#[async_trait]
pub trait PatentSearch: Send + Sync {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<PatentRecord>, ScoutError>;
}
