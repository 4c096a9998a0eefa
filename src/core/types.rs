// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::infra::config::Config;
use crate::util::normalize_patent_id;

/// One patent result as returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentRecord {
    /// Normalized publication number (see `normalize_patent_id`).
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub snippet: String,
    pub assignee: String,
    pub publication_date: String,
    #[serde(default)]
    pub filing_date: String,
    #[serde(default)]
    pub inventors: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub relevant: bool,
}

impl PatentRecord {
    pub fn new(id: &str, title: impl Into<String>) -> Self {
        Self {
            id: normalize_patent_id(id),
            title: title.into(),
            snippet: String::new(),
            assignee: String::new(),
            publication_date: String::new(),
            filing_date: String::new(),
            inventors: Vec::new(),
            link: None,
            relevant: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Met,
    NotMet,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Met => write!(f, "met"),
            Verdict::NotMet => write!(f, "not met"),
        }
    }
}

/// The evaluator's judgment of one batch of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    pub score: f32,
    pub rationale: String,
    /// Normalized identifiers of records judged relevant.
    pub relevant_ids: Vec<String>,
}

impl EvaluationResult {
    pub fn is_satisfied(&self) -> bool {
        self.verdict == Verdict::Met
    }
}

/// What history keeps of each search-evaluate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub query: String,
    pub results: usize,
    pub verdict: Verdict,
    pub score: f32,
    pub relevant: usize,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    StoppedEarly,
    Failed,
}

/// Why the loop reached DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Satisfied,
    MaxIterations,
    OptimizeDisabled,
    Converged,
    OptimizerFailed,
    EvaluationFailed,
    SearchFailed,
}

impl StopReason {
    pub fn status(self) -> SessionStatus {
        match self {
            StopReason::Satisfied
            | StopReason::MaxIterations
            | StopReason::OptimizeDisabled
            | StopReason::Converged => SessionStatus::Completed,
            StopReason::OptimizerFailed => SessionStatus::StoppedEarly,
            StopReason::EvaluationFailed | StopReason::SearchFailed => SessionStatus::Failed,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Satisfied => "satisfied",
            StopReason::MaxIterations => "max iterations reached",
            StopReason::OptimizeDisabled => "optimization disabled",
            StopReason::Converged => "query converged",
            StopReason::OptimizerFailed => "optimizer failed",
            StopReason::EvaluationFailed => "evaluation failed",
            StopReason::SearchFailed => "search failed",
        };
        write!(f, "{s}")
    }
}

/// One finished session, written once to the history directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: String,
    pub query: String,
    pub final_query: String,
    pub iterations: u32,
    pub results_count: usize,
    pub evaluations: Vec<IterationSummary>,
    pub status: SessionStatus,
    pub stop_reason: StopReason,
    pub timestamp: DateTime<Utc>,
}

/// Explicit states of the search loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Searching,
    Evaluating,
    Optimizing,
    Done(StopReason),
}

/// Options the orchestrator is constructed with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_results: u32,
    pub max_iterations: u32,
    pub optimize_enabled: bool,
    pub cache_path: PathBuf,
    pub history_dir: PathBuf,
    pub pause: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(c: &Config) -> Self {
        Self {
            max_results: c.search.max_results,
            max_iterations: c.iteration.max_iterations,
            optimize_enabled: c.iteration.optimize,
            cache_path: c.storage.cache_path.clone(),
            history_dir: c.storage.history_dir.clone(),
            pause: Duration::from_millis(c.iteration.pause_ms),
        }
    }
}

/// Real-time progress events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    SessionStart {
        query: String,
        max_iterations: u32,
        cached_for_query: usize,
    },
    SearchStart {
        iteration: u32,
        query: String,
    },
    ResultsReady {
        iteration: u32,
        count: usize,
    },
    Evaluated {
        iteration: u32,
        verdict: Verdict,
        score: f32,
        relevant: usize,
    },
    QueryRewritten {
        iteration: u32,
        query: String,
    },
    Complete {
        iterations: u32,
        total_results: usize,
        relevant_cached: usize,
        stop_reason: StopReason,
    },
}
