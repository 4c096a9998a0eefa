// src/core/orchestrator.rs — Search-evaluate-optimize loop

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use super::types::*;
use crate::evaluator::ResultEvaluator;
use crate::infra::errors::ScoutError;
use crate::optimizer::{OptimizeInput, QueryOptimizer};
use crate::search::PatentSearch;
use crate::storage::cache::{CacheEntry, CacheStore};
use crate::storage::history::HistoryRecorder;

/// Drives one session through `Init -> Searching -> Evaluating ->
/// (Optimizing -> Searching)* -> Done`.
pub struct Orchestrator {
    search: Arc<dyn PatentSearch>,
    evaluator: Arc<dyn ResultEvaluator>,
    optimizer: Arc<dyn QueryOptimizer>,
    config: SessionConfig,
    /// Optional callback for real-time progress events.
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send>>,
}

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionOutcome {
    pub session: SearchSession,
    /// Results of the last successful search, relevance flags applied.
    pub final_results: Vec<PatentRecord>,
    /// Relevant records written to the cache by this session.
    pub cached: usize,
    pub history_path: Option<PathBuf>,
    /// The upstream error that ended the session, if any.
    pub failure: Option<ScoutError>,
}

impl SessionOutcome {
    /// True when the session ended on an error the user must see.
    pub fn is_failure(&self) -> bool {
        self.session.status == SessionStatus::Failed
    }
}

/// Mutable bookkeeping for one run of the loop.
struct RunState {
    original_query: String,
    query: String,
    /// Search passes completed so far.
    pass: u32,
    results: Vec<PatentRecord>,
    last_evaluation: Option<EvaluationResult>,
    summaries: Vec<IterationSummary>,
    /// Relevant records across passes with the query that surfaced them.
    relevant: BTreeMap<String, (PatentRecord, String)>,
    total_results: usize,
    failure: Option<ScoutError>,
    cache: Option<CacheStore>,
}

impl RunState {
    fn new(query: &str) -> Self {
        Self {
            original_query: query.to_string(),
            query: query.to_string(),
            pass: 0,
            results: Vec::new(),
            last_evaluation: None,
            summaries: Vec::new(),
            relevant: BTreeMap::new(),
            total_results: 0,
            failure: None,
            cache: None,
        }
    }
}

/// Transition out of `Evaluating`.
///
/// Satisfaction is checked first, then the iteration limit, then whether
/// optimization is enabled.
pub fn next_after_evaluation(
    evaluation: &EvaluationResult,
    pass: u32,
    config: &SessionConfig,
) -> LoopState {
    if evaluation.is_satisfied() {
        LoopState::Done(StopReason::Satisfied)
    } else if pass >= config.max_iterations.max(1) {
        LoopState::Done(StopReason::MaxIterations)
    } else if !config.optimize_enabled {
        LoopState::Done(StopReason::OptimizeDisabled)
    } else {
        LoopState::Optimizing
    }
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn PatentSearch>,
        evaluator: Arc<dyn ResultEvaluator>,
        optimizer: Arc<dyn QueryOptimizer>,
        config: SessionConfig,
    ) -> Self {
        Self {
            search,
            evaluator,
            optimizer,
            config,
            on_progress: None,
        }
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run one session for `query`.
    ///
    /// Only a blank query is returned as `Err`. Upstream failures end the
    /// session and are reported in `SessionOutcome::failure`; cache and
    /// history are still written for the passes that completed.
    pub async fn run(&self, query: &str) -> Result<SessionOutcome, ScoutError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScoutError::EmptyQuery);
        }

        let mut run = RunState::new(query);
        let mut state = LoopState::Init;

        let reason = loop {
            state = match state {
                LoopState::Init => self.init(&mut run),
                LoopState::Searching => self.search_pass(&mut run).await,
                LoopState::Evaluating => self.evaluate_pass(&mut run).await,
                LoopState::Optimizing => self.optimize_pass(&mut run).await,
                LoopState::Done(reason) => break reason,
            };
        };

        Ok(self.finish(run, reason))
    }

    fn init(&self, run: &mut RunState) -> LoopState {
        let cache = CacheStore::load(&self.config.cache_path);
        let cached_for_query = cache.count_for_query(&run.original_query);
        if cached_for_query > 0 {
            tracing::info!(
                "{} cached patent(s) already recorded for this query",
                cached_for_query
            );
        }
        run.cache = Some(cache);

        self.emit(ProgressEvent::SessionStart {
            query: run.original_query.clone(),
            max_iterations: self.config.max_iterations,
            cached_for_query,
        });
        LoopState::Searching
    }

    async fn search_pass(&self, run: &mut RunState) -> LoopState {
        let iteration = run.pass + 1;
        tracing::info!(
            "Iteration {}/{}: {}",
            iteration,
            self.config.max_iterations,
            run.query
        );
        self.emit(ProgressEvent::SearchStart {
            iteration,
            query: run.query.clone(),
        });

        match self.search.search(&run.query, self.config.max_results).await {
            Ok(results) => {
                run.pass = iteration;
                run.total_results += results.len();
                if results.is_empty() {
                    tracing::warn!("No results found for: {}", run.query);
                }
                self.emit(ProgressEvent::ResultsReady {
                    iteration,
                    count: results.len(),
                });
                run.results = results;
                LoopState::Evaluating
            }
            Err(e) => {
                tracing::error!("Search failed on iteration {}: {}", iteration, e);
                run.failure = Some(e);
                LoopState::Done(StopReason::SearchFailed)
            }
        }
    }

    async fn evaluate_pass(&self, run: &mut RunState) -> LoopState {
        let evaluation = match self
            .evaluator
            .evaluate(&run.original_query, &run.results)
            .await
        {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Evaluation failed on iteration {}: {}", run.pass, e);
                run.failure = Some(e);
                return LoopState::Done(StopReason::EvaluationFailed);
            }
        };

        for record in run.results.iter_mut() {
            record.relevant = evaluation.relevant_ids.contains(&record.id);
            if record.relevant {
                run.relevant
                    .insert(record.id.clone(), (record.clone(), run.query.clone()));
            }
        }

        run.summaries.push(IterationSummary {
            iteration: run.pass,
            query: run.query.clone(),
            results: run.results.len(),
            verdict: evaluation.verdict,
            score: evaluation.score,
            relevant: evaluation.relevant_ids.len(),
            rationale: evaluation.rationale.clone(),
            timestamp: Utc::now(),
        });

        self.emit(ProgressEvent::Evaluated {
            iteration: run.pass,
            verdict: evaluation.verdict,
            score: evaluation.score,
            relevant: evaluation.relevant_ids.len(),
        });

        let next = next_after_evaluation(&evaluation, run.pass, &self.config);
        run.last_evaluation = Some(evaluation);
        next
    }

    async fn optimize_pass(&self, run: &mut RunState) -> LoopState {
        let Some(evaluation) = run.last_evaluation.as_ref() else {
            return LoopState::Done(StopReason::OptimizerFailed);
        };

        // The current pass is the last summary; earlier ones are history.
        let history = &run.summaries[..run.summaries.len().saturating_sub(1)];
        let input = OptimizeInput {
            query: &run.query,
            evaluation,
            result_count: run.results.len(),
            requested: self.config.max_results,
            history,
        };

        let revised = match self.optimizer.optimize(input).await {
            Ok(q) => q.trim().to_string(),
            Err(e) => {
                tracing::warn!(
                    "Query optimization failed: {}. Keeping results for: {}",
                    e,
                    run.query
                );
                return LoopState::Done(StopReason::OptimizerFailed);
            }
        };

        if revised == run.query {
            tracing::info!("Optimizer returned the same query; stopping");
            return LoopState::Done(StopReason::Converged);
        }

        self.emit(ProgressEvent::QueryRewritten {
            iteration: run.pass + 1,
            query: revised.clone(),
        });
        run.query = revised;

        if !self.config.pause.is_zero() {
            tokio::time::sleep(self.config.pause).await;
        }
        LoopState::Searching
    }

    /// `Done`: persist relevant records and write one history entry.
    fn finish(&self, mut run: RunState, reason: StopReason) -> SessionOutcome {
        let now = Utc::now();
        let mut cache = run
            .cache
            .take()
            .unwrap_or_else(|| CacheStore::load(&self.config.cache_path));

        let cached = cache.upsert(run.relevant.values().map(|(record, query)| {
            (
                record.id.clone(),
                CacheEntry::from_record(record, query, now),
            )
        }));
        if cached > 0 {
            if let Err(e) = cache.flush() {
                tracing::warn!("Failed to write cache {}: {}", cache.path().display(), e);
            }
        }

        // The final query is the last one that was actually searched.
        let final_query = run
            .summaries
            .last()
            .map(|s| s.query.clone())
            .unwrap_or_else(|| run.query.clone());

        let session = SearchSession {
            id: uuid::Uuid::new_v4().to_string(),
            query: run.original_query,
            final_query,
            iterations: run.pass,
            results_count: run.total_results,
            evaluations: run.summaries,
            status: reason.status(),
            stop_reason: reason,
            timestamp: now,
        };

        let history_path = match HistoryRecorder::new(&self.config.history_dir).append(&session) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to save search history: {}", e);
                None
            }
        };

        self.emit(ProgressEvent::Complete {
            iterations: session.iterations,
            total_results: session.results_count,
            relevant_cached: cached,
            stop_reason: reason,
        });

        SessionOutcome {
            session,
            final_results: run.results,
            cached,
            history_path,
            failure: run.failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(verdict: Verdict) -> EvaluationResult {
        EvaluationResult {
            verdict,
            score: 0.5,
            rationale: String::new(),
            relevant_ids: vec![],
        }
    }

    fn config(max_iterations: u32, optimize_enabled: bool) -> SessionConfig {
        SessionConfig {
            max_iterations,
            optimize_enabled,
            ..Default::default()
        }
    }

    #[test]
    fn test_satisfied_wins_over_everything() {
        let e = evaluation(Verdict::Met);
        assert_eq!(
            next_after_evaluation(&e, 1, &config(3, true)),
            LoopState::Done(StopReason::Satisfied)
        );
        assert_eq!(
            next_after_evaluation(&e, 3, &config(3, false)),
            LoopState::Done(StopReason::Satisfied)
        );
    }

    #[test]
    fn test_limit_reached() {
        let e = evaluation(Verdict::NotMet);
        assert_eq!(
            next_after_evaluation(&e, 3, &config(3, true)),
            LoopState::Done(StopReason::MaxIterations)
        );
    }

    #[test]
    fn test_optimize_disabled() {
        let e = evaluation(Verdict::NotMet);
        assert_eq!(
            next_after_evaluation(&e, 1, &config(3, false)),
            LoopState::Done(StopReason::OptimizeDisabled)
        );
    }

    #[test]
    fn test_continue_to_optimizing() {
        let e = evaluation(Verdict::NotMet);
        assert_eq!(
            next_after_evaluation(&e, 2, &config(3, true)),
            LoopState::Optimizing
        );
    }

    #[test]
    fn test_zero_limit_treated_as_one() {
        let e = evaluation(Verdict::NotMet);
        assert_eq!(
            next_after_evaluation(&e, 1, &config(0, true)),
            LoopState::Done(StopReason::MaxIterations)
        );
    }
}
