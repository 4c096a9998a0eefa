// src/cli/search.rs — Default command: run a search session

use std::sync::Arc;

use crate::core::orchestrator::{Orchestrator, SessionOutcome};
use crate::core::types::{PatentRecord, SessionConfig};
use crate::evaluator::LlmEvaluator;
use crate::infra::config::Config;
use crate::infra::errors::ScoutError;
use crate::optimizer::LlmQueryOptimizer;
use crate::provider::openai::OpenAIProvider;
use crate::provider::ModelProvider;
use crate::search::serpapi::SerpApiClient;
use crate::util::truncate_str;

use super::progress::terminal_progress;

pub const SERPAPI_KEY_VAR: &str = "SERPAPI_KEY";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Results listed on stdout after a session.
const SHOWN_RESULTS: usize = 10;

/// Read a required credential from the environment.
pub fn require_key(var: &'static str) -> Result<String, ScoutError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ScoutError::MissingApiKey { var }),
    }
}

/// Execute one search session and print its results.
pub async fn run_search(query: &str, config: &Config) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        return Err(ScoutError::EmptyQuery.into());
    }

    let serpapi_key = require_key(SERPAPI_KEY_VAR)?;
    let openai_key = require_key(OPENAI_KEY_VAR)?;

    let client = config.http.build_client()?;
    let provider: Arc<dyn ModelProvider> = Arc::new(OpenAIProvider::with_base_url(
        openai_key,
        client.clone(),
        config.llm.base_url.clone(),
    ));
    tracing::debug!("Using model {} via {}", config.llm.model, provider.id());

    let search = Arc::new(SerpApiClient::new(serpapi_key, client, &config.search));
    let evaluator = Arc::new(LlmEvaluator::new(provider.clone(), &config.llm));
    let optimizer = Arc::new(LlmQueryOptimizer::new(provider, &config.llm));

    let session_config = SessionConfig::from(config);
    let orchestrator = Orchestrator::new(search, evaluator, optimizer, session_config)
        .with_progress(terminal_progress());

    let outcome = orchestrator.run(query).await?;
    print_outcome(&outcome);

    if outcome.is_failure() {
        if let Some(e) = outcome.failure {
            return Err(e.into());
        }
    }
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome) {
    let session = &outcome.session;

    println!();
    println!("Query:        {}", session.query);
    if session.final_query != session.query {
        println!("Final query:  {}", session.final_query);
    }
    println!(
        "Iterations:   {} ({})",
        session.iterations, session.stop_reason
    );
    println!("Results:      {}", session.results_count);
    if let Some(last) = session.evaluations.last() {
        println!("Evaluation:   {} (score {:.2})", last.verdict, last.score);
        println!("Rationale:    {}", truncate_str(&last.rationale, 400));
    }
    println!("Cached:       {} relevant patent(s)", outcome.cached);
    if let Some(ref path) = outcome.history_path {
        println!("History:      {}", path.display());
    }

    if outcome.final_results.is_empty() {
        return;
    }
    println!();
    println!("Top {} result(s):", outcome.final_results.len().min(SHOWN_RESULTS));
    for (i, record) in outcome.final_results.iter().take(SHOWN_RESULTS).enumerate() {
        println!("{}", format_result_line(i + 1, record));
    }
}

/// `"  3. [*] US1234567B2  Title (Assignee)"`, `*` marking relevant hits.
pub fn format_result_line(rank: usize, record: &PatentRecord) -> String {
    let mark = if record.relevant { '*' } else { ' ' };
    let assignee = if record.assignee.is_empty() {
        String::new()
    } else {
        format!(" ({})", record.assignee)
    };
    format!(
        "{:>3}. [{}] {}  {}{}",
        rank,
        mark,
        record.id,
        truncate_str(&record.title, 100),
        assignee
    )
}
