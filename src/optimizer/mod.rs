// src/optimizer/mod.rs — LLM-driven query rewriting

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::types::{EvaluationResult, IterationSummary};
use crate::infra::config::LlmConfig;
use crate::infra::errors::ScoutError;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::util::ellipsize;

/// Everything the optimizer sees about the iteration it is rewriting.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeInput<'a> {
    pub query: &'a str,
    pub evaluation: &'a EvaluationResult,
    pub result_count: usize,
    pub requested: u32,
    /// Earlier iterations of the same session, oldest first.
    pub history: &'a [IterationSummary],
}

/// Proposes a revised query from evaluation feedback.
///
/// Returns a non-empty query. It may equal the input; the caller treats that
/// as convergence.
#[async_trait]
pub trait QueryOptimizer: Send + Sync {
    async fn optimize(&self, input: OptimizeInput<'_>) -> Result<String, ScoutError>;
}

const SYSTEM_PROMPT: &str = "You optimize patent search queries. Given the current query, \
how many results it returned, and an evaluation of those results, propose exactly one better \
query. Reply with the query only: no explanation, no label, no quotes.";

/// Only the most recent iterations go into the prompt.
const HISTORY_WINDOW: usize = 3;
const RATIONALE_CHARS: usize = 200;

/// Labels models tend to put in front of the query.
const REPLY_PREFIXES: &[&str] = &[
    "optimized query",
    "revised query",
    "improved query",
    "suggested query",
    "new query",
    "query",
    "提案クエリ",
    "改善クエリ",
    "最適化クエリ",
];

/// Strategy hint derived from how many results came back.
pub(crate) fn abstraction_hint(result_count: usize, requested: u32) -> &'static str {
    if result_count == 0 {
        "The query returned no results. Broaden it: use higher-level concepts and fewer \
         restrictive terms (e.g. \"folding wings for flying cars\" -> \"variable-geometry \
         wings for vehicles\")."
    } else if result_count >= requested as usize {
        "The query filled the whole result page. Narrow it: use more specific sub-concepts \
         (e.g. \"autonomous driving\" -> \"urban autonomous driving control method\")."
    } else {
        "The result count is moderate. Keep the current level of abstraction and adjust \
         terms to improve relevance."
    }
}

/// Reduce a model reply to the bare query string.
pub(crate) fn clean_reply(reply: &str) -> String {
    let Some(line) = reply.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return String::new();
    };

    let mut query = line;
    for prefix in REPLY_PREFIXES {
        if let Some(head) = query.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                let rest = query[prefix.len()..].trim_start();
                if let Some(rest) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：')) {
                    query = rest.trim();
                    break;
                }
            }
        }
    }

    query
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '「' | '」' | '“' | '”'))
        .trim()
        .to_string()
}

/// Optimizer backed by a chat model.
pub struct LlmQueryOptimizer {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmQueryOptimizer {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_prompt(&self, input: &OptimizeInput<'_>) -> String {
        let mut prompt = format!(
            "Current query: {}\n\
             Results returned: {} (requested {})\n\
             Evaluation: {} (score {:.2})\n\
             Rationale: {}\n\n\
             {}\n",
            input.query,
            input.result_count,
            input.requested,
            input.evaluation.verdict,
            input.evaluation.score,
            ellipsize(&input.evaluation.rationale, RATIONALE_CHARS),
            abstraction_hint(input.result_count, input.requested),
        );

        let start = input.history.len().saturating_sub(HISTORY_WINDOW);
        let recent = &input.history[start..];
        if !recent.is_empty() {
            prompt.push_str("\nEarlier queries in this session:\n");
            for h in recent {
                prompt.push_str(&format!(
                    "- {} ({} results, score {:.2}): {}\n",
                    h.query,
                    h.results,
                    h.score,
                    ellipsize(&h.rationale, RATIONALE_CHARS),
                ));
            }
        }

        prompt.push_str("\nPropose one better query.");
        prompt
    }
}

#[async_trait]
impl QueryOptimizer for LlmQueryOptimizer {
    async fn optimize(&self, input: OptimizeInput<'_>) -> Result<String, ScoutError> {
        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(self.build_prompt(&input))],
                max_tokens: Some(self.max_tokens),
                temperature: Some(self.temperature),
                system: Some(SYSTEM_PROMPT.into()),
            })
            .await?;

        let query = clean_reply(&response.content);
        if query.is_empty() {
            return Err(ScoutError::upstream(
                self.provider.id(),
                "model returned an empty query",
            ));
        }

        tracing::debug!(from = input.query, to = %query, "query rewritten");
        Ok(query)
    }
}
