// src/evaluator/mod.rs — Relevance evaluation of search results

pub mod parser;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::types::{EvaluationResult, PatentRecord, Verdict};
use crate::infra::config::LlmConfig;
use crate::infra::errors::ScoutError;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::util::ellipsize;

/// Judges one batch of search results against the search intent.
#[async_trait]
pub trait ResultEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        intent: &str,
        records: &[PatentRecord],
    ) -> Result<EvaluationResult, ScoutError>;
}

const SYSTEM_PROMPT: &str = "You are a patent search specialist. You judge whether a batch of \
patent search results satisfies the searcher's intent and which individual patents are relevant.";

/// Abstracts longer than this are cut before they go into the prompt.
const ABSTRACT_CHARS: usize = 300;

/// Evaluator backed by a chat model.
pub struct LlmEvaluator {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    sample_size: usize,
    threshold: f32,
}

impl LlmEvaluator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            sample_size: config.evaluation_sample.max(1),
            threshold: config.satisfaction_threshold,
        }
    }

    fn build_prompt(&self, intent: &str, records: &[PatentRecord]) -> String {
        let shown = records.len().min(self.sample_size);
        let mut listing = String::new();
        for (i, r) in records.iter().take(shown).enumerate() {
            listing.push_str(&format!(
                "{}. [{}] {}\n   Assignee: {} | Published: {}\n   {}\n",
                i + 1,
                r.id,
                r.title,
                if r.assignee.is_empty() { "-" } else { r.assignee.as_str() },
                if r.publication_date.is_empty() { "-" } else { r.publication_date.as_str() },
                ellipsize(&r.snippet, ABSTRACT_CHARS),
            ));
        }

        format!(
            "## Search intent\n{intent}\n\n\
             ## Results (top {shown} of {total})\n{listing}\n\
             Decide whether these results satisfy the search intent, score the overall \
             relevance from 0.0 to 1.0, and list the identifiers (exactly as shown in \
             brackets) of every relevant patent.\n\
             Respond in this format:\n\
             VERDICT: MET or NOT_MET\n\
             SCORE: 0.0-1.0\n\
             RELEVANT: comma-separated identifiers, or NONE\n\
             RATIONALE: one short paragraph",
            total = records.len(),
        )
    }
}

#[async_trait]
impl ResultEvaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        intent: &str,
        records: &[PatentRecord],
    ) -> Result<EvaluationResult, ScoutError> {
        if records.is_empty() {
            return Ok(EvaluationResult {
                verdict: Verdict::NotMet,
                score: 0.0,
                rationale: "No results were returned for this query.".into(),
                relevant_ids: Vec::new(),
            });
        }

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![Message::user(self.build_prompt(intent, records))],
                max_tokens: Some(self.max_tokens),
                temperature: Some(self.temperature),
                system: Some(SYSTEM_PROMPT.into()),
            })
            .await?;

        let result = parser::parse_evaluation(&response.content, records, self.threshold);
        tracing::debug!(
            verdict = %result.verdict,
            score = result.score,
            relevant = result.relevant_ids.len(),
            tokens = response.usage.total(),
            "evaluation parsed"
        );
        Ok(result)
    }
}
