// src/provider/openai.rs — OpenAI Chat Completions provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, TokenUsage};
use crate::infra::errors::ScoutError;

const SERVICE: &str = "openai";

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn with_base_url(api_key: String, client: reqwest::Client, base_url: String) -> Self {
        Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Build the JSON body for `/chat/completions`.
pub(crate) fn build_body(request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    for m in &request.messages {
        messages.push(serde_json::json!({ "role": m.role.as_str(), "content": m.content }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

/// Extract content and usage from a completion response.
pub(crate) fn parse_response(resp: &serde_json::Value) -> Result<ChatResponse, ScoutError> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ScoutError::upstream(SERVICE, "response has no message content"))?
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    Ok(ChatResponse { content, usage })
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// 429 covers both per-minute rate limits and `insufficient_quota`.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> ScoutError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ScoutError::quota(SERVICE, detail);
    }
    ScoutError::upstream(SERVICE, format!("HTTP {}: {}", status, detail))
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        SERVICE
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ScoutError> {
        let body = build_body(&request);

        tracing::debug!(model = %request.model, "POST {}/chat/completions", self.base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoutError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_body));
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| {
            ScoutError::upstream(SERVICE, format!("Failed to parse response: {}", e))
        })?;

        let parsed = parse_response(&resp)?;
        tracing::debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "chat completion received"
        );
        Ok(parsed)
    }
}
