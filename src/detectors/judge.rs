//! LLM judge oracle adapter
//!
//! Submits a compact repository summary to an external chat-completions
//! judge and parses the strict-JSON verdict. The judge is best-effort: a
//! missing credential or any adapter failure produces a skipped/error
//! record with `implementation_score` 0 and the pipeline proceeds.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::summary::generate_repo_summary;

/// Judge API base URL (OpenAI-compatible chat completions)
const JUDGE_API_BASE: &str = "https://api.x.ai/v1";

/// Judge model
const JUDGE_MODEL: &str = "grok-4-1-fast-reasoning";

/// Maximum retries for the judge call
const MAX_RETRIES: usize = 3;

/// Initial retry delay in milliseconds
const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// The judge's verdict over a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVerdict {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tech_stack_observed: Vec<String>,
    #[serde(default)]
    pub implementation_score: f64,
    #[serde(default)]
    pub positive_feedback: String,
    #[serde(default)]
    pub constructive_feedback: String,
    /// "Production Ready", "Prototype", or "Broken"
    #[serde(default)]
    pub verdict: String,
}

impl JudgeVerdict {
    /// Record used when the judge is unavailable
    pub fn skipped(reason: &str) -> Self {
        Self {
            project_name: "Unknown".to_string(),
            description: reason.to_string(),
            features: Vec::new(),
            tech_stack_observed: Vec::new(),
            implementation_score: 0.0,
            positive_feedback: String::new(),
            constructive_feedback: String::new(),
            verdict: "Skipped".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Judge oracle client
pub struct JudgeClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl JudgeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: JUDGE_MODEL.to_string(),
        }
    }

    /// Summarize the working copy and request a verdict.
    pub async fn evaluate(&self, repo_path: &Path) -> Result<JudgeVerdict> {
        let context = generate_repo_summary(repo_path);
        let prompt = build_prompt(&context);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message { role: "user".to_string(), content: prompt }],
            temperature: 0.2,
            max_tokens: 2048,
        };

        let mut delay = INITIAL_RETRY_DELAY_MS;
        let mut last_err = anyhow!("judge not attempted");
        for attempt in 1..=MAX_RETRIES {
            match self.call_once(&request).await {
                Ok(verdict) => {
                    info!("Judge verdict: {} ({})", verdict.verdict, verdict.implementation_score);
                    return Ok(verdict);
                }
                Err(e) => {
                    warn!("Judge attempt {}/{} failed: {}", attempt, MAX_RETRIES, e);
                    last_err = e;
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn call_once(&self, request: &ChatCompletionRequest) -> Result<JudgeVerdict> {
        let response = self
            .client
            .post(format!("{}/chat/completions", JUDGE_API_BASE))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("Judge request failed")?
            .error_for_status()
            .context("Judge returned an error status")?
            .json::<ChatCompletionResponse>()
            .await
            .context("Judge response was not valid JSON")?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("Judge returned no choices"))?;

        parse_verdict(content)
    }
}

fn build_prompt(context: &str) -> String {
    format!(
        r#"You are a Senior CTO judging a hackathon. Analyze the following codebase summary.

OUTPUT MUST BE VALID JSON ONLY. NO MARKDOWN.

JSON Schema:
{{
    "project_name": "inferred name",
    "description": "1 sentence summary",
    "features": ["list", "of", "features"],
    "tech_stack_observed": ["list", "of", "libs"],
    "implementation_score": 0-100,
    "positive_feedback": "string",
    "constructive_feedback": "string",
    "verdict": "Production Ready / Prototype / Broken"
}}

CODEBASE CONTEXT:
{context}"#
    )
}

/// Parse the judge's reply, tolerating markdown code fences
fn parse_verdict(content: &str) -> Result<JudgeVerdict> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    serde_json::from_str(body).context("Judge verdict was not the expected JSON shape")
}
