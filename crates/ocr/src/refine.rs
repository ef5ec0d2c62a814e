use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RefineConfig;
use crate::types::FieldMap;

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("Refinement request failed: {0}")]
    Network(String),
    #[error("Refinement response malformed: {0}")]
    Parse(String),
}

/// Prompt-completion collaborator that restructures extracted fields.
/// Failures are always non-fatal to the surrounding scan.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, cleaned_text: &str, fields: &FieldMap) -> Result<String, RefineError>;
}

/// Few-shot instruction block for llama2-family models. The worked example
/// teaches the model to answer as a CSV header plus one row.
const PROMPT_TEMPLATE: &str = "\
<s>[INST] <<SYS>>
You are a powerful assistant that extracts and structures information from identity cards.
<</SYS>>[INST]
Prénom et nom (FR): John Wick
Prénom et nom (AR): جون ويك
Date de naissance: 12.09.1980
Lieu de naissance: Washington
CIN: FK9223 [/INST] Prénom et nom (FR),Prénom et nom (AR),Date de naissance,Lieu de naissance,CIN
John Wick,جون ويك,12.09.1980,Washington,FK9223
[INST]
{text}
[/INST]
";

/// Render extracted fields as the newline-delimited `key: value` block the
/// prompt appends after the cleaned text.
pub fn field_summary(fields: &FieldMap) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(cleaned_text: &str, fields: &FieldMap) -> String {
    let text = format!("{cleaned_text}\n{}", field_summary(fields));
    PROMPT_TEMPLATE.replace("{text}", &text)
}

// ── Ollama refiner ────────────────────────────────────────────────────────────

/// Talks to a local Ollama server's non-streaming generate endpoint.
pub struct OllamaRefiner {
    client: reqwest::Client,
    config: RefineConfig,
}

impl OllamaRefiner {
    pub fn new(config: RefineConfig) -> Result<Self, RefineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RefineError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl Refiner for OllamaRefiner {
    async fn refine(&self, cleaned_text: &str, fields: &FieldMap) -> Result<String, RefineError> {
        let prompt = build_prompt(cleaned_text, fields);
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: &prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RefineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefineError::Network(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RefineError::Network(e.to_string()))?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| RefineError::Parse(e.to_string()))?;
        Ok(parsed.response)
    }
}

// ── Mock refiner (always available, used for tests) ───────────────────────────

/// Returns a preset reply, or a forced failure, so pipeline tests can cover
/// the best-effort contract without a model server running.
pub struct MockRefiner {
    reply: Option<String>,
}

impl MockRefiner {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl Refiner for MockRefiner {
    async fn refine(&self, _cleaned_text: &str, _fields: &FieldMap) -> Result<String, RefineError> {
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(RefineError::Network(
                "mock refiner configured to fail".to_string(),
            )),
        }
    }
}
