//! Chat-completions generator (OpenRouter-compatible)

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationError, GenerationResult, GraphGenerator, SYSTEM_INSTRUCTION};
use crate::config::GeneratorConfig;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// User-facing message for a non-success HTTP status
pub(crate) fn status_message(status: u16, body: &str) -> String {
    match status {
        401 => "Invalid or missing API key. Please check your generator API key configuration."
            .to_string(),
        403 => "API access forbidden. Please check your API key permissions.".to_string(),
        429 => "API rate limit exceeded. Please try again later.".to_string(),
        _ => {
            let detail = serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| body.trim().to_string());
            if detail.is_empty() {
                format!("Generator API error: {status}")
            } else {
                format!("Generator API error: {status} - {detail}")
            }
        }
    }
}

/// Blocking client for an OpenRouter-style `/chat/completions` endpoint
pub struct OpenRouterClient {
    http: reqwest::blocking::Client,
    config: GeneratorConfig,
}

impl OpenRouterClient {
    pub fn new(config: GeneratorConfig) -> GenerationResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_key(&self) -> GenerationResult<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(GenerationError::NotConfigured)
    }
}

impl OpenRouterClient {
    /// One non-streaming chat completion: `system` then `prompt`
    fn complete(&self, system: &str, prompt: &str) -> GenerationResult<String> {
        let key = self.api_key()?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .header("X-Title", "Flowdraft")
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: status_message(status.as_u16(), &body),
            });
        }

        let reply: ChatResponse = response.json()?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::Failed("no response generated".into()))?;
        debug!("generator returned {} characters", content.len());
        Ok(content)
    }
}

impl GraphGenerator for OpenRouterClient {
    fn generate_graph(&self, prompt: &str) -> GenerationResult<String> {
        info!("requesting flowchart from {} ({})", self.config.endpoint, self.config.model);
        self.complete(SYSTEM_INSTRUCTION, prompt)
    }

    fn generate_code(&self, instruction: &str, prompt: &str) -> GenerationResult<String> {
        info!("requesting code from {} ({})", self.config.endpoint, self.config.model);
        self.complete(instruction, prompt).map_err(|e| match e {
            GenerationError::Failed(msg) => GenerationError::Code(msg),
            other => other,
        })
    }
}
