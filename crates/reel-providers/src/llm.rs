//! LLM client for script and storyboard generation.
//!
//! Talks to a chat-completions endpoint. Untyped JSON is accepted here and
//! nowhere else; storyboard output is validated into typed scenes before it
//! leaves this module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reel_models::{Scene, Storyboard};

use crate::error::{ProviderError, ProviderResult};

/// Default per-call timeout for LLM requests.
pub const LLM_TIMEOUT_SECS: u64 = 90;

const SCRIPT_SYSTEM_PROMPT: &str = "You write scripts for 30-45 second vertical videos. \
Respond with exactly three lines labeled HOOK:, BODY: and CTA:. \
Each line is at most 200 characters and the whole script at most 600. \
No introductions, no commentary, no markdown.";

const STORYBOARD_SYSTEM_PROMPT: &str = "You turn a short video script into a storyboard. \
Respond with a JSON array of 5 to 8 scene objects, each with keys \
\"description\" (what the viewer sees), \"image_prompt\" (a detailed \
text-to-image prompt) and \"duration_seconds\" (a number between 2 and 8). \
Total duration must not exceed 45 seconds. Respond with JSON only.";

/// LLM client configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat-completions API base URL
    pub api_base: String,
    /// Bearer credential
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl LlmConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            api_base: std::env::var("LLM_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("LLM_API_KEY")
                .map_err(|_| ProviderError::config("LLM_API_KEY not set"))?,
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(LLM_TIMEOUT_SECS),
        })
    }
}

/// Chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Scene object as the model returns it, before indexing.
#[derive(Debug, Deserialize)]
struct SceneDraft {
    description: String,
    image_prompt: String,
    duration_seconds: f64,
}

impl LlmClient {
    /// Create a new client.
    pub fn new(config: LlmConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    /// Generate a labeled three-section script from a user premise.
    pub async fn script(&self, premise: &str) -> ProviderResult<String> {
        let content = self
            .complete(SCRIPT_SYSTEM_PROMPT, premise)
            .await?;
        let text = strip_code_fences(&content);
        if text.trim().is_empty() {
            return Err(ProviderError::bad_output("empty script completion"));
        }
        Ok(text)
    }

    /// Generate a storyboard from a script.
    ///
    /// Fails with `bad_output` when the response is not a JSON array of
    /// scene objects.
    pub async fn storyboard(&self, script: &str) -> ProviderResult<Storyboard> {
        let content = self
            .complete(STORYBOARD_SYSTEM_PROMPT, script)
            .await?;
        let json = strip_code_fences(&content);

        let drafts: Vec<SceneDraft> = serde_json::from_str(&json)
            .map_err(|e| ProviderError::bad_output(format!("storyboard is not a scene array: {}", e)))?;

        let scenes = drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| Scene {
                index: i as u32,
                description: d.description,
                image_prompt: d.image_prompt,
                duration_seconds: d.duration_seconds,
                placeholder_used: false,
                reason: None,
            })
            .collect();

        Ok(Storyboard::new(scenes))
    }

    /// Run one completion and return the assistant text.
    async fn complete(&self, system: &'static str, user: &str) -> ProviderResult<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.config.api_base);
        debug!(model = %self.config.model, "LLM completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::bad_output(format!("invalid completion payload: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::bad_output("completion has no choices"))
    }
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return trimmed.to_string(),
    };
    without_open
        .trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}
