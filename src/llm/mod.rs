// Language model boundary
// A completion model takes one fully assembled prompt and returns the answer text


use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::LlmConfig;
use crate::http::{RetryPolicy, build_agent};
use crate::{RagError, Result};

/// Text completion service
pub trait CompletionModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
#[derive(Clone)]
pub struct ChatClient {
    endpoint: Url,
    model: String,
    temperature: f32,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &"<redacted>")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Build a client, reading the API key from the configured environment variable
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| RagError::Config(format!("Invalid LLM base URL '{}': {}", config.base_url, e)))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: api_key.into(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry: RetryPolicy::with_attempts(config.retry_attempts),
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_completion(&self, prompt: &str) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;
        let authorization = format!("Bearer {}", self.api_key);

        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.chars().count()
        );

        let response_text = self
            .retry
            .execute(self.endpoint.as_str(), || {
                self.agent
                    .post(self.endpoint.as_str())
                    .header("Content-Type", "application/json")
                    .header("Authorization", &authorization)
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Chat completion request failed")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no message content"))
    }
}

impl CompletionModel for ChatClient {
    #[inline]
    fn complete(&self, prompt: &str) -> Result<String> {
        let answer = self
            .request_completion(prompt)
            .map_err(|e| RagError::Llm(format!("{:#}", e)))?;
        info!(
            "Received {} chars from {}",
            answer.chars().count(),
            self.model
        );
        Ok(answer)
    }
}
