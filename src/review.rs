use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a senior software engineer performing code reviews.";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("LLM API key not configured (set GROQ_API_KEY or llm.api_key)")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM response contained no message")]
    EmptyResponse,
}

/// Produces a free-text code review for a diff.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review_diff(&self, diff: &str) -> Result<String, ReviewError>;
}

/// Build the user message sent alongside the system prompt.
pub fn review_prompt(diff: &str) -> String {
    format!(
        "Review this code diff:\n\n\
         {diff}\n\n\
         Provide:\n\
         - Potential bugs\n\
         - Architectural concerns\n\
         - Simplification suggestions\n\
         - Security issues\n\n\
         Use bullet points."
    )
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, ReviewError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ReviewError::EmptyResponse)
    }
}

/// Reviewer backed by an OpenAI-compatible chat-completion endpoint.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone().map(SecretString::new),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Reviewer for ChatCompletionClient {
    #[instrument(skip(self, diff), fields(diff_bytes = diff.len()))]
    async fn review_diff(&self, diff: &str) -> Result<String, ReviewError> {
        let api_key = self.api_key.as_ref().ok_or(ReviewError::MissingApiKey)?;
        let prompt = review_prompt(diff);

        debug!(model = %self.model, "requesting chat completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&self.request(&prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(ReviewError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.json::<ChatResponse>().await?.into_text()?;
        debug!(review_bytes = text.len(), "received review");
        Ok(text)
    }
}
