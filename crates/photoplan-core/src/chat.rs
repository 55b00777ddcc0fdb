//! OpenAI-compatible chat-completion client.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{LlmConfig, USER_AGENT};
use crate::error::PlanError;

/// Something that answers a system + user prompt pair with text.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String, PlanError>;
}

impl<F> ChatBackend for F
where
    F: Fn(&str, &str) -> Result<String, PlanError> + Send + Sync,
{
    fn complete(&self, system: &str, user: &str) -> Result<String, PlanError> {
        self(system, user)
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client for `POST {base_url}/chat/completions`.
pub struct OpenAiChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self, PlanError> {
        let api_key = config.api_key.clone().ok_or(PlanError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlanError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        info!(url = %config.base_url, model = %config.model, "initializing chat backend");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

impl ChatBackend for OpenAiChat {
    fn complete(&self, system: &str, user: &str) -> Result<String, PlanError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage::new("system", system), ChatMessage::new("user", user)],
        };
        debug!(prompt_len = user.len(), "sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| PlanError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PlanError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let result: ChatCompletionResponse = response
            .json()
            .map_err(|e| PlanError::Transport(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(PlanError::EmptyResponse)?;

        debug!(response_len = content.len(), "chat completion received");
        Ok(content)
    }
}
