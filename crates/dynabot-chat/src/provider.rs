//! Generation providers.
//!
//! [`GeminiProvider`] calls the Gemini `generateContent` REST endpoint and
//! keeps the running conversation history itself, so every call carries the
//! full context. [`ScriptedProvider`] replays canned replies for tests and
//! offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dynabot_core::config::ProviderConfig;

use crate::error::ProviderError;

/// A chat session with an external text generation service.
#[async_trait]
pub trait GenerationProvider: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Send one user turn and return the model's text.
    ///
    /// On success the exchange joins the session history; a failed call
    /// leaves the history unchanged.
    async fn send_message(&mut self, prompt: &str) -> Result<String, ProviderError>;

    /// Number of messages (user and model) held in the session history.
    fn history_len(&self) -> usize;
}

// =============================================================================
// Gemini REST provider
// =============================================================================

/// Provider backed by the Gemini HTTP API.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    system_instruction: Option<String>,
    history: Vec<Content>,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ProviderConfig::default().base_url,
            system_instruction: None,
            history: Vec::new(),
        }
    }

    /// Start a session from configuration.
    ///
    /// Fails when no API key is configured.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::SessionUnavailable(
                "no Gemini API key configured".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::SessionUnavailable(
                "no Gemini model configured".to_string(),
            ));
        }

        let mut provider = Self::new(config.api_key.clone(), config.model.clone())
            .with_base_url(config.base_url.clone());
        if !config.system_instruction.trim().is_empty() {
            provider = provider.with_system_instruction(config.system_instruction.clone());
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Instruction sent alongside every request.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(Content::text("user", prompt));

        GenerateContentRequest {
            contents,
            system_instruction: self.system_instruction.as_deref().map(|text| SystemInstruction {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }),
        }
    }

    async fn send_request(&self, body: &GenerateContentRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("invalid response body: {}", e.without_url()))
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send_message(&mut self, prompt: &str) -> Result<String, ProviderError> {
        let request = self.build_request(prompt);
        let text = self.send_request(&request).await?;

        self.history.push(Content::text("user", prompt));
        self.history.push(Content::text("model", &text));
        debug!(
            model = %self.model,
            history = self.history.len(),
            "Gemini turn completed"
        );
        Ok(text)
    }

    fn history_len(&self) -> usize {
        self.history.len()
    }
}

// -- Wire types --

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text_response(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(ProviderError::MalformedResponse(format!(
            "prompt blocked: {}",
            reason
        )));
    }

    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "no text in response candidates".to_string(),
        ));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{}: {}", status_text, msg)
            }
        })
        .unwrap_or_else(|_| body.to_string());

    ProviderError::Http {
        status: status.as_u16(),
        message,
    }
}

// =============================================================================
// Scripted provider
// =============================================================================

/// Shared record of the prompts a [`ScriptedProvider`] received.
#[derive(Debug, Clone, Default)]
pub struct PromptLog(Arc<Mutex<Vec<String>>>);

impl PromptLog {
    pub fn prompts(&self) -> Vec<String> {
        self.0.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, prompt: &str) {
        if let Ok(mut prompts) = self.0.lock() {
            prompts.push(prompt.to_string());
        }
    }
}

/// Provider that replays a fixed queue of replies in order.
///
/// Once the queue is empty every call fails with a request error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: VecDeque<Result<String, ProviderError>>,
    prompts: PromptLog,
    history: usize,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            prompts: PromptLog::default(),
            history: 0,
        }
    }

    /// A provider that answers every reply in `texts` successfully.
    pub fn replying<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// Handle for inspecting prompts after the provider is moved.
    pub fn prompt_log(&self) -> PromptLog {
        self.prompts.clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send_message(&mut self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.push(prompt);
        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Request("no scripted reply left".to_string())));
        if reply.is_ok() {
            self.history += 2;
        }
        reply
    }

    fn history_len(&self) -> usize {
        self.history
    }
}

// =============================================================================
// Tests
// =============================================================================
