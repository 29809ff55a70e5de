use crate::fallback::{DataSummary, GenerativeCollaborator, GenerativeError};
use crate::groq::ChatMessage;
use crate::prompts::{build_user_message, max_tokens_for, ASSISTANT_PERSONA, TEMPERATURE};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const CLAUDE_HAIKU: &str = "claude-3-5-haiku-20241022";

#[derive(Debug, Serialize, Clone)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str) -> Result<Self, GenerativeError> {
        Self::with_base_url(api_key, ANTHROPIC_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, GenerativeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: CLAUDE_HAIKU.to_string(),
        })
    }

    /// Send a messages request; `system_prompt` travels outside the message list.
    pub async fn chat_completion(
        &self,
        system_prompt: Option<&str>,
        messages: Vec<AnthropicMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, GenerativeError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: max_tokens.unwrap_or(1024),
            system: system_prompt.map(|s| s.to_string()),
            messages,
            temperature: Some(temperature),
        };

        let response = self.client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            // Try to parse structured error
            let message = match serde_json::from_str::<AnthropicError>(&error_text) {
                Ok(parsed) => format!("{} - {}", parsed.error.error_type, parsed.error.message),
                Err(_) => error_text,
            };
            return Err(GenerativeError::Api { status, message });
        }

        let completion: MessagesResponse = response.json().await?;

        completion.content
            .iter()
            .filter(|c| c.content_type == "text")
            .last()
            .and_then(|c| c.text.as_ref())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerativeError::EmptyResponse)
    }
}

#[async_trait]
impl GenerativeCollaborator for AnthropicClient {
    async fn answer(&self, question: &str, context: Option<&DataSummary>) -> Result<String, GenerativeError> {
        let (system, messages) = convert_messages(vec![
            ChatMessage {
                role: "system".to_string(),
                content: ASSISTANT_PERSONA.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: build_user_message(question, context),
            },
        ]);

        self.chat_completion(
            system.as_deref(),
            messages,
            TEMPERATURE,
            Some(max_tokens_for(context)),
        )
        .await
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Helper to convert OpenAI-style messages to Anthropic format
/// Extracts system message and returns (system_prompt, messages)
pub fn convert_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_prompt = None;
    let mut anthropic_messages = Vec::new();

    for msg in messages {
        if msg.role == "system" {
            // Accumulate system messages
            if let Some(existing) = system_prompt {
                system_prompt = Some(format!("{}\n\n{}", existing, msg.content));
            } else {
                system_prompt = Some(msg.content);
            }
        } else {
            anthropic_messages.push(AnthropicMessage {
                role: msg.role,
                content: msg.content,
            });
        }
    }

    (system_prompt, anthropic_messages)
}
