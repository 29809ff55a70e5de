use crate::fallback::{DataSummary, GenerativeCollaborator, GenerativeError};
use crate::prompts::{build_prompt, max_tokens_for, TEMPERATURE};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const REQUEST_TIMEOUT_SECS: u64 = 60; // 60 second timeout for API requests

pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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

/// Client for Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: &str) -> Result<Self, GenerativeError> {
        Self::with_base_url(api_key, GROQ_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, GenerativeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: GROQ_DEFAULT_MODEL.to_string(),
        })
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, GenerativeError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens: max_tokens.or(Some(500)),
        };

        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerativeError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion.choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerativeError::EmptyResponse)
    }
}

#[async_trait]
impl GenerativeCollaborator for GroqClient {
    async fn answer(&self, question: &str, context: Option<&DataSummary>) -> Result<String, GenerativeError> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: build_prompt(question, context),
        }];

        self.chat_completion(messages, TEMPERATURE, Some(max_tokens_for(context))).await
    }

    fn name(&self) -> &str {
        "groq"
    }
}
