//! OpenAI-compatible LLM client.
//!
//! Works with any OpenAI-compatible endpoint, including LiteLLM proxies that
//! route `ollama/...`, `gemini/...` and `openai/...` model names.

use crate::config::LlmConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One structured completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f32,
}

/// Something that can answer a [`CompletionRequest`] with the raw JSON
/// content of a single, non-streamed `{"answer": ...}` payload.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete_structured(&self, request: &CompletionRequest) -> Result<String>;
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    delta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// JSON schema of the structured answer payload.
fn answer_response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "LLMResponse",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "answer": {
                        "type": "string",
                        "description": "The answer to the question"
                    }
                },
                "required": ["answer"],
                "additionalProperties": false
            }
        }
    })
}

/// Extract the message content from a completion response body.
///
/// Streamed responses (SSE bodies, `chat.completion.chunk` objects or
/// `delta` choices) and empty content are errors; nothing is defaulted.
pub(crate) fn parse_completion_body(content_type: Option<&str>, body: &str) -> Result<String> {
    if content_type.is_some_and(|ct| ct.contains("text/event-stream"))
        || body.trim_start().starts_with("data:")
    {
        return Err(EvalError::StreamingResponse);
    }

    let completion: ChatCompletionResponse = serde_json::from_str(body)?;

    if completion.object.as_deref() == Some("chat.completion.chunk") {
        return Err(EvalError::StreamingResponse);
    }

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EvalError::LlmApi("No choices in response".to_string()))?;

    let message = match (choice.message, choice.delta) {
        (Some(message), _) => message,
        (None, Some(_)) => return Err(EvalError::StreamingResponse),
        (None, None) => return Err(EvalError::EmptyResponse),
    };

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(EvalError::EmptyResponse),
    }
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }

    /// Send a chat completion request and return the message content.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<Message>,
        temperature: f32,
        response_format: Option<serde_json::Value>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature,
            stream: false,
            response_format,
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            // Try to parse as API error
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(EvalError::LlmApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(EvalError::LlmApi(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        parse_completion_body(content_type.as_deref(), &body)
    }

    /// Test connectivity to the API with the given model.
    pub async fn test_connection(&self, model: &str) -> Result<()> {
        let messages = vec![Message::user("Say 'hello' and nothing else.")];

        let content = self.chat(model, messages, 0.0, None).await?;

        if content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(EvalError::LlmApi(format!(
                "Unexpected response: {}",
                content
            )))
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete_structured(&self, request: &CompletionRequest) -> Result<String> {
        let messages = vec![
            Message::system(&request.system_prompt),
            Message::user(&request.user_message),
        ];
        self.chat(
            &request.model,
            messages,
            request.temperature,
            Some(answer_response_format()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let config = LlmConfig {
            api_base: "http://localhost:4000/".to_string(),
            ..Default::default()
        };
        let client = LlmClient::new(config);
        assert_eq!(client.endpoint(), "http://localhost:4000/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatCompletionRequest {
            model: "ollama/qwen3:4b".to_string(),
            messages: vec![Message::system("sys"), Message::user("q")],
            max_tokens: None,
            temperature: 0.0,
            stream: false,
            response_format: Some(answer_response_format()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["response_format"]["json_schema"]["name"], "LLMResponse");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_structured_content() {
        let body = r#"{"object":"chat.completion","choices":[{"message":{"role":"assistant","content":"{\"answer\": \"c\"}"},"finish_reason":"stop"}]}"#;
        let content = parse_completion_body(Some("application/json"), body).unwrap();
        assert_eq!(content, r#"{"answer": "c"}"#);
    }

    #[test]
    fn test_parse_rejects_streaming() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"C\"}}]}\n\n";
        assert!(matches!(
            parse_completion_body(Some("text/event-stream"), sse),
            Err(EvalError::StreamingResponse)
        ));
        assert!(matches!(
            parse_completion_body(None, sse),
            Err(EvalError::StreamingResponse)
        ));

        let chunk = r#"{"object":"chat.completion.chunk","choices":[{"delta":{"content":"C"}}]}"#;
        assert!(matches!(
            parse_completion_body(None, chunk),
            Err(EvalError::StreamingResponse)
        ));

        let delta_only = r#"{"choices":[{"delta":{"content":"C"}}]}"#;
        assert!(matches!(
            parse_completion_body(None, delta_only),
            Err(EvalError::StreamingResponse)
        ));
    }

    #[test]
    fn test_parse_rejects_empty_content() {
        for body in [
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant"}}]}"#,
        ] {
            assert!(matches!(
                parse_completion_body(None, body),
                Err(EvalError::EmptyResponse)
            ));
        }

        assert!(matches!(
            parse_completion_body(None, r#"{"choices":[]}"#),
            Err(EvalError::LlmApi(_))
        ));
    }
}
