//! Turns a question (and optional context) into a single-letter answer.

use super::client::{CompletionBackend, CompletionRequest};
use super::prompts::Prompts;
use super::rate_limit::{RateLimit, RateLimiter};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured answer payload returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmAnswer {
    /// The answer to the question.
    pub answer: String,
}

impl LlmAnswer {
    /// Parse the structured payload. A blank answer counts as an empty response.
    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(content.trim()).map_err(|e| {
            EvalError::LlmParse(format!("expected {{\"answer\": ...}} payload: {}", e))
        })?;
        if parsed.answer.trim().is_empty() {
            return Err(EvalError::EmptyResponse);
        }
        Ok(parsed)
    }
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: Option<&[String]>) -> Result<LlmAnswer>;
}

/// Rate-limited generator backed by a completion endpoint.
pub struct LlmAnswerGenerator<C> {
    model: String,
    system_prompt: String,
    temperature: f32,
    backend: C,
    limiter: RateLimiter,
}

impl<C: CompletionBackend> LlmAnswerGenerator<C> {
    pub fn new(
        backend: C,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        limit: RateLimit,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: 0.0,
            backend,
            limiter: RateLimiter::new(limit),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.limiter.limit()
    }
}

#[async_trait]
impl<C: CompletionBackend> AnswerGenerator for LlmAnswerGenerator<C> {
    async fn generate(&self, question: &str, context: Option<&[String]>) -> Result<LlmAnswer> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_message: Prompts::user_message(question, context),
            temperature: self.temperature,
        };

        self.limiter.acquire().await;
        let content = self.backend.complete_structured(&request).await?;
        LlmAnswer::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Backend that records requests and replays a fixed reply.
    #[derive(Clone)]
    struct RecordingBackend {
        reply: Arc<dyn Fn() -> Result<String> + Send + Sync>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl RecordingBackend {
        fn replying(reply: impl Fn() -> Result<String> + Send + Sync + 'static) -> Self {
            Self {
                reply: Arc::new(reply),
                requests: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete_structured(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            (self.reply)()
        }
    }

    #[tokio::test]
    async fn test_generate_sends_raw_question_without_context() {
        let backend = RecordingBackend::replying(|| Ok(r#"{"answer": "b"}"#.to_string()));
        let generator = LlmAnswerGenerator::new(
            backend.clone(),
            "ollama/qwen3:4b",
            "system",
            RateLimit::new(60, 60),
        );

        let answer = generator.generate("Q1", None).await.unwrap();
        assert_eq!(answer.answer, "b");

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_message, "Q1");
        assert_eq!(requests[0].system_prompt, "system");
        assert_eq!(requests[0].model, "ollama/qwen3:4b");
        assert_eq!(requests[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_generate_prepends_context() {
        let backend = RecordingBackend::replying(|| Ok(r#"{"answer": "A"}"#.to_string()));
        let generator =
            LlmAnswerGenerator::new(backend.clone(), "m", "sys", RateLimit::new(60, 60));

        let context = vec!["doc one".to_string()];
        generator.generate("Q1", Some(&context)).await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].user_message.starts_with("Context:\n[1] doc one"));
        assert!(requests[0].user_message.ends_with("Q1"));
    }

    #[tokio::test]
    async fn test_empty_response_propagates() {
        let backend = RecordingBackend::replying(|| Err(EvalError::EmptyResponse));
        let generator = LlmAnswerGenerator::new(backend, "m", "sys", RateLimit::new(60, 60));

        let err = generator.generate("Q1", None).await.unwrap_err();
        assert!(matches!(err, EvalError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_unstructured_reply_is_parse_error() {
        let backend = RecordingBackend::replying(|| Ok("C".to_string()));
        let generator = LlmAnswerGenerator::new(backend, "m", "sys", RateLimit::new(60, 60));

        assert!(matches!(
            generator.generate("Q1", None).await,
            Err(EvalError::LlmParse(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_structured_answer_is_empty_response() {
        for reply in [r#"{"answer": ""}"#, r#"{"answer": "  \n"}"#] {
            let backend = RecordingBackend::replying(move || Ok(reply.to_string()));
            let generator = LlmAnswerGenerator::new(backend, "m", "sys", RateLimit::new(60, 60));

            assert!(matches!(
                generator.generate("Q1", None).await,
                Err(EvalError::EmptyResponse)
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_is_throttled() {
        let backend = RecordingBackend::replying(|| Ok(r#"{"answer": "A"}"#.to_string()));
        let generator =
            LlmAnswerGenerator::new(backend.clone(), "gemini/x", "sys", RateLimit::new(8, 60));
        let start = Instant::now();

        for _ in 0..9 {
            generator.generate("Q", None).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(backend.requests.lock().unwrap().len(), 9);
    }
}
