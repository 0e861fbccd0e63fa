//! LLM integration module.
//!
//! Provides the OpenAI-compatible client, the answer prompts, per-provider
//! rate limiting and the answer generator built on top of them.

mod client;
mod generator;
mod prompts;
mod rate_limit;

pub use client::{CompletionBackend, CompletionRequest, LlmClient, Message, Role};
pub use generator::{AnswerGenerator, LlmAnswer, LlmAnswerGenerator};
pub use prompts::{Prompts, SystemPrompts};
pub use rate_limit::{RateLimit, RateLimitPolicy, RateLimiter};
