//! History Eval - a resumable multiple-choice benchmark for language models.
//!
//! Models answer a fixed set of history questions either from parametric
//! knowledge alone ("basic") or with context retrieved from a knowledge-chunk
//! corpus ("vector RAG"). Every (model, strategy) pair keeps its own answer
//! record on disk, so an interrupted run only asks for what is still missing.
//!
//! # Quick Start
//!
//! ```no_run
//! use history_eval::{
//!     config::Config,
//!     eval::Evaluation,
//!     llm::{LlmAnswerGenerator, LlmClient},
//!     persistence::load_qa_set,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let qa_set = load_qa_set(&config.data.qa_set_path())?;
//!     let client = LlmClient::new(config.llm.clone());
//!     let limits = config.rate_limits.clone();
//!
//!     let factory = |model: &str, system_prompt: &str| {
//!         LlmAnswerGenerator::new(client.clone(), model, system_prompt, limits.limit_for(model))
//!     };
//!
//!     let report = Evaluation::basic(config.models.clone(), &qa_set, factory, config.data.evals_root())
//!         .with_max_questions(Some(50))
//!         .run()
//!         .await?;
//!     report.scores.print_summary("basic");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **qa / persistence**: question sets, knowledge chunks and atomic JSON records
//! - **llm**: OpenAI-compatible client, prompts, rate limiting and answer generation
//! - **retrieval**: vector index, chunking and cross-encoder re-ranking
//! - **eval**: strategies, answer cache, evaluation driver and scoring

pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod persistence;
pub mod qa;
pub mod retrieval;

// Re-export commonly used types
pub use config::Config;
pub use error::{EvalError, Result};
pub use eval::{Evaluation, ScoreBoard, Strategy};
pub use llm::LlmClient;
pub use qa::{KnowledgeChunks, QuestionAnswer, QuestionAnswerCollection, QuestionId};
