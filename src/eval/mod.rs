//! Evaluation engine.
//!
//! This module provides:
//! - Named retrieval strategies for vector-RAG evaluation
//! - The per-model answer cache that makes runs resumable
//! - The driver that walks models through the question set
//! - Accuracy scoring of persisted outputs

pub mod cache;
pub mod driver;
pub mod scoring;
pub mod strategy;

pub use cache::AnswerCache;
pub use driver::{EvalKind, Evaluation, EvaluationReport, PassSummary, normalized_model_name};
pub use scoring::{ModelScore, ScoreBoard, score_model_outputs, score_record};
pub use strategy::Strategy;
