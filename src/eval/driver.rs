//! Incremental, resumable evaluation driver.
//!
//! Each model gets its own answer record under
//! `<output_root>/<kind>[/<strategy>]/<model>.json`. A pass only asks the
//! model about questions that have no non-empty answer yet, so an interrupted
//! run picks up where it left off and failed questions are retried next time.

use super::cache::AnswerCache;
use super::scoring::{ScoreBoard, score_model_outputs};
use super::strategy::Strategy;
use crate::error::{EvalError, Result};
use crate::llm::{AnswerGenerator, SystemPrompts};
use crate::persistence::RECORD_EXTENSION;
use crate::qa::QuestionAnswerCollection;
use crate::retrieval::ContextRetriever;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Which evaluation is being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalKind {
    /// Parametric knowledge only.
    Basic,
    /// Answers grounded in retrieved context.
    VectorRag(Strategy),
}

impl EvalKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            EvalKind::Basic => "basic",
            EvalKind::VectorRag(_) => "vector_rag",
        }
    }

    /// Directory holding every model record for this kind (and strategy).
    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        let dir = output_root.join(self.dir_name());
        match self {
            EvalKind::Basic => dir,
            EvalKind::VectorRag(strategy) => dir.join(strategy.name()),
        }
    }

    fn system_prompt<'p>(&self, prompts: &'p SystemPrompts) -> &'p str {
        match self {
            EvalKind::Basic => &prompts.basic,
            EvalKind::VectorRag(_) => &prompts.vector_rag,
        }
    }
}

/// Filesystem-safe model name: everything after the last `/`.
///
/// `"ollama/granite3.3:2b"` becomes `"granite3.3:2b"`.
pub fn normalized_model_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

/// Outcome of one model's pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub model: String,
    /// Questions in scope for this pass.
    pub attempted: usize,
    /// Newly answered this pass.
    pub answered: usize,
    /// Already answered by an earlier run.
    pub skipped: usize,
    /// Left unanswered for a later run.
    pub failed: usize,
    pub output_path: PathBuf,
}

/// Per-model summaries plus the scores over the whole output directory.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub passes: Vec<PassSummary>,
    pub scores: ScoreBoard,
}

/// Drives models through the question set for one evaluation kind.
///
/// `factory` builds an answer generator from `(model, system_prompt)`.
pub struct Evaluation<'a, F> {
    kind: EvalKind,
    models: Vec<String>,
    qa_set: &'a QuestionAnswerCollection,
    factory: F,
    output_root: PathBuf,
    retriever: Option<Box<dyn ContextRetriever>>,
    max_questions: Option<usize>,
    prompts: SystemPrompts,
    progress: bool,
}

impl<'a, F, G> Evaluation<'a, F>
where
    F: Fn(&str, &str) -> G,
    G: AnswerGenerator,
{
    /// Evaluation without retrieval.
    pub fn basic(
        models: Vec<String>,
        qa_set: &'a QuestionAnswerCollection,
        factory: F,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind: EvalKind::Basic,
            models,
            qa_set,
            factory,
            output_root: output_root.into(),
            retriever: None,
            max_questions: None,
            prompts: SystemPrompts::default(),
            progress: true,
        }
    }

    /// Evaluation with context from `retriever`, cached per strategy.
    pub fn vector_rag(
        models: Vec<String>,
        qa_set: &'a QuestionAnswerCollection,
        factory: F,
        output_root: impl Into<PathBuf>,
        strategy: Strategy,
        retriever: Box<dyn ContextRetriever>,
    ) -> Self {
        Self {
            kind: EvalKind::VectorRag(strategy),
            retriever: Some(retriever),
            ..Self::basic(models, qa_set, factory, output_root)
        }
    }

    /// Only evaluate the first `n` question ids. `None` or `Some(0)` means all.
    pub fn with_max_questions(mut self, n: Option<usize>) -> Self {
        self.max_questions = n.filter(|n| *n > 0);
        self
    }

    pub fn with_prompts(mut self, prompts: SystemPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn kind(&self) -> &EvalKind {
        &self.kind
    }

    pub fn output_dir(&self) -> PathBuf {
        self.kind.output_dir(&self.output_root)
    }

    pub fn output_path(&self, model: &str) -> PathBuf {
        self.output_dir().join(format!(
            "{}.{}",
            normalized_model_name(model),
            RECORD_EXTENSION
        ))
    }

    /// Run every model, then score the output directory.
    ///
    /// A model whose pass fails is logged and the remaining models still run.
    pub async fn run(&self) -> Result<EvaluationReport> {
        tracing::info!(
            kind = self.kind.dir_name(),
            models = self.models.len(),
            "running evaluation"
        );

        let mut passes = Vec::with_capacity(self.models.len());
        for model in &self.models {
            match self.generate_answers(model).await {
                Ok(summary) => passes.push(summary),
                Err(e) => {
                    tracing::error!(model = %model, error = %e, "model pass failed");
                }
            }
        }

        let scores = score_model_outputs(self.qa_set, &self.output_dir());
        Ok(EvaluationReport { passes, scores })
    }

    /// Answer every unanswered in-scope question for `model` and persist the
    /// full record.
    pub async fn generate_answers(&self, model: &str) -> Result<PassSummary> {
        let name = normalized_model_name(model);
        if name.is_empty() {
            return Err(EvalError::InvalidConfig(format!(
                "model '{}' has no name after its provider prefix",
                model
            )));
        }
        let output_path = self.output_path(model);
        tracing::info!(model = name, "starting evaluation");

        let mut cache = AnswerCache::load(&output_path);
        let ids = self.qa_set.question_ids(self.max_questions);
        let pending = cache.pending(&ids);

        let mut summary = PassSummary {
            model: name.to_string(),
            attempted: ids.len(),
            answered: 0,
            skipped: ids.len() - pending.len(),
            failed: 0,
            output_path: output_path.clone(),
        };

        let generator = (self.factory)(model, self.kind.system_prompt(&self.prompts));
        let pb = self.progress_bar(pending.len(), name);

        for id in pending {
            let Some(qa) = self.qa_set.get(id) else {
                continue;
            };

            match self.answer_question(&generator, &qa.question).await {
                Ok(answer) => {
                    let answer = answer.to_uppercase();
                    tracing::debug!(model = name, question = id, answer = %answer, "answered");
                    cache.record(id, answer);
                    summary.answered += 1;
                }
                Err(e) => {
                    tracing::warn!(model = name, question = id, error = %e, "question failed");
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        cache.persist()?;
        tracing::info!(
            model = name,
            answered = summary.answered,
            skipped = summary.skipped,
            failed = summary.failed,
            total_answered = cache.answered_count(),
            path = %output_path.display(),
            "eval completed"
        );

        Ok(summary)
    }

    async fn answer_question(&self, generator: &G, question: &str) -> Result<String> {
        let context = match &self.retriever {
            Some(retriever) => retriever.query(question).await?,
            None => None,
        };
        let response = generator.generate(question, context.as_deref()).await?;
        if response.answer.trim().is_empty() {
            return Err(EvalError::EmptyResponse);
        }
        Ok(response.answer)
    }

    fn progress_bar(&self, len: usize, model: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("{}: generating answers", model));
        pb
    }
}
