//! Per-(model, strategy) answer cache backed by a JSON record on disk.

use crate::error::Result;
use crate::persistence::{read_json_or_none, write_json_atomic};
use crate::qa::{QuestionAnswer, QuestionAnswerCollection, QuestionId};
use std::path::{Path, PathBuf};

/// In-memory model-output record plus the path it is persisted to.
///
/// Lookups of unknown ids behave like an empty placeholder entry; nothing is
/// added to the record until [`AnswerCache::record`] is called.
#[derive(Debug)]
pub struct AnswerCache {
    path: PathBuf,
    record: QuestionAnswerCollection,
}

impl AnswerCache {
    /// Load the record at `path`. A missing file is a first run; a malformed
    /// one is logged and treated as absent.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = match read_json_or_none::<QuestionAnswerCollection>(&path) {
            Some(existing) => {
                tracing::info!(
                    path = %path.display(),
                    entries = existing.len(),
                    "loaded existing output"
                );
                existing
            }
            None => QuestionAnswerCollection::new(),
        };
        Self { path, record }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored answer for `id`, or `""` when there is none.
    pub fn answer(&self, id: QuestionId) -> &str {
        self.record
            .get(id)
            .map(|qa| qa.answer.as_str())
            .unwrap_or_default()
    }

    /// A present-but-empty answer counts as unanswered.
    pub fn is_answered(&self, id: QuestionId) -> bool {
        !self.answer(id).is_empty()
    }

    /// The subset of `ids` still needing an answer, order preserved.
    pub fn pending(&self, ids: &[QuestionId]) -> Vec<QuestionId> {
        ids.iter()
            .copied()
            .filter(|id| !self.is_answered(*id))
            .collect()
    }

    /// Store a model answer; the question text is elided.
    pub fn record(&mut self, id: QuestionId, answer: impl Into<String>) {
        self.record.insert(id, QuestionAnswer::answer_only(answer));
    }

    pub fn answered_count(&self) -> usize {
        self.record.iter().filter(|(_, qa)| qa.is_answered()).count()
    }

    pub fn collection(&self) -> &QuestionAnswerCollection {
        &self.record
    }

    /// Atomically replace the on-disk record with the full in-memory one.
    pub fn persist(&self) -> Result<()> {
        write_json_atomic(&self.record, &self.path)
    }
}
