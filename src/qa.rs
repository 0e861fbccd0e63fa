//! Question/answer records and the knowledge-chunk corpus.
//!
//! Both the ground-truth store and every model-output record share the
//! [`QuestionAnswerCollection`] shape, so a model record can be scored
//! against ground truth id by id.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable integer identifying one multiple-choice question.
pub type QuestionId = u32;

/// A question and its single-letter answer.
///
/// In model-output records the question text is left empty and `answer`
/// holds the letter produced by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// The text of the question.
    #[serde(default)]
    pub question: String,
    /// The answer to the question.
    #[serde(default)]
    pub answer: String,
}

impl QuestionAnswer {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// A model-output entry: the question text is elided.
    pub fn answer_only(answer: impl Into<String>) -> Self {
        Self::new("", answer)
    }

    /// True once a non-empty answer has been recorded.
    pub fn is_answered(&self) -> bool {
        !self.answer.is_empty()
    }
}

/// Mapping from question id to question/answer pair.
///
/// Iteration is ascending by id, which is the fixed order used for
/// `max_questions` truncation and resumption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswerCollection {
    pub qa_map: BTreeMap<QuestionId, QuestionAnswer>,
}

impl QuestionAnswerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: QuestionId, qa: QuestionAnswer) {
        self.qa_map.insert(id, qa);
    }

    pub fn get(&self, id: QuestionId) -> Option<&QuestionAnswer> {
        self.qa_map.get(&id)
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.qa_map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.qa_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qa_map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &QuestionAnswer)> {
        self.qa_map.iter().map(|(id, qa)| (*id, qa))
    }

    /// The first `limit` ids in ascending order, or all ids.
    pub fn question_ids(&self, limit: Option<usize>) -> Vec<QuestionId> {
        let ids = self.qa_map.keys().copied();
        match limit {
            Some(n) => ids.take(n).collect(),
            None => ids.collect(),
        }
    }
}

impl FromIterator<(QuestionId, QuestionAnswer)> for QuestionAnswerCollection {
    fn from_iter<T: IntoIterator<Item = (QuestionId, QuestionAnswer)>>(iter: T) -> Self {
        Self {
            qa_map: iter.into_iter().collect(),
        }
    }
}

/// Knowledge-chunk corpus keyed by chunk id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunks {
    pub chunks: BTreeMap<String, String>,
}

impl KnowledgeChunks {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl FromIterator<(String, String)> for KnowledgeChunks {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            chunks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_string_keyed_ids() {
        let json = r#"{"qa_map": {"10": {"question": "Q10", "answer": "B"}, "2": {"question": "Q2", "answer": "a"}}}"#;
        let collection: QuestionAnswerCollection = serde_json::from_str(json).unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(2).unwrap().answer, "a");
        // Numeric order, not lexical.
        assert_eq!(collection.question_ids(None), vec![2, 10]);
    }

    #[test]
    fn test_question_ids_limit() {
        let collection: QuestionAnswerCollection = (0..5)
            .rev()
            .map(|i| (i, QuestionAnswer::new(format!("Q{i}"), "A")))
            .collect();

        assert_eq!(collection.question_ids(Some(3)), vec![0, 1, 2]);
        assert_eq!(collection.question_ids(Some(50)).len(), 5);
    }

    #[test]
    fn test_answer_only_entry_missing_question_field() {
        let json = r#"{"qa_map": {"1": {"answer": "C"}}}"#;
        let collection: QuestionAnswerCollection = serde_json::from_str(json).unwrap();
        let entry = collection.get(1).unwrap();
        assert!(entry.question.is_empty());
        assert!(entry.is_answered());
        assert!(!QuestionAnswer::answer_only("").is_answered());
    }

    #[test]
    fn test_negative_id_rejected() {
        let json = r#"{"qa_map": {"-1": {"question": "Q", "answer": "A"}}}"#;
        assert!(serde_json::from_str::<QuestionAnswerCollection>(json).is_err());
    }
}
