//! Accuracy scoring of persisted model outputs against ground truth.

use crate::persistence::{RECORD_EXTENSION, read_json};
use crate::qa::QuestionAnswerCollection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Accuracy of one model over the questions it attempted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelScore {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

impl ModelScore {
    fn new(correct: usize, total: usize) -> Self {
        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        Self {
            correct,
            total,
            accuracy,
        }
    }
}

/// Scores keyed by model name (the output file stem).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBoard {
    pub scores: BTreeMap<String, ModelScore>,
}

impl ScoreBoard {
    pub fn accuracy(&self, model: &str) -> Option<f64> {
        self.scores.get(model).map(|s| s.accuracy)
    }

    pub fn accuracies(&self) -> BTreeMap<String, f64> {
        self.scores
            .iter()
            .map(|(model, s)| (model.clone(), s.accuracy))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Print summary to stdout.
    pub fn print_summary(&self, title: &str) {
        println!("\n========== {} ==========", title);
        if self.scores.is_empty() {
            println!("No model outputs found");
        }
        for (model, score) in &self.scores {
            println!(
                "{:<32} {:>5}/{:<5} {:.2}",
                model, score.correct, score.total, score.accuracy
            );
        }
        println!("========================================\n");
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Score one model record. Ids missing from the record are not counted.
pub fn score_record(
    ground_truth: &QuestionAnswerCollection,
    record: &QuestionAnswerCollection,
) -> ModelScore {
    let (correct, total) = ground_truth
        .iter()
        .filter_map(|(id, expected)| record.get(id).map(|got| (expected, got)))
        .fold((0, 0), |(correct, total), (expected, got)| {
            let hit = normalize(&expected.answer) == normalize(&got.answer);
            (correct + usize::from(hit), total + 1)
        });
    ModelScore::new(correct, total)
}

/// Score every `*.json` model record directly inside `output_dir`.
///
/// Unreadable or malformed records are skipped with a warning. A missing
/// directory yields an empty board.
pub fn score_model_outputs(
    ground_truth: &QuestionAnswerCollection,
    output_dir: &Path,
) -> ScoreBoard {
    let mut board = ScoreBoard::default();
    if !output_dir.is_dir() {
        tracing::warn!(dir = %output_dir.display(), "no output directory to score");
        return board;
    }

    let entries = WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == RECORD_EXTENSION));

    for entry in entries {
        let path = entry.path();
        let Some(model) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        match read_json::<QuestionAnswerCollection>(path) {
            Ok(record) => {
                let score = score_record(ground_truth, &record);
                tracing::debug!(
                    model = %model,
                    correct = score.correct,
                    total = score.total,
                    "scored model output"
                );
                board.scores.insert(model, score);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed model output");
            }
        }
    }

    board
}
