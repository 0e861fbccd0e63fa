//! JSON persistence for the question set, knowledge chunks and model outputs.
//!
//! Writes go to a temporary file in the destination directory and are then
//! renamed over the target, so readers only ever see a complete document.

use crate::error::{EvalError, Result};
use crate::qa::{KnowledgeChunks, QuestionAnswerCollection};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Extension used for every persisted record.
pub const RECORD_EXTENSION: &str = "json";

/// Read and deserialize a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| EvalError::Serialization(e.to_string()))
}

/// Read a JSON document, treating a missing or malformed file as absent.
pub fn read_json_or_none<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "file does not exist");
        return None;
    }

    match read_json(path) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "error loading content");
            None
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
    }

    let data = serde_json::to_string_pretty(value)
        .map_err(|e| EvalError::Serialization(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| EvalError::io(parent, e))?;
    tmp.write_all(data.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| EvalError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| EvalError::io(path, e.error))?;

    Ok(())
}

/// Load the ground-truth question set.
pub fn load_qa_set(path: &Path) -> Result<QuestionAnswerCollection> {
    if !path.exists() {
        return Err(EvalError::QaSetNotFound(path.to_path_buf()));
    }
    read_json(path)
}

/// Load the knowledge-chunk store; an empty store is an error.
pub fn load_knowledge_chunks(path: &Path) -> Result<KnowledgeChunks> {
    let chunks: KnowledgeChunks = read_json(path)?;
    if chunks.is_empty() {
        return Err(EvalError::EmptyCorpus(path.to_path_buf()));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::QuestionAnswer;
    use tempfile::TempDir;

    fn sample_collection() -> QuestionAnswerCollection {
        [
            (1, QuestionAnswer::new("Q1", "A")),
            (2, QuestionAnswer::new("Q2", "B")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_write_creates_parent_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evals/basic/model.json");

        write_json_atomic(&sample_collection(), &path).unwrap();

        let loaded: QuestionAnswerCollection = read_json(&path).unwrap();
        assert_eq!(loaded, sample_collection());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"qa_map\""));
        assert!(content.contains("\"question\": \"Q1\""));
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        write_json_atomic(&sample_collection(), &path).unwrap();
        write_json_atomic(&QuestionAnswerCollection::new(), &path).unwrap();

        let loaded: QuestionAnswerCollection = read_json(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_or_none_missing_file() {
        let dir = TempDir::new().unwrap();
        let result: Option<QuestionAnswerCollection> =
            read_json_or_none(&dir.path().join("notfound.json"));
        assert!(result.is_none());
    }

    #[test]
    fn test_read_or_none_invalid_json() {
        let dir = TempDir::new().unwrap();
        for (i, bad) in [
            r#"{"qa_map": {"1": "#,
            r#"{"qa_map": {"x": {"question": "Q", "answer": "A"}}}"#,
            "not even json",
        ]
        .iter()
        .enumerate()
        {
            let path = dir.path().join(format!("bad{i}.json"));
            fs::write(&path, bad).unwrap();
            let result: Option<QuestionAnswerCollection> = read_json_or_none(&path);
            assert!(result.is_none(), "accepted {bad}");
        }
    }

    #[test]
    fn test_load_qa_set_missing() {
        let err = load_qa_set(Path::new("/nonexistent/qa.json")).unwrap_err();
        assert!(matches!(err, EvalError::QaSetNotFound(_)));
    }

    #[test]
    fn test_load_knowledge_chunks_empty_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("concepts.json");
        fs::write(&path, r#"{"chunks": {}}"#).unwrap();
        assert!(matches!(
            load_knowledge_chunks(&path),
            Err(EvalError::EmptyCorpus(_))
        ));

        fs::write(&path, r#"{"chunks": {"0": "The Silk Road linked..."}}"#).unwrap();
        assert_eq!(load_knowledge_chunks(&path).unwrap().len(), 1);
    }
}
