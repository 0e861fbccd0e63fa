//! Named retrieval configurations for vector-RAG evaluation.

use crate::error::{EvalError, Result};
use crate::retrieval::ChunkingStyle;
use serde::Serialize;

/// Retrieval configuration. Its name doubles as the output subdirectory, so
/// every strategy's answers are cached independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategy {
    name: String,
    description: String,
    max_results: usize,
    enable_reranking: bool,
    chunking_style: ChunkingStyle,
}

pub const STRATEGY_BASELINE: &str = "strategy_baseline";
pub const STRATEGY_WITH_RERANKING: &str = "strategy_with_reranking";
pub const STRATEGY_WITH_RERANKING_BASIC_CHUNKING: &str =
    "strategy_with_reranking_with_basic_chunking";

impl Strategy {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        max_results: usize,
        enable_reranking: bool,
        chunking_style: ChunkingStyle,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(EvalError::InvalidConfig(format!(
                "strategy name '{}' is not a valid directory name",
                name
            )));
        }
        if max_results == 0 {
            return Err(EvalError::InvalidConfig(format!(
                "strategy '{}' must return at least one result",
                name
            )));
        }

        Ok(Self {
            name,
            description: description.into(),
            max_results,
            enable_reranking,
            chunking_style,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn enable_reranking(&self) -> bool {
        self.enable_reranking
    }

    pub fn chunking_style(&self) -> ChunkingStyle {
        self.chunking_style
    }

    /// Top-3 by vector similarity over title-based chunks.
    pub fn baseline() -> Self {
        Self {
            name: STRATEGY_BASELINE.to_string(),
            description: "Top 3 chunks by vector similarity".to_string(),
            max_results: 3,
            enable_reranking: false,
            chunking_style: ChunkingStyle::ByTitle,
        }
    }

    /// Top-3 after cross-encoder re-ranking of 25 candidates.
    pub fn with_reranking() -> Self {
        Self {
            name: STRATEGY_WITH_RERANKING.to_string(),
            description: "Top 3 chunks after cross-encoder re-ranking".to_string(),
            max_results: 3,
            enable_reranking: true,
            chunking_style: ChunkingStyle::ByTitle,
        }
    }

    /// Re-ranking over fixed-size overlapping chunks.
    pub fn with_reranking_basic_chunking() -> Self {
        Self {
            name: STRATEGY_WITH_RERANKING_BASIC_CHUNKING.to_string(),
            description: "Top 3 re-ranked chunks over fixed-size chunking".to_string(),
            max_results: 3,
            enable_reranking: true,
            chunking_style: ChunkingStyle::Basic,
        }
    }

    /// Every built-in strategy, in evaluation order.
    pub fn builtin() -> Vec<Strategy> {
        vec![
            Self::baseline(),
            Self::with_reranking(),
            Self::with_reranking_basic_chunking(),
        ]
    }

    pub fn by_name(name: &str) -> Result<Strategy> {
        Self::builtin()
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| EvalError::UnknownStrategy(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_builtin_strategies() {
        let names: Vec<String> = Strategy::builtin()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                STRATEGY_BASELINE,
                STRATEGY_WITH_RERANKING,
                STRATEGY_WITH_RERANKING_BASIC_CHUNKING
            ]
        );

        let baseline = Strategy::baseline();
        assert_eq!(baseline.max_results(), 3);
        assert!(!baseline.enable_reranking());
        assert_eq!(
            Strategy::with_reranking_basic_chunking().chunking_style(),
            ChunkingStyle::Basic
        );
    }

    #[test]
    fn test_by_name() {
        assert_eq!(
            Strategy::by_name("strategy_with_reranking").unwrap(),
            Strategy::with_reranking()
        );
        assert!(matches!(
            Strategy::by_name("strategy_magic"),
            Err(EvalError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_new_validates() {
        assert_ok!(Strategy::new("top5", "", 5, false, ChunkingStyle::ByTitle));
        assert_err!(Strategy::new("zero", "", 0, false, ChunkingStyle::ByTitle));
        assert_err!(Strategy::new("a/b", "", 3, false, ChunkingStyle::ByTitle));
        assert_err!(Strategy::new("..", "", 3, false, ChunkingStyle::ByTitle));
        assert_err!(Strategy::new("", "", 3, false, ChunkingStyle::ByTitle));
    }
}
