//! Context retrieval for vector-RAG evaluation.

use super::chunking::chunk_corpus;
use super::index::{TextEmbedder, VectorIndex};
use super::rerank::CrossEncoder;
use crate::error::{EvalError, Result};
use crate::eval::Strategy;
use crate::qa::KnowledgeChunks;
use async_trait::async_trait;

/// Candidate pool handed to the cross-encoder when re-ranking is enabled.
pub const RERANK_POOL_SIZE: usize = 25;

/// Returns supporting snippets for a question, best first.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// `None` when nothing could be retrieved.
    async fn query(&self, text: &str) -> Result<Option<Vec<String>>>;
}

/// Vector index over the knowledge corpus with optional cross-encoder re-ranking.
///
/// Built once; queries never mutate the index.
pub struct VectorContextRetriever<E> {
    index: VectorIndex<E>,
    reranker: Option<Box<dyn CrossEncoder>>,
    max_results: usize,
}

impl<E: TextEmbedder> VectorContextRetriever<E> {
    /// Index every chunk of `corpus` according to the strategy's chunking style.
    ///
    /// A strategy with re-ranking enabled requires a cross-encoder.
    pub fn build(
        strategy: &Strategy,
        corpus: &KnowledgeChunks,
        embedder: E,
        reranker: Option<Box<dyn CrossEncoder>>,
    ) -> Result<Self> {
        let reranker = match (strategy.enable_reranking(), reranker) {
            (true, Some(r)) => Some(r),
            (true, None) => {
                return Err(EvalError::InvalidConfig(format!(
                    "strategy '{}' enables re-ranking but no cross-encoder was provided",
                    strategy.name()
                )));
            }
            (false, _) => None,
        };

        let pairs = chunk_corpus(corpus, strategy.chunking_style());
        tracing::info!(
            strategy = %strategy.name(),
            chunks = pairs.len(),
            "building vector search index"
        );

        let mut index = VectorIndex::new(embedder);
        index.upsert(pairs)?;

        Ok(Self {
            index,
            reranker,
            max_results: strategy.max_results(),
        })
    }

    /// Number of candidates fetched from the index before truncation.
    pub fn pool_size(&self) -> usize {
        if self.reranker.is_some() {
            RERANK_POOL_SIZE
        } else {
            self.max_results
        }
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }
}

#[async_trait]
impl<E: TextEmbedder> ContextRetriever for VectorContextRetriever<E> {
    async fn query(&self, text: &str) -> Result<Option<Vec<String>>> {
        let candidates: Vec<String> = self
            .index
            .query(text, self.pool_size())?
            .into_iter()
            .map(|hit| hit.text)
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        let Some(reranker) = &self.reranker else {
            let mut results = candidates;
            results.truncate(self.max_results);
            return Ok(Some(results));
        };

        let mut ranks = reranker.rank(text, &candidates).await?;
        ranks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let results = ranks
            .iter()
            .take(self.max_results)
            .map(|rank| {
                rank.corpus_id
                    .position(candidates.len())
                    .map(|i| candidates[i].clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(results))
    }
}
