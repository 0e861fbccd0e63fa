//! Context retrieval over the knowledge-chunk corpus.
//!
//! This module provides:
//! - An in-memory cosine-similarity index with upsert semantics
//! - Corpus chunking styles
//! - Cross-encoder re-ranking (local candle model or HTTP `/rerank` service)
//! - The [`ContextRetriever`] used by vector-RAG evaluation

pub mod chunking;
pub mod index;
pub mod rerank;
pub mod retriever;

#[cfg(feature = "local-models")]
pub mod cross_encoder;
#[cfg(feature = "local-models")]
pub mod embeddings;

pub use chunking::{ChunkConfig, ChunkingStyle, chunk_corpus};
pub use index::{IndexHit, TextEmbedder, VectorIndex, cosine_similarity};
pub use rerank::{CorpusId, CrossEncoder, HttpCrossEncoder, Rank};
pub use retriever::{ContextRetriever, RERANK_POOL_SIZE, VectorContextRetriever};

#[cfg(feature = "local-models")]
pub use cross_encoder::BertCrossEncoder;
#[cfg(feature = "local-models")]
pub use embeddings::EmbeddingModel;
