//! In-memory cosine-similarity index over knowledge chunks.

use crate::error::{EvalError, Result};
use std::collections::HashMap;

/// Turns text into dense vectors.
pub trait TextEmbedder: Send + Sync {
    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::Model("embedder returned no vector".to_string()))
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A vector index entry.
#[derive(Debug, Clone)]
struct IndexEntry {
    id: String,
    text: String,
    embedding: Vec<f32>,
}

/// One query hit; `distance` is `1 - cosine similarity`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

/// Vector search index with upsert semantics on chunk id.
pub struct VectorIndex<E> {
    embedder: E,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl<E: TextEmbedder> VectorIndex<E> {
    const BATCH_SIZE: usize = 32;

    /// Create a new empty vector index.
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Insert or replace `(id, text)` pairs, embedding them in batches.
    pub fn upsert<I, S, T>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let items: Vec<(String, String)> = items
            .into_iter()
            .map(|(id, text)| (id.into(), text.into()))
            .collect();

        for batch in items.chunks(Self::BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|(_, text)| text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(EvalError::Model(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for ((id, text), embedding) in batch.iter().zip(embeddings) {
                let entry = IndexEntry {
                    id: id.clone(),
                    text: text.clone(),
                    embedding,
                };
                match self.positions.get(id) {
                    Some(&pos) => self.entries[pos] = entry,
                    None => {
                        self.positions.insert(id.clone(), self.entries.len());
                        self.entries.push(entry);
                    }
                }
            }
        }

        Ok(())
    }

    /// Return up to `k` entries, nearest first.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<IndexHit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text)?;

        let mut hits: Vec<IndexHit> = self
            .entries
            .iter()
            .map(|entry| IndexHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                distance: 1.0 - cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        // Ties keep insertion order so results are reproducible.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Bag-of-words embedder over a fixed vocabulary, for tests.
    pub(crate) struct KeywordEmbedder {
        vocabulary: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        pub(crate) fn new(vocabulary: &[&'static str]) -> Self {
            Self {
                vocabulary: vocabulary.to_vec(),
            }
        }
    }

    impl TextEmbedder for KeywordEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    self.vocabulary
                        .iter()
                        .map(|w| lower.matches(w).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_query_orders_by_distance() {
        let mut index = VectorIndex::new(KeywordEmbedder::new(&["mongol", "ottoman", "ming"]));
        index
            .upsert([
                ("0", "The Ottoman state expanded into the Balkans."),
                ("1", "Mongol armies reached Europe; the Mongol khanates split."),
                ("2", "The Ming dynasty sponsored voyages."),
            ])
            .unwrap();

        let hits = index.query("What did the Mongol conquests change?", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "1");
        assert!(hits[0].distance < 1e-6);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let mut index = VectorIndex::new(KeywordEmbedder::new(&["mongol", "ming"]));
        index.upsert([("0", "ming"), ("1", "mongol")]).unwrap();
        index.upsert([("0", "mongol mongol")]).unwrap();

        assert_eq!(index.len(), 2);
        let hits = index.query("mongol", 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.text.contains("mongol")));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::new(KeywordEmbedder::new(&["a"]));
        assert!(index.is_empty());
        assert!(index.query("a", 3).unwrap().is_empty());
    }
}
