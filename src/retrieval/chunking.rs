//! How the knowledge corpus is split before indexing.

use crate::qa::KnowledgeChunks;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Chunking applied to the stored corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStyle {
    /// Chunks are indexed exactly as stored (title-based sections).
    ByTitle,
    /// Stored chunks are re-split into overlapping fixed-size windows.
    Basic,
}

/// Configuration for fixed-size text chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Produce the `(id, text)` pairs to index for the given style.
///
/// With [`ChunkingStyle::Basic`], a stored chunk that fits in one window keeps
/// its id; longer ones become `<id>-0`, `<id>-1`, ... A piece id that is
/// already taken by a stored chunk gets a further `-<k>` suffix, so every
/// emitted id is unique.
pub fn chunk_corpus(corpus: &KnowledgeChunks, style: ChunkingStyle) -> Vec<(String, String)> {
    match style {
        ChunkingStyle::ByTitle => corpus
            .chunks
            .iter()
            .map(|(id, text)| (id.clone(), text.clone()))
            .collect(),
        ChunkingStyle::Basic => {
            let config = ChunkConfig::default();
            let mut taken: HashSet<String> = corpus.chunks.keys().cloned().collect();
            let mut out = Vec::new();
            for (id, text) in &corpus.chunks {
                let pieces = chunk_text(text, &config);
                if pieces.len() == 1 {
                    out.extend(pieces.into_iter().map(|p| (id.clone(), p)));
                    continue;
                }
                for (n, piece) in pieces.into_iter().enumerate() {
                    let piece_id = unique_piece_id(&mut taken, id, n);
                    out.push((piece_id, piece));
                }
            }
            out
        }
    }
}

fn unique_piece_id(taken: &mut HashSet<String>, id: &str, n: usize) -> String {
    let base = format!("{}-{}", id, n);
    let mut candidate = base.clone();
    let mut k = 1;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}-{}", base, k);
        k += 1;
    }
    if candidate != base {
        tracing::debug!(chunk = id, piece = n, id = %candidate, "piece id renamed to avoid collision");
    }
    candidate
}

/// Chunk text into overlapping segments, preferring sentence boundaries.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();

    if text_len == 0 || config.chunk_size == 0 {
        return chunks;
    }

    let mut start = 0;

    while start < text_len {
        let end = (start + config.chunk_size).min(text_len);

        // Look for a sentence ending within the last 100 chars of the window
        let adjusted_end = if end < text_len {
            let search_start = end.saturating_sub(100).max(start);
            chars[search_start..end]
                .iter()
                .rposition(|c| matches!(c, '.' | '!' | '?'))
                .map(|pos| search_start + pos + 1)
                .filter(|&candidate| candidate > start)
                .unwrap_or(end)
        } else {
            end
        };

        let final_end = adjusted_end.max(start + 1).min(text_len);
        let piece: String = chars[start..final_end].iter().collect();

        if !piece.trim().is_empty() {
            chunks.push(piece.trim().to_string());
        }

        if final_end >= text_len {
            break;
        }

        let next_start = if config.chunk_overlap > 0 && final_end > config.chunk_overlap {
            final_end - config.chunk_overlap
        } else {
            final_end
        };

        // Always move forward
        start = if next_start <= start {
            start + 1
        } else {
            next_start
        };
    }

    chunks
}
