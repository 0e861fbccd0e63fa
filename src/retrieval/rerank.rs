//! Cross-encoder re-ranking of a retrieval candidate pool.

use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Position of a ranked document in the candidate list, as reported by the
/// re-ranker. Remote re-rankers do not always return a clean integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorpusId {
    Index(u64),
    Number(f64),
    Text(String),
}

impl CorpusId {
    /// Resolve to a position in a pool of `candidates` documents.
    pub fn position(&self, candidates: usize) -> Result<usize> {
        let index = match self {
            CorpusId::Index(i) => usize::try_from(*i)
                .map_err(|_| EvalError::InvalidRerankIndex(i.to_string()))?,
            CorpusId::Number(n) if n.fract() == 0.0 && *n >= 0.0 => *n as usize,
            CorpusId::Number(n) => return Err(EvalError::InvalidRerankIndex(n.to_string())),
            CorpusId::Text(s) => s
                .trim()
                .parse::<usize>()
                .map_err(|_| EvalError::InvalidRerankIndex(s.clone()))?,
        };

        if index >= candidates {
            return Err(EvalError::RerankIndexOutOfRange { index, candidates });
        }
        Ok(index)
    }
}

impl From<usize> for CorpusId {
    fn from(i: usize) -> Self {
        CorpusId::Index(i as u64)
    }
}

/// Relevance of one candidate to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    #[serde(alias = "index")]
    pub corpus_id: CorpusId,
    pub score: f32,
}

/// Pairwise (query, document) relevance model.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score every document against the query. Order of the output is unspecified.
    async fn rank(&self, query: &str, documents: &[String]) -> Result<Vec<Rank>>;
}

/// Request body for a TEI-style `/rerank` endpoint.
#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

/// Cross-encoder served over HTTP (`POST {base}/rerank`).
#[derive(Clone)]
pub struct HttpCrossEncoder {
    client: Client,
    api_base: String,
}

impl HttpCrossEncoder {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rerank", self.api_base.trim_end_matches('/'))
    }

    pub(crate) fn parse_ranks(body: &str) -> Result<Vec<Rank>> {
        serde_json::from_str(body).map_err(|e| EvalError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn rank(&self, query: &str, documents: &[String]) -> Result<Vec<Rank>> {
        let request = RerankRequest {
            query,
            texts: documents,
            raw_scores: false,
        };

        let response = self.client.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EvalError::Http(format!(
                "rerank request failed ({}): {}",
                status, body
            )));
        }

        Self::parse_ranks(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_id_positions() {
        assert_eq!(CorpusId::Index(2).position(5).unwrap(), 2);
        assert_eq!(CorpusId::Number(3.0).position(5).unwrap(), 3);
        assert_eq!(CorpusId::Text(" 4 ".to_string()).position(5).unwrap(), 4);
    }

    #[test]
    fn test_corpus_id_rejects_non_integers() {
        for id in [
            CorpusId::Number(1.5),
            CorpusId::Number(-1.0),
            CorpusId::Text("doc-3".to_string()),
            CorpusId::Text(String::new()),
        ] {
            assert!(
                matches!(id.position(10), Err(EvalError::InvalidRerankIndex(_))),
                "accepted {:?}",
                id
            );
        }
    }

    #[test]
    fn test_corpus_id_out_of_range() {
        assert!(matches!(
            CorpusId::Index(7).position(3),
            Err(EvalError::RerankIndexOutOfRange {
                index: 7,
                candidates: 3
            })
        ));
    }

    #[test]
    fn test_parse_tei_response() {
        let ranks =
            HttpCrossEncoder::parse_ranks(r#"[{"index": 1, "score": 0.9}, {"index": "x", "score": 0.1}]"#)
                .unwrap();
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks[0].corpus_id, CorpusId::Index(1));
        assert_eq!(ranks[1].corpus_id, CorpusId::Text("x".to_string()));
    }

    #[test]
    fn test_endpoint() {
        let encoder = HttpCrossEncoder::new("http://localhost:8080/");
        assert_eq!(encoder.endpoint(), "http://localhost:8080/rerank");
    }
}
