//! Local BERT cross-encoder (e.g. `cross-encoder/ms-marco-MiniLM-L6-v2`).

use super::embeddings::{batch_tensors, fetch_model_files, load_tokenizer};
use super::rerank::{CorpusId, CrossEncoder, Rank};
use crate::error::EvalError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::Device;
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

/// Sequence-classification head on top of BERT: pooler + single-logit classifier.
pub struct BertCrossEncoder {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertCrossEncoder {
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;
        let files = fetch_model_files(model_id)?;

        let config_text = std::fs::read_to_string(&files.config)?;
        let config: BertConfig =
            serde_json::from_str(&config_text).context("Failed to parse config")?;
        let raw: serde_json::Value = serde_json::from_str(&config_text)?;
        let hidden_size = raw["hidden_size"]
            .as_u64()
            .context("config.json has no hidden_size")? as usize;

        let tokenizer = load_tokenizer(&files.tokenizer)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)
                .context("Failed to load model weights")?
        };
        let model =
            BertModel::load(vb.pp("bert"), &config).context("Failed to load BERT encoder")?;
        let pooler = candle_nn::linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense"))
            .context("Failed to load pooler")?;
        let classifier = candle_nn::linear(hidden_size, 1, vb.pp("classifier"))
            .context("Failed to load classifier head")?;

        tracing::info!(model = model_id, "loaded cross-encoder");

        Ok(Self {
            model,
            pooler,
            classifier,
            tokenizer,
            device,
        })
    }

    /// Relevance score in `[0, 1]` for each (query, document) pair.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<(&str, &str)> = documents.iter().map(|d| (query, d.as_str())).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let (input_ids, token_type_ids, attention_mask) =
            batch_tensors(&encodings, &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let cls = output.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        let scores = candle_nn::ops::sigmoid(&logits)?;

        Ok(scores.to_vec1::<f32>()?)
    }
}

#[async_trait]
impl CrossEncoder for BertCrossEncoder {
    async fn rank(&self, query: &str, documents: &[String]) -> crate::error::Result<Vec<Rank>> {
        let scores = self
            .score(query, documents)
            .map_err(|e| EvalError::Model(format!("{:#}", e)))?;

        Ok(scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| Rank {
                corpus_id: CorpusId::from(i),
                score,
            })
            .collect())
    }
}
