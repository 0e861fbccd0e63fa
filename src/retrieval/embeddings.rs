//! Local embedding model using candle + sentence-transformers.

use super::index::TextEmbedder;
use crate::error::EvalError;
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::{Path, PathBuf};
use tokenizers::{Encoding, Tokenizer, TruncationParams};

/// Longest input the BERT-family models accept.
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Files fetched from the Hugging Face Hub for a BERT-style model.
pub(crate) struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

pub(crate) fn fetch_model_files(model_id: &str) -> Result<ModelFiles> {
    let api = Api::new().context("Failed to create HF Hub API")?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    Ok(ModelFiles {
        config: repo.get("config.json").context("Failed to get config.json")?,
        tokenizer: repo
            .get("tokenizer.json")
            .context("Failed to get tokenizer.json")?,
        weights: repo
            .get("model.safetensors")
            .context("Failed to get model weights")?,
    })
}

pub(crate) fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;
    Ok(tokenizer)
}

/// Pad a batch of encodings into `(input_ids, token_type_ids, attention_mask)`.
pub(crate) fn batch_tensors(
    encodings: &[Encoding],
    device: &Device,
) -> Result<(Tensor, Tensor, Tensor)> {
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    let mut input_ids_vec = Vec::with_capacity(encodings.len() * max_len);
    let mut attention_mask_vec = Vec::with_capacity(encodings.len() * max_len);
    let mut token_type_ids_vec = Vec::with_capacity(encodings.len() * max_len);

    for encoding in encodings {
        let mut padded_ids = encoding.get_ids().to_vec();
        let mut padded_mask = encoding.get_attention_mask().to_vec();
        let mut padded_types = encoding.get_type_ids().to_vec();

        padded_ids.resize(max_len, 0);
        padded_mask.resize(max_len, 0);
        padded_types.resize(max_len, 0);

        input_ids_vec.extend(padded_ids);
        attention_mask_vec.extend(padded_mask);
        token_type_ids_vec.extend(padded_types);
    }

    let shape = (encodings.len(), max_len);
    Ok((
        Tensor::from_vec(input_ids_vec, shape, device)?,
        Tensor::from_vec(token_type_ids_vec, shape, device)?,
        Tensor::from_vec(attention_mask_vec, shape, device)?,
    ))
}

/// Embedding model for generating text embeddings.
pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    normalize: bool,
}

impl EmbeddingModel {
    /// Load the all-MiniLM-L6-v2 model from Hugging Face Hub.
    pub fn load_minilm() -> Result<Self> {
        Self::load("sentence-transformers/all-MiniLM-L6-v2")
    }

    /// Load a sentence-transformers model by name.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu; // Use CPU for portability
        let files = fetch_model_files(model_id)?;

        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&files.config)?)
            .context("Failed to parse config")?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to load BERT model")?;

        tracing::info!(model = model_id, "loaded embedding model");

        Ok(Self {
            model,
            tokenizer,
            device,
            normalize: true,
        })
    }

    /// Mean-pooled (and optionally L2-normalized) embeddings for a batch.
    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let (input_ids, token_type_ids, attention_mask) =
            batch_tensors(&encodings, &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over sequence dimension (with attention mask)
        let attention_mask_expanded = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;

        let sum_embeddings = (output * &attention_mask_expanded)?.sum(1)?;
        let sum_mask = attention_mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;
        let mean_embeddings = (sum_embeddings / sum_mask)?;

        let final_embeddings = if self.normalize {
            let norms = mean_embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
            let shape = mean_embeddings.shape().clone();
            (mean_embeddings / norms.broadcast_as(&shape)?)?
        } else {
            mean_embeddings
        };

        Ok(final_embeddings.to_vec2::<f32>()?)
    }
}

impl TextEmbedder for EmbeddingModel {
    fn embed_batch(&self, texts: &[&str]) -> crate::error::Result<Vec<Vec<f32>>> {
        self.forward_batch(texts)
            .map_err(|e| EvalError::Model(format!("{:#}", e)))
    }
}
