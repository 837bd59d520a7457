use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use crate::{
    embedding::{Embedder, Embedding, normalize},
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Sentence-transformers checkpoints are trained on at most 256 tokens.
const MAX_SEQUENCE_LENGTH: usize = 256;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// On-disk locations of everything needed to run a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Resolve model files for `model_id`.
    ///
    /// A `model_id` naming an existing directory is used as-is; anything else
    /// is treated as a HuggingFace repository and fetched into the local
    /// hub cache.
    pub fn resolve(model_id: &str) -> Result<Self> {
        let local = Path::new(model_id);
        if local.is_dir() {
            return Self::from_dir(local);
        }

        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        Ok(Self {
            config: repo.get(CONFIG_FILE)?,
            tokenizer: repo.get(TOKENIZER_FILE)?,
            weights: repo.get(WEIGHTS_FILE)?,
        })
    }

    fn from_dir(dir: &Path) -> Result<Self> {
        let files = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        };

        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.is_file() {
                return Err(Error::NotFound {
                    kind: "model file",
                    name: path.display().to_string(),
                });
            }
        }

        Ok(files)
    }
}

/// Only the field we need from a BERT `config.json`.
#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// A BERT sentence encoder: mean-pooled token states, L2-normalized.
///
/// The model is loaded once by [`ModelManager::load`] and never mutated
/// afterwards, so one instance can serve concurrent queries.
pub struct ModelManager {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dimension: usize,
}

impl ModelManager {
    /// Load a model by HuggingFace ID or local directory path.
    pub fn load(model_id: &str) -> Result<Self> {
        let files = ModelFiles::resolve(model_id)?;
        Self::load_files(model_id, &files)
    }

    /// Load a model from already resolved files.
    pub fn load_files(model_id: &str, files: &ModelFiles) -> Result<Self> {
        let raw_config = std::fs::read_to_string(&files.config)?;
        let config: Config = serde_json::from_str(&raw_config)?;
        let HiddenSize { hidden_size } = serde_json::from_str(&raw_config)?;

        let mut tokenizer =
            Tokenizer::from_file(&files.tokenizer).map_err(|e| {
                Error::Model(format!("failed to load tokenizer: {e}"))
            })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| {
                Error::Model(format!("failed to configure truncation: {e}"))
            })?;
        tokenizer.with_padding(None);

        let device = default_device();
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                &[files.weights.as_path()],
                DTYPE,
                &device,
            )?
        };
        let model = BertModel::load(vb, &config)?;

        tracing::info!(model = model_id, dimension = hidden_size, "model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: model_id.to_string(),
            dimension: hidden_size,
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Model(format!("tokenization failed: {e}")))?;

        let input_ids =
            Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;
        let attention_mask =
            Tensor::new(encoding.get_attention_mask(), &self.device)?
                .unsqueeze(0)?;

        // [1, T, H]
        let hidden = self.model.forward(
            &input_ids,
            &token_type_ids,
            Some(&attention_mask),
        )?;

        // Mean over the tokens the attention mask keeps: [1, H]
        let mask = attention_mask.to_dtype(DTYPE)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?.squeeze(0)?;

        Ok(pooled.to_vec1::<f32>()?)
    }
}

impl Embedder for ModelManager {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Ok(Embedding::zeros(self.dimension));
        }

        let embedding = Embedding::from(normalize(self.encode(text)?));
        embedding.check_dimension(self.dimension)?;
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_directory_resolves_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }

        let files = ModelFiles::resolve(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(files.config, tmp.path().join(CONFIG_FILE));
        assert_eq!(files.tokenizer, tmp.path().join(TOKENIZER_FILE));
        assert_eq!(files.weights, tmp.path().join(WEIGHTS_FILE));
    }

    #[test]
    fn local_directory_missing_weights_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), b"{}").unwrap();
        std::fs::write(tmp.path().join(TOKENIZER_FILE), b"{}").unwrap();

        let err = ModelFiles::resolve(tmp.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "model file", .. }));
    }

    #[test]
    fn invalid_config_fails_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), b"not json").unwrap();
        std::fs::write(tmp.path().join(TOKENIZER_FILE), b"{}").unwrap();
        std::fs::write(tmp.path().join(WEIGHTS_FILE), b"").unwrap();

        let result = ModelManager::load(tmp.path().to_str().unwrap());
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
