use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    data_dir::DataDir,
    error::{Error, Result},
    model_manager::DEFAULT_MODEL_ID,
    policy::{DEFAULT_THRESHOLD, MatchPolicy},
};

pub const MODEL_ENV_VAR: &str = "ASKBERT_MODEL";
pub const THRESHOLD_ENV_VAR: &str = "ASKBERT_THRESHOLD";
pub const CORPUS_ENV_VAR: &str = "ASKBERT_CORPUS";
pub const FALLBACK_ENV_VAR: &str = "ASKBERT_FALLBACK_MESSAGE";

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm sorry, I don't have an answer yet. Could you rephrase your question?";
pub const DEFAULT_EMPTY_QUESTION_MESSAGE: &str = "Please ask a question.";
pub const DEFAULT_UNAVAILABLE_MESSAGE: &str =
    "The service is temporarily unavailable. Please try again later.";

/// The fixed texts returned when there is no real answer to give.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Messages {
    /// Returned when the nearest entry is too far away.
    pub fallback: String,
    /// Returned for empty or whitespace-only questions.
    pub empty_question: String,
    /// Returned by the transports when answering fails internally.
    pub unavailable: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_FALLBACK_MESSAGE.to_string(),
            empty_question: DEFAULT_EMPTY_QUESTION_MESSAGE.to_string(),
            unavailable: DEFAULT_UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

/// Values given explicitly on the command line. These win over
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub threshold: Option<f32>,
    pub corpus: Option<PathBuf>,
}

/// Everything needed to assemble a query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub model_id: String,
    pub threshold: f32,
    pub corpus_path: PathBuf,
    pub messages: Messages,
}

impl ServiceConfig {
    /// Resolve configuration from, in order of priority:
    /// 1. Explicit overrides (CLI flags)
    /// 2. `ASKBERT_*` environment variables
    /// 3. Built-in defaults (`corpus.redb` inside the data directory)
    pub fn resolve(data_dir: &DataDir, overrides: &Overrides) -> Result<Self> {
        Self::resolve_with(data_dir, overrides, |key| std::env::var(key).ok())
    }

    /// Like [`ServiceConfig::resolve`], reading variables through `env`.
    pub fn resolve_with(
        data_dir: &DataDir,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let model_id = overrides
            .model
            .clone()
            .or_else(|| env(MODEL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        let threshold = match overrides.threshold {
            Some(t) => t,
            None => match env(THRESHOLD_ENV_VAR) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "{THRESHOLD_ENV_VAR} is not a number: {raw}"
                    ))
                })?,
                None => DEFAULT_THRESHOLD,
            },
        };
        // Validate early so a bad value aborts startup.
        MatchPolicy::new(threshold)?;

        let corpus_path = overrides
            .corpus
            .clone()
            .or_else(|| env(CORPUS_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| data_dir.corpus_db());

        let mut messages = Messages::default();
        if let Some(fallback) = env(FALLBACK_ENV_VAR)
            && !fallback.trim().is_empty()
        {
            messages.fallback = fallback;
        }

        Ok(Self {
            model_id,
            threshold,
            corpus_path,
            messages,
        })
    }

    pub fn policy(&self) -> Result<MatchPolicy> {
        MatchPolicy::new(self.threshold)
    }
}
