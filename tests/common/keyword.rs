//! Deterministic keyword embedder and the two-entry name/age corpus.
//!
//! Shared by the unit tests (through `src/test_util.rs`) and the integration
//! tests. The including module provides `Embedder`, `Embedding`, `Result`
//! and `normalize`.

use super::{Embedder, Embedding, Result, normalize};

pub const KEYWORD_MODEL_ID: &str = "keyword-test";

const VOCABULARY: &[&str] = &[
    "what", "is", "your", "name", "how", "old", "are", "you", "the",
    "weather", "today",
];

pub const SCENARIO_QUESTIONS: [&str; 2] =
    ["What is your name?", "How old are you?"];
pub const SCENARIO_ANSWERS: [&str; 2] = ["I am Bot.", "I am ageless."];

/// Bag-of-words over a fixed vocabulary, L2-normalized. Unknown words are
/// ignored, so text with no known words maps to the zero vector.
#[derive(Debug)]
pub struct KeywordEmbedder {
    model_id: String,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::with_model_id(KEYWORD_MODEL_ID)
    }

    pub fn with_model_id(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
        }
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut counts = vec![0.0; VOCABULARY.len()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if let Some(slot) = VOCABULARY.iter().position(|v| *v == word) {
                counts[slot] += 1.0;
            }
        }
        Ok(Embedding::from(normalize(counts)))
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Embeddings of [`SCENARIO_QUESTIONS`], in order.
pub fn scenario_vectors() -> Result<Vec<Vec<f32>>> {
    let embedder = KeywordEmbedder::new();
    SCENARIO_QUESTIONS
        .iter()
        .map(|q| embedder.embed(q).map(|e| e.as_slice().to_vec()))
        .collect()
}
