#![allow(dead_code)]

use std::path::{Path, PathBuf};

use askbert::{CorpusDb, Embedder, Embedding, Result, embedding::normalize};

mod keyword;

pub use keyword::{
    KEYWORD_MODEL_ID as MODEL_ID,
    KeywordEmbedder,
    SCENARIO_ANSWERS,
    SCENARIO_QUESTIONS,
    scenario_vectors,
};

/// Write the name/age corpus to `corpus.redb` inside `dir`.
pub fn write_corpus(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("corpus.redb");
    let db = CorpusDb::create(&path)?;
    db.store_questions(&SCENARIO_QUESTIONS)?;
    db.store_answers(&SCENARIO_ANSWERS)?;
    db.store_embeddings(&scenario_vectors()?)?;
    db.store_fingerprint(MODEL_ID, KeywordEmbedder::new().dimension())?;

    Ok(path)
}
