use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("model download error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("model error: {0}")]
    Model(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error(
        "corpus collections differ in length: {questions} questions, {answers} answers, {embeddings} embeddings"
    )]
    CorpusMismatch {
        questions: usize,
        answers: usize,
        embeddings: usize,
    },

    #[error("corrupt corpus: {0}")]
    Corpus(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "corpus was embedded with model '{corpus}' but the configured model is '{configured}'"
    )]
    ModelMismatch { corpus: String, configured: String },

    #[error("entry id {id} out of range for knowledge base of {len} entries")]
    IdOutOfRange { id: usize, len: usize },
}
