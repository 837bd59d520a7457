//! Deterministic stand-ins for the neural model, shared by unit tests.

use std::{
    path::Path,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    config::Messages,
    corpus_db::CorpusDb,
    embedding::{Embedder, Embedding, normalize},
    error::Result,
    index::FlatIndex,
    knowledge_base::KnowledgeBase,
    observer::RejectionObserver,
    policy::MatchPolicy,
    service::QueryService,
};

#[path = "../tests/common/keyword.rs"]
mod keyword;

pub use keyword::{
    KEYWORD_MODEL_ID,
    KeywordEmbedder,
    SCENARIO_ANSWERS,
    SCENARIO_QUESTIONS,
    scenario_vectors,
};

/// Counts calls to the wrapped embedder.
#[derive(Debug)]
pub struct CountingEmbedder<E> {
    inner: E,
    calls: AtomicUsize,
}

impl<E> CountingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<E: Embedder> Embedder for CountingEmbedder<E> {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(String, f32)>>,
}

impl RecordingObserver {
    pub fn rejections(&self) -> Vec<(String, f32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl RejectionObserver for RecordingObserver {
    fn on_unmatched(&self, question: &str, distance: f32) {
        self.seen
            .lock()
            .unwrap()
            .push((question.to_string(), distance));
    }
}

fn scenario_embeddings() -> Vec<Embedding> {
    scenario_vectors()
        .unwrap()
        .into_iter()
        .map(Embedding::from)
        .collect()
}

/// The two-entry name/age knowledge base, without a model fingerprint.
pub fn scenario_knowledge_base() -> KnowledgeBase {
    KnowledgeBase::from_parts(
        SCENARIO_QUESTIONS.iter().map(|s| s.to_string()).collect(),
        SCENARIO_ANSWERS.iter().map(|s| s.to_string()).collect(),
        scenario_embeddings(),
    )
    .unwrap()
}

/// Persist the scenario corpus as `corpus.redb` inside `dir`, fingerprinted
/// with [`KEYWORD_MODEL_ID`].
pub fn write_scenario_corpus(dir: &Path) -> CorpusDb {
    let db = CorpusDb::create(&dir.join("corpus.redb")).unwrap();
    db.store_questions(&SCENARIO_QUESTIONS).unwrap();
    db.store_answers(&SCENARIO_ANSWERS).unwrap();
    db.store_embeddings(&scenario_vectors().unwrap()).unwrap();
    db.store_fingerprint(KEYWORD_MODEL_ID, KeywordEmbedder::new().dimension())
        .unwrap();
    db
}

/// A service whose index has one row more than its knowledge base. That
/// extra row is exactly the embedding of "the weather today", so asking it
/// fails with `IdOutOfRange`.
pub fn inconsistent_service() -> QueryService {
    let embedder = Arc::new(KeywordEmbedder::new());
    let knowledge_base = scenario_knowledge_base();

    let mut rows: Vec<Embedding> =
        knowledge_base.embeddings().cloned().collect();
    rows.push(embedder.embed("the weather today").unwrap());
    let index = FlatIndex::build(&rows).unwrap();

    QueryService::new(
        embedder,
        knowledge_base,
        index,
        MatchPolicy::default(),
        Messages::default(),
        Arc::new(RecordingObserver::default()),
    )
}

/// Scenario service with the default threshold and messages.
pub fn scenario_service() -> (QueryService, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let service = QueryService::from_knowledge_base(
        Arc::new(KeywordEmbedder::new()),
        scenario_knowledge_base(),
        MatchPolicy::default(),
        Messages::default(),
        observer.clone(),
    )
    .unwrap();
    (service, observer)
}
