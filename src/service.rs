use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::{Messages, ServiceConfig},
    corpus_db::CorpusDb,
    embedding::Embedder,
    error::Result,
    index::FlatIndex,
    knowledge_base::KnowledgeBase,
    observer::RejectionObserver,
    policy::{MatchPolicy, Outcome},
};

/// How a [`Reply`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The nearest entry was close enough; its answer was returned.
    Matched { id: usize, distance: f32 },
    /// The nearest entry was too far away; the fallback was returned.
    Unmatched { distance: f32 },
    /// The question was empty; nothing was embedded or searched.
    EmptyQuestion,
}

/// The text handed back to the caller, plus how it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub answer: String,
    pub outcome: ReplyOutcome,
}

/// Answers free-text questions from a fixed knowledge base.
///
/// Everything inside is read-only after construction, so a single service
/// can be shared (behind an `Arc`) by any number of concurrent callers.
pub struct QueryService {
    embedder: Arc<dyn Embedder>,
    knowledge_base: KnowledgeBase,
    index: FlatIndex,
    policy: MatchPolicy,
    messages: Messages,
    observer: Arc<dyn RejectionObserver>,
}

impl QueryService {
    /// Assemble a service from independently built parts.
    ///
    /// No consistency check is made between `knowledge_base` and `index`;
    /// use [`QueryService::from_knowledge_base`] to build the index from the
    /// knowledge base itself.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        knowledge_base: KnowledgeBase,
        index: FlatIndex,
        policy: MatchPolicy,
        messages: Messages,
        observer: Arc<dyn RejectionObserver>,
    ) -> Self {
        Self {
            embedder,
            knowledge_base,
            index,
            policy,
            messages,
            observer,
        }
    }

    /// Index `knowledge_base` and assemble a service around it, after
    /// checking the corpus was embedded with `embedder`'s model.
    pub fn from_knowledge_base(
        embedder: Arc<dyn Embedder>,
        knowledge_base: KnowledgeBase,
        policy: MatchPolicy,
        messages: Messages,
        observer: Arc<dyn RejectionObserver>,
    ) -> Result<Self> {
        knowledge_base.verify_model(embedder.model_id(), embedder.dimension())?;
        let index = FlatIndex::build(knowledge_base.embeddings())?;

        Ok(Self::new(
            embedder,
            knowledge_base,
            index,
            policy,
            messages,
            observer,
        ))
    }

    /// Load the corpus named by `config` and assemble a service around it.
    pub fn from_config(
        config: &ServiceConfig,
        embedder: Arc<dyn Embedder>,
        observer: Arc<dyn RejectionObserver>,
    ) -> Result<Self> {
        let db = CorpusDb::open(&config.corpus_path)?;
        let knowledge_base = KnowledgeBase::load(&db)?;

        tracing::info!(
            corpus = %config.corpus_path.display(),
            entries = knowledge_base.len(),
            dimension = knowledge_base.dimension(),
            model = embedder.model_id(),
            "knowledge base loaded"
        );

        Self::from_knowledge_base(
            embedder,
            knowledge_base,
            config.policy()?,
            config.messages.clone(),
            observer,
        )
    }

    /// Answer one question.
    ///
    /// Empty and unmatched questions are normal outcomes and come back as
    /// `Ok` with the corresponding fixed message. `Err` means something is
    /// internally inconsistent (e.g. the index and knowledge base disagree)
    /// and should be reported as an outage, not shown to the user.
    pub fn answer(&self, question: &str) -> Result<Reply> {
        if question.trim().is_empty() {
            return Ok(Reply {
                answer: self.messages.empty_question.clone(),
                outcome: ReplyOutcome::EmptyQuestion,
            });
        }

        let query = self.embedder.embed(question)?;
        let nearest = self.index.search(&query, 1)?;

        let Some(best) = nearest.first() else {
            return Ok(self.unmatched(question, f32::INFINITY));
        };

        match self.policy.decide(best) {
            Outcome::Matched(id) => Ok(Reply {
                answer: self.knowledge_base.answer_for(id)?.to_string(),
                outcome: ReplyOutcome::Matched {
                    id,
                    distance: best.distance,
                },
            }),
            Outcome::Unmatched => Ok(self.unmatched(question, best.distance)),
        }
    }

    fn unmatched(&self, question: &str, distance: f32) -> Reply {
        self.observer.on_unmatched(question, distance);
        Reply {
            answer: self.messages.fallback.clone(),
            outcome: ReplyOutcome::Unmatched { distance },
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn observer(&self) -> &Arc<dyn RejectionObserver> {
        &self.observer
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("model", &self.embedder.model_id())
            .field("entries", &self.knowledge_base.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
