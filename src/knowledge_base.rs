use crate::{
    corpus_db::{CorpusDb, DIMENSION_KEY, MODEL_ID_KEY},
    embedding::Embedding,
    error::{Error, Result},
};

/// One known question, its answer, and the embedding of the question.
///
/// `id` is the entry's position in the knowledge base and in any index
/// built over it.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub id: usize,
    pub question: String,
    pub answer: String,
    pub embedding: Embedding,
}

/// Immutable, non-empty sequence of corpus entries indexed by id.
///
/// Questions, answers and embeddings live together in one [`CorpusEntry`],
/// so they cannot drift apart once loaded.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<CorpusEntry>,
    dimension: usize,
    model_id: Option<String>,
}

impl KnowledgeBase {
    /// Zip three parallel collections into a knowledge base.
    ///
    /// Fails if the collections differ in length, are empty, or the
    /// embeddings do not all share one dimension.
    pub fn from_parts(
        questions: Vec<String>,
        answers: Vec<String>,
        embeddings: Vec<Embedding>,
    ) -> Result<Self> {
        if questions.len() != answers.len()
            || questions.len() != embeddings.len()
        {
            return Err(Error::CorpusMismatch {
                questions: questions.len(),
                answers: answers.len(),
                embeddings: embeddings.len(),
            });
        }

        let dimension = embeddings
            .first()
            .map(Embedding::dimension)
            .ok_or(Error::EmptyCorpus)?;
        if dimension == 0 {
            return Err(Error::Corpus("embeddings have no components".into()));
        }

        let entries = questions
            .into_iter()
            .zip(answers)
            .zip(embeddings)
            .enumerate()
            .map(|(id, ((question, answer), embedding))| {
                embedding.check_dimension(dimension)?;
                Ok(CorpusEntry {
                    id,
                    question,
                    answer,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entries,
            dimension,
            model_id: None,
        })
    }

    /// Load and validate a persisted corpus.
    ///
    /// On top of the checks in [`KnowledgeBase::from_parts`], every table
    /// must be keyed by exactly `0..N`, and a stored `dimension` setting
    /// must agree with the embeddings.
    pub fn load(db: &CorpusDb) -> Result<Self> {
        let questions = dense("questions", db.load_questions()?)?;
        let answers = dense("answers", db.load_answers()?)?;
        let embeddings = dense("embeddings", db.load_embeddings()?)?
            .into_iter()
            .map(Embedding::from)
            .collect();

        let mut kb = Self::from_parts(questions, answers, embeddings)?;

        if let Some(stored) = db.get_setting(DIMENSION_KEY)? {
            let stored: usize = stored.parse().map_err(|_| {
                Error::Corpus(format!("invalid dimension setting: {stored}"))
            })?;
            if stored != kb.dimension {
                return Err(Error::DimensionMismatch {
                    expected: stored,
                    actual: kb.dimension,
                });
            }
        }
        kb.model_id = db.get_setting(MODEL_ID_KEY)?;

        Ok(kb)
    }

    /// Check that this corpus was embedded by `model_id` with `dimension`
    /// components. A corpus without a stored model ID only has its
    /// dimension checked.
    pub fn verify_model(&self, model_id: &str, dimension: usize) -> Result<()> {
        if let Some(corpus) = &self.model_id
            && corpus != model_id
        {
            return Err(Error::ModelMismatch {
                corpus: corpus.clone(),
                configured: model_id.to_string(),
            });
        }
        if self.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }
        Ok(())
    }

    pub fn answer_for(&self, id: usize) -> Result<&str> {
        self.entry(id).map(|e| e.answer.as_str())
    }

    pub fn question_for(&self, id: usize) -> Result<&str> {
        self.entry(id).map(|e| e.question.as_str())
    }

    pub fn entry(&self, id: usize) -> Result<&CorpusEntry> {
        self.entries.get(id).ok_or(Error::IdOutOfRange {
            id,
            len: self.entries.len(),
        })
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Embeddings in id order, for building an index.
    pub fn embeddings(&self) -> impl Iterator<Item = &Embedding> {
        self.entries.iter().map(|e| &e.embedding)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model fingerprint stored with the corpus, if any.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }
}

/// Strip ids after checking they run exactly `0..N`.
fn dense<T>(table: &str, rows: Vec<(u64, T)>) -> Result<Vec<T>> {
    rows.into_iter()
        .enumerate()
        .map(|(position, (id, value))| {
            if id == position as u64 {
                Ok(value)
            } else {
                Err(Error::Corpus(format!(
                    "{table} ids are not contiguous: expected {position}, found {id}"
                )))
            }
        })
        .collect()
}
