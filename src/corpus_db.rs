use std::path::Path;

use redb::{
    Database,
    Key,
    ReadOnlyDatabase,
    ReadOnlyTable,
    ReadTransaction,
    ReadableDatabase,
    ReadableTable,
    TableDefinition,
    TableError,
    Value,
};

use crate::error::{Error, Result};

const QUESTIONS: TableDefinition<u64, &str> = TableDefinition::new("questions");
const ANSWERS: TableDefinition<u64, &str> = TableDefinition::new("answers");
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Setting key holding the ID of the model the corpus was embedded with.
pub const MODEL_ID_KEY: &str = "model_id";
/// Setting key holding the embedding dimension of the corpus.
pub const DIMENSION_KEY: &str = "dimension";

enum Handle {
    Writable(Database),
    ReadOnly(ReadOnlyDatabase),
}

/// Persisted knowledge base: three aligned collections keyed by entry id.
///
/// - `questions`: id -> question text
/// - `answers`: id -> answer text
/// - `embeddings`: id -> D little-endian f32 values
///
/// plus a `settings` table carrying the model fingerprint. Nothing here
/// checks that the collections line up; that is the job of
/// [`KnowledgeBase::load`](crate::knowledge_base::KnowledgeBase::load).
pub struct CorpusDb {
    db: Handle,
}

impl CorpusDb {
    /// Open or create a writable corpus database at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use askbert::CorpusDb;
    ///
    /// let db = CorpusDb::create(&tmp.path().join("corpus.redb")).unwrap();
    /// assert!(db.load_questions().unwrap().is_empty());
    /// ```
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(QUESTIONS)?;
        txn.open_table(ANSWERS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self {
            db: Handle::Writable(db),
        })
    }

    /// Open an existing corpus database for reading. The file is never
    /// written, so it may live on a read-only mount. A missing file is an
    /// error rather than an empty corpus.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound {
                kind: "corpus",
                name: path.display().to_string(),
            });
        }

        Ok(Self {
            db: Handle::ReadOnly(ReadOnlyDatabase::open(path)?),
        })
    }

    fn writable(&self) -> Result<&Database> {
        match &self.db {
            Handle::Writable(db) => Ok(db),
            Handle::ReadOnly(_) => {
                Err(Error::Corpus("corpus was opened read-only".into()))
            }
        }
    }

    fn begin_read(&self) -> Result<ReadTransaction> {
        let txn = match &self.db {
            Handle::Writable(db) => db.begin_read()?,
            Handle::ReadOnly(db) => db.begin_read()?,
        };
        Ok(txn)
    }

    // -- Writers --

    /// Replace all questions with `questions`, stored at ids `0..len`.
    pub fn store_questions<S: AsRef<str>>(
        &self,
        questions: &[S],
    ) -> Result<()> {
        self.replace_texts(QUESTIONS, questions)
    }

    /// Replace all answers with `answers`, stored at ids `0..len`.
    pub fn store_answers<S: AsRef<str>>(&self, answers: &[S]) -> Result<()> {
        self.replace_texts(ANSWERS, answers)
    }

    fn replace_texts<S: AsRef<str>>(
        &self,
        definition: TableDefinition<'static, u64, &'static str>,
        texts: &[S],
    ) -> Result<()> {
        let txn = self.writable()?.begin_write()?;
        txn.delete_table(definition)?;
        {
            let mut table = txn.open_table(definition)?;
            for (id, text) in texts.iter().enumerate() {
                table.insert(id as u64, text.as_ref())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Replace all embeddings with `embeddings`, stored at ids `0..len`.
    pub fn store_embeddings(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        let txn = self.writable()?.begin_write()?;
        txn.delete_table(EMBEDDINGS)?;
        {
            let mut table = txn.open_table(EMBEDDINGS)?;
            for (id, values) in embeddings.iter().enumerate() {
                table.insert(id as u64, encode_vector(values).as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Record the model the embeddings were produced with.
    pub fn store_fingerprint(
        &self,
        model_id: &str,
        dimension: usize,
    ) -> Result<()> {
        let txn = self.writable()?.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(MODEL_ID_KEY, model_id)?;
            table.insert(DIMENSION_KEY, dimension.to_string().as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.writable()?.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    // -- Readers --
    //
    // A table that was never created reads as empty.

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.begin_read()?;
        let Some(table) = open_existing(&txn, SETTINGS)? else {
            return Ok(None);
        };
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// All `(id, question)` pairs in ascending id order.
    pub fn load_questions(&self) -> Result<Vec<(u64, String)>> {
        self.load_texts(QUESTIONS)
    }

    /// All `(id, answer)` pairs in ascending id order.
    pub fn load_answers(&self) -> Result<Vec<(u64, String)>> {
        self.load_texts(ANSWERS)
    }

    fn load_texts(
        &self,
        definition: TableDefinition<'static, u64, &'static str>,
    ) -> Result<Vec<(u64, String)>> {
        let txn = self.begin_read()?;
        let Some(table) = open_existing(&txn, definition)? else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value(), v.value().to_string()));
        }
        Ok(result)
    }

    /// All `(id, vector)` pairs in ascending id order.
    ///
    /// Fails if a stored value is not a whole number of f32 values.
    pub fn load_embeddings(&self) -> Result<Vec<(u64, Vec<f32>)>> {
        let txn = self.begin_read()?;
        let Some(table) = open_existing(&txn, EMBEDDINGS)? else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value(), decode_vector(k.value(), v.value())?));
        }
        Ok(result)
    }
}

fn open_existing<K, V>(
    txn: &ReadTransaction,
    definition: TableDefinition<'_, K, V>,
) -> Result<Option<ReadOnlyTable<K, V>>>
where
    K: Key + 'static,
    V: Value + 'static,
{
    match txn.open_table(definition) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Encode as little-endian f32 values, whatever the host byte order.
fn encode_vector(values: &[f32]) -> Vec<u8> {
    let words: Vec<u32> = values.iter().map(|v| v.to_bits().to_le()).collect();
    bytemuck::cast_slice(&words).to_vec()
}

/// Decode little-endian f32 values. redb does not guarantee alignment of
/// stored values, so each one is read unaligned.
fn decode_vector(id: u64, bytes: &[u8]) -> Result<Vec<f32>> {
    const WIDTH: usize = std::mem::size_of::<f32>();
    if bytes.len() % WIDTH != 0 {
        return Err(Error::Corpus(format!(
            "embedding {id} has {} bytes, not a multiple of {WIDTH}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WIDTH)
        .map(|chunk| {
            f32::from_bits(u32::from_le(bytemuck::pod_read_unaligned(chunk)))
        })
        .collect())
}

impl std::fmt::Debug for CorpusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusDb").finish_non_exhaustive()
    }
}
