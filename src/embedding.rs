use std::ops::Deref;

use crate::error::{Error, Result};

/// A fixed-length dense vector produced by an [`Embedder`].
///
/// Immutable once built: there is no mutable access to the components.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// The all-zero embedding of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self(vec![0.0; dimension])
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Returns an error unless this embedding has exactly `expected`
    /// components.
    pub fn check_dimension(&self, expected: usize) -> Result<()> {
        if self.dimension() == expected {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected,
                actual: self.dimension(),
            })
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

/// Maps text to a fixed-dimension embedding.
///
/// Implementations hold their model as immutable state loaded once at
/// construction, so a single instance can be shared across threads.
/// Encoding the same text twice must produce the same vector.
pub trait Embedder: Send + Sync {
    /// Encode `text` into an embedding of exactly [`Embedder::dimension`]
    /// components. Empty or whitespace-only text yields a defined neutral
    /// vector instead of an error.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Number of components in every embedding this model produces.
    fn dimension(&self) -> usize;

    /// Identifier of the model, stored alongside a corpus as its
    /// fingerprint.
    fn model_id(&self) -> &str;
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Scale `values` to unit L2 norm. A zero vector is returned unchanged.
pub fn normalize(mut values: Vec<f32>) -> Vec<f32> {
    let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }
    values
}
