use std::cmp::Ordering;

use rayon::prelude::*;

use crate::{
    embedding::{Embedding, l2_squared},
    error::{Error, Result},
};

/// A corpus position together with its squared L2 distance to a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Ascending distance, lower id first on ties. NaN distances sort last.
fn by_distance_then_id(a: &Neighbor, b: &Neighbor) -> Ordering {
    let by_distance = match (a.distance.is_nan(), b.distance.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a.distance.total_cmp(&b.distance),
    };
    by_distance.then_with(|| a.id.cmp(&b.id))
}

/// Exact nearest-neighbor index over a fixed set of embeddings.
///
/// Vectors are stored row-major in one contiguous buffer; row `i` is the
/// embedding of corpus entry `i`. There is no mutation API: the index is
/// built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    data: Vec<f32>,
    dimension: usize,
    len: usize,
}

impl FlatIndex {
    /// Build an index from the corpus embeddings, in id order.
    ///
    /// Fails on an empty corpus, a zero-dimensional first embedding, or any
    /// embedding whose dimension differs from the first one.
    pub fn build<'a, I>(embeddings: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Embedding>,
    {
        let mut iter = embeddings.into_iter();
        let first = iter.next().ok_or(Error::EmptyCorpus)?;
        let dimension = first.dimension();
        if dimension == 0 {
            return Err(Error::Corpus("embeddings have no components".into()));
        }

        let mut data = first.as_slice().to_vec();
        let mut len = 1;
        for embedding in iter {
            embedding.check_dimension(dimension)?;
            data.extend_from_slice(embedding);
            len += 1;
        }

        Ok(Self {
            data,
            dimension,
            len,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return up to `k` entries closest to `query` by squared L2 distance,
    /// ascending, lower id first on equal distance.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>> {
        query.check_dimension(self.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, row)| Neighbor {
                id,
                distance: l2_squared(query, row),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, by_distance_then_id);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(by_distance_then_id);

        Ok(neighbors)
    }
}
