use crate::{
    error::{Error, Result},
    index::Neighbor,
};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Result of applying a [`MatchPolicy`] to a nearest neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched(usize),
    Unmatched,
}

/// Accepts a nearest neighbor when its distance is at most the threshold.
///
/// A distance exactly equal to the threshold is a match; only strictly
/// greater distances (and NaN) are rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    threshold: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MatchPolicy {
    /// Create a policy, rejecting thresholds that are negative, NaN or
    /// infinite.
    pub fn new(threshold: f32) -> Result<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Config(format!(
                "threshold must be a finite, non-negative number, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn decide(&self, neighbor: &Neighbor) -> Outcome {
        if neighbor.distance <= self.threshold {
            Outcome::Matched(neighbor.id)
        } else {
            Outcome::Unmatched
        }
    }
}
