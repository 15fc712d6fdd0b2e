use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Column;

const MIN_TEMPERATURE: f64 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredMove {
    #[serde(flatten)]
    pub column: Column,
    pub score: f64,
}

/// Draws one candidate with probability proportional to
/// `exp((score - max) / temperature)`. Returns `None` for an empty slice.
pub fn softmax_sample<R: Rng + ?Sized>(
    candidates: &[ScoredMove],
    temperature: f64,
    rng: &mut R,
) -> Option<ScoredMove> {
    let last = *candidates.last()?;
    let temperature = temperature.max(MIN_TEMPERATURE);
    let max_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let scaled: Vec<f64> = candidates
        .iter()
        .map(|c| ((c.score - max_score) / temperature).exp())
        .collect();
    let total: f64 = scaled.iter().sum();
    let mut threshold = rng.random::<f64>() * total;
    for (candidate, weight) in candidates.iter().zip(&scaled) {
        threshold -= weight;
        if threshold <= 0.0 {
            return Some(*candidate);
        }
    }
    Some(last)
}
