use serde::{Deserialize, Serialize};

use super::Outcome;

/// Coefficients of the static evaluation. Adjusted between games, read-only
/// during a search.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weights {
    pub center: f64,
    pub two: f64,
    pub three: f64,
    pub block_two: f64,
    pub block_three: f64,
    pub open_two: f64,
    pub open_three: f64,
    pub height: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            center: 1.0,
            two: 6.0,
            three: 40.0,
            block_two: 8.0,
            block_three: 60.0,
            open_two: 12.0,
            open_three: 90.0,
            height: 0.4,
        }
    }
}

impl Weights {
    /// Reinforces defence after a loss and offence after a win; draws keep
    /// the weights as they are.
    pub fn adjust(&self, outcome: Outcome) -> Weights {
        let mut next = *self;
        match outcome {
            Outcome::Loss => {
                next.block_two = (next.block_two + 0.5).clamp(4.0, 20.0);
                next.block_three = (next.block_three + 2.0).clamp(30.0, 120.0);
                next.open_two = (next.open_two + 1.0).clamp(6.0, 24.0);
                next.open_three = (next.open_three + 2.0).clamp(40.0, 140.0);
            }
            Outcome::Win => {
                next.two = (next.two + 0.2).clamp(2.0, 12.0);
                next.three = (next.three + 1.0).clamp(20.0, 80.0);
            }
            Outcome::Draw => {}
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_raises_defensive_weights() {
        let base = Weights::default();
        let next = base.adjust(Outcome::Loss);
        assert_eq!(next.block_two, 8.5);
        assert_eq!(next.block_three, 62.0);
        assert_eq!(next.open_two, 13.0);
        assert_eq!(next.open_three, 92.0);
        assert_eq!(next.two, base.two);
        assert_eq!(next.three, base.three);
    }

    #[test]
    fn win_raises_offensive_weights() {
        let next = Weights::default().adjust(Outcome::Win);
        assert!((next.two - 6.2).abs() < 1e-9);
        assert_eq!(next.three, 41.0);
        assert_eq!(next.block_three, 60.0);
    }

    #[test]
    fn draw_leaves_weights_alone() {
        let base = Weights::default();
        assert_eq!(base.adjust(Outcome::Draw), base);
    }

    #[test]
    fn repeated_adjustment_stays_clamped() {
        let mut weights = Weights::default();
        for _ in 0..200 {
            weights = weights.adjust(Outcome::Loss).adjust(Outcome::Win);
        }
        assert_eq!(weights.block_two, 20.0);
        assert_eq!(weights.block_three, 120.0);
        assert_eq!(weights.open_two, 24.0);
        assert_eq!(weights.open_three, 140.0);
        assert_eq!(weights.two, 12.0);
        assert_eq!(weights.three, 80.0);
    }

    #[test]
    fn partial_record_fills_defaults() {
        let weights: Weights = serde_json::from_str(r#"{"three": 55.0, "blockTwo": 9}"#).unwrap();
        assert_eq!(weights.three, 55.0);
        assert_eq!(weights.block_two, 9.0);
        assert_eq!(weights.open_three, 90.0);
    }
}
