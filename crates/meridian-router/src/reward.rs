//! Reward computation: weighted combination of
//! quality, inverse cost, inverse latency, clipped to `[0, 1]`.
//!
//! Weight defaults `(0.5, 0.4, 0.1)` are a policy default, not a
//! hardcoded contract — kept as tunable config (see DESIGN.md).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RewardWeights {
    pub w_quality: f64,
    pub w_cost: f64,
    pub w_latency: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            w_quality: 0.5,
            w_cost: 0.4,
            w_latency: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    /// 0.0-1.0 quality score from whatever grader produced it.
    pub quality: f64,
    pub cost_usd: f64,
    pub latency_s: f64,
}

/// `w_quality*q + w_cost*(1/cost) + w_latency*(1/latency)`, clipped to
/// `[0, 1]`.
pub fn compute_reward(weights: RewardWeights, outcome: CallOutcome) -> f64 {
    let inv_cost = if outcome.cost_usd > 0.0 {
        (1.0 / outcome.cost_usd).min(1.0)
    } else {
        1.0
    };
    let inv_latency = if outcome.latency_s > 0.0 {
        (1.0 / outcome.latency_s).min(1.0)
    } else {
        1.0
    };
    let raw = weights.w_quality * outcome.quality + weights.w_cost * inv_cost + weights.w_latency * inv_latency;
    raw.clamp(0.0, 1.0)
}

/// Penalty reward used when a router call fails and an arm update must
/// still occur ( "Failure semantics": "arm update uses penalty
/// reward (floor, e.g., 0)").
pub const PENALTY_REWARD: f64 = 0.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_clipped_to_unit_interval() {
        let weights = RewardWeights::default();
        let reward = compute_reward(
            weights,
            CallOutcome {
                quality: 1.0,
                cost_usd: 0.0001,
                latency_s: 0.0001,
            },
        );
        assert!((0.0..=1.0).contains(&reward));
    }

    #[test]
    fn zero_quality_and_high_cost_yields_low_reward() {
        let weights = RewardWeights::default();
        let reward = compute_reward(
            weights,
            CallOutcome {
                quality: 0.0,
                cost_usd: 100.0,
                latency_s: 100.0,
            },
        );
        assert!(reward < 0.1);
    }
}
