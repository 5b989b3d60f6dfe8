//! RL-paced polling: arms `{fast, normal, slow}`,
//! reward = `signal(new items found) / poll cost`, Thompson picks the
//! next interval. Built directly on [`meridian_router`]'s bandit
//! primitives so the scheduler's pacing decisions share the exact same
//! persisted-arm-state and tie-break machinery as the model router (C6).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meridian_router::{ArmTable, BanditArm, InMemoryArmPersistence, Policy, RewardModel, ThompsonSampling};

use crate::watchlist::{PacingArm, WatchItem};

/// One `ArmTable` per `(tenant, workspace, source_kind)` domain, holding
/// the three pacing arms ( "BanditArm mutated only inside the
/// learning engine under a per-domain lock").
pub struct PacingEngine {
    policy: ThompsonSampling,
    persistence: Arc<InMemoryArmPersistence>,
}

impl PacingEngine {
    pub fn new() -> Self {
        Self {
            policy: ThompsonSampling::new(RewardModel::Beta),
            persistence: Arc::new(InMemoryArmPersistence::new()),
        }
    }

    fn domain(tenant: &str, workspace: &str, source_kind: &str) -> String {
        format!("pacing:{tenant}:{workspace}:{source_kind}")
    }

    fn arm_table(&self, tenant: &str, workspace: &str, source_kind: &str) -> ArmTable {
        let domain = Self::domain(tenant, workspace, source_kind);
        ArmTable::new(
            domain,
            self.persistence.clone(),
            vec![
                BanditArm::new(PacingArm::Fast.arm_id()),
                BanditArm::new(PacingArm::Normal.arm_id()),
                BanditArm::new(PacingArm::Slow.arm_id()),
            ],
        )
    }

    /// Reward signal for a completed poll: `new_items_found / poll_cost`,
    /// clipped to `[0, 1]` for the Beta-Bernoulli posterior (
    /// reward-clipping convention, reused here).
    pub fn reward_for(new_items_found: usize, poll_cost: f64) -> f64 {
        if poll_cost <= 0.0 {
            return 0.0;
        }
        (new_items_found as f64 / poll_cost).min(1.0).max(0.0)
    }

    /// After a discovery poll, records the reward for the watch's current
    /// pacing arm and picks the next one, updating `watch.rl_state`,
    /// `watch.poll_interval_s` and `watch.next_poll_at` in place.
    pub fn record_and_repick(&self, watch: &mut WatchItem, new_items_found: usize, poll_cost: f64, now: DateTime<Utc>) {
        let table = self.arm_table(&watch.tenant, &watch.workspace, &watch.source_kind);
        let reward = Self::reward_for(new_items_found, poll_cost);
        table.update(watch.rl_state.arm_id(), |arm| self.policy.update(arm, reward, None));

        let snapshot = table.snapshot();
        let picked = self
            .policy
            .select(&snapshot, None)
            .map(|id| PacingArm::parse(&id))
            .unwrap_or(watch.rl_state);

        watch.rl_state = picked;
        watch.poll_interval_s = picked.interval_s();
        watch.next_poll_at = now + chrono::Duration::seconds(picked.interval_s());
    }
}

impl Default for PacingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_clips_to_unit_interval() {
        assert_eq!(PacingEngine::reward_for(10, 1.0), 1.0);
        assert_eq!(PacingEngine::reward_for(0, 1.0), 0.0);
    }

    #[test]
    fn zero_poll_cost_yields_zero_reward() {
        assert_eq!(PacingEngine::reward_for(5, 0.0), 0.0);
    }

    #[test]
    fn record_and_repick_updates_next_poll_at() {
        let engine = PacingEngine::new();
        let mut watch = WatchItem::new("t1", "w1", "youtube", "@chan");
        let before = watch.next_poll_at;
        engine.record_and_repick(&mut watch, 3, 1.0, Utc::now());
        assert!(watch.next_poll_at >= before);
    }
}
