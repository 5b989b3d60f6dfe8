//! Arm-state persistence ( invariant 3: "arm state persisted
//! before the next selection for that arm on the same node"). Persistence
//! failure is non-fatal — the in-memory state continues serving selections
//! even if the durable write fails.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::arm::BanditArm;

pub trait ArmPersistence: Send + Sync {
    fn save(&self, domain: &str, arm: &BanditArm) -> Result<(), String>;
    fn load_all(&self, domain: &str) -> Vec<BanditArm>;
}

/// In-process store, one per `(domain)`; a real deployment swaps this for
/// a DB-backed implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryArmPersistence {
    domains: DashMap<String, DashMap<String, BanditArm>>,
}

impl InMemoryArmPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArmPersistence for InMemoryArmPersistence {
    fn save(&self, domain: &str, arm: &BanditArm) -> Result<(), String> {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(arm.arm_id.clone(), arm.clone().migrate());
        Ok(())
    }

    fn load_all(&self, domain: &str) -> Vec<BanditArm> {
        self.domains
            .get(domain)
            .map(|d| d.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }
}

/// A per-domain lock guarding arm mutation: a `BanditArm` is mutated
/// only inside the learning engine under a per-domain lock, with reward
/// computed off-lock and committed under a brief hold.
pub struct ArmTable {
    domain: String,
    arms: Mutex<Vec<BanditArm>>,
    persistence: std::sync::Arc<dyn ArmPersistence>,
}

impl ArmTable {
    pub fn new(domain: impl Into<String>, persistence: std::sync::Arc<dyn ArmPersistence>, seed_arms: Vec<BanditArm>) -> Self {
        let domain = domain.into();
        let mut arms = persistence.load_all(&domain);
        for seed in seed_arms {
            if !arms.iter().any(|a| a.arm_id == seed.arm_id) {
                arms.push(seed);
            }
        }
        Self {
            domain,
            arms: Mutex::new(arms),
            persistence,
        }
    }

    pub fn snapshot(&self) -> Vec<BanditArm> {
        self.arms.lock().clone()
    }

    /// Applies `update_fn` to the named arm's state and commits it to
    /// persistence under a brief lock hold — never across a suspension
    /// point.
    pub fn update(&self, arm_id: &str, update_fn: impl FnOnce(&mut BanditArm)) {
        let mut arms = self.arms.lock();
        if let Some(arm) = arms.iter_mut().find(|a| a.arm_id == arm_id) {
            update_fn(arm);
            // Persistence failure is logged, never propagated — in-memory
            // state is already authoritative for the next selection.
            if let Err(err) = self.persistence.save(&self.domain, arm) {
                tracing::warn!(domain = %self.domain, arm_id, error = %err, "arm persistence failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn update_commits_before_next_snapshot() {
        let persistence = Arc::new(InMemoryArmPersistence::new());
        let table = ArmTable::new("chat", persistence, vec![BanditArm::new("gpt")]);
        table.update("gpt", |arm| arm.record(0.9));
        let snapshot = table.snapshot();
        assert_eq!(snapshot[0].pulls, 1);
    }

    #[test]
    fn reloads_persisted_arms_on_construction() {
        let persistence = Arc::new(InMemoryArmPersistence::new());
        {
            let table = ArmTable::new("chat", persistence.clone(), vec![BanditArm::new("gpt")]);
            table.update("gpt", |arm| arm.record(1.0));
        }
        let table2 = ArmTable::new("chat", persistence, vec![]);
        assert_eq!(table2.snapshot()[0].pulls, 1);
    }
}
