//! Router flow: candidate set -> budget preflight ->
//! capability gate -> policy select -> execute -> reward -> update.

use std::sync::Arc;

use meridian_core::{ErrorKind, StepResult};

use crate::budget::BudgetState;
use crate::candidate::{available_candidates, filter_by_budget, filter_by_capability, ModelCandidate, RoutingRequest};
use crate::persistence::ArmTable;
use crate::policies::Policy;
use crate::reward::{compute_reward, CallOutcome, RewardWeights, PENALTY_REWARD};

pub struct RoutingDecision {
    pub arm_id: String,
    pub policy_name: &'static str,
}

/// Runs steps 1-4 of: builds the candidate set, applies the
/// budget and capability filters, and asks the policy to pick a survivor.
pub fn decide(
    registry: &[ModelCandidate],
    request: &RoutingRequest,
    budget: &BudgetState,
    arms: &ArmTable,
    policy: &dyn Policy,
    context_vec: Option<&[f64]>,
) -> StepResult<RoutingDecision> {
    let available = available_candidates(registry);
    let budget_ok = filter_by_budget(available, request, budget);
    if budget_ok.is_empty() {
        return StepResult::fail(ErrorKind::BudgetExceeded, "no candidate survives budget preflight");
    }
    let capable = filter_by_capability(budget_ok, request);
    if capable.is_empty() {
        return StepResult::fail(ErrorKind::PolicyDenied, "no candidate has the required capabilities");
    }

    let surviving_ids: Vec<&str> = capable.iter().map(|c| c.arm_id.as_str()).collect();
    let arm_snapshot: Vec<_> = arms
        .snapshot()
        .into_iter()
        .filter(|a| surviving_ids.contains(&a.arm_id.as_str()))
        .collect();

    match policy.select(&arm_snapshot, context_vec) {
        Some(arm_id) => StepResult::ok(RoutingDecision {
            arm_id,
            policy_name: policy.name(),
        }),
        None => StepResult::fail(ErrorKind::Internal, "policy selected no arm"),
    }
}

/// Computes the reward for a completed call and commits the arm
/// update. Always succeeds from the caller's point of view —
/// persistence failure inside `ArmTable::update` is logged, not surfaced.
pub fn record_outcome(
    arms: &ArmTable,
    arm_id: &str,
    policy: &dyn Policy,
    weights: RewardWeights,
    outcome: CallOutcome,
    context_vec: Option<&[f64]>,
) -> f64 {
    let reward = compute_reward(weights, outcome);
    arms.update(arm_id, |arm| policy.update(arm, reward, context_vec));
    reward
}

/// Records the penalty reward used when the router's own call failed
/// ( "router call failure returns StepResult.fail and arm update
/// uses penalty reward").
pub fn record_failure(arms: &ArmTable, arm_id: &str, policy: &dyn Policy, context_vec: Option<&[f64]>) {
    arms.update(arm_id, |arm| policy.update(arm, PENALTY_REWARD, context_vec));
}

pub type SharedArmTable = Arc<ArmTable>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::BanditArm;
    use crate::candidate::Capability;
    use crate::persistence::InMemoryArmPersistence;
    use crate::policies::EpsilonGreedy;
    use std::sync::Arc;

    fn registry() -> Vec<ModelCandidate> {
        vec![
            ModelCandidate {
                arm_id: "cheap".to_string(),
                capabilities: Default::default(),
                price_per_token_usd: 0.000001,
                available: true,
            },
            ModelCandidate {
                arm_id: "pricey".to_string(),
                capabilities: [Capability::Vision].into_iter().collect(),
                price_per_token_usd: 1.0,
                available: true,
            },
        ]
    }

    #[test]
    fn budget_exceeded_when_no_candidate_survives() {
        let budget = BudgetState::new("t1", "w1", 0.0);
        let request = RoutingRequest {
            estimated_tokens_in: 1000,
            estimated_tokens_out: 1000,
            required_capabilities: vec![],
        };
        let arms = ArmTable::new("chat", Arc::new(InMemoryArmPersistence::new()), vec![BanditArm::new("cheap")]);
        let policy = EpsilonGreedy::new(0.0);
        let result = decide(&registry(), &request, &budget, &arms, &policy, None);
        assert!(result.is_fail());
        assert_eq!(result.error_kind(), Some(ErrorKind::BudgetExceeded));
    }

    #[test]
    fn happy_path_selects_surviving_candidate() {
        let budget = BudgetState::new("t1", "w1", 1000.0);
        let request = RoutingRequest {
            estimated_tokens_in: 10,
            estimated_tokens_out: 10,
            required_capabilities: vec![],
        };
        let arms = ArmTable::new(
            "chat",
            Arc::new(InMemoryArmPersistence::new()),
            vec![BanditArm::new("cheap"), BanditArm::new("pricey")],
        );
        let policy = EpsilonGreedy::new(0.0);
        let result = decide(&registry(), &request, &budget, &arms, &policy, None);
        assert!(result.is_ok());
    }

    #[test]
    fn capability_gate_excludes_unqualified_candidates() {
        let budget = BudgetState::new("t1", "w1", 1000.0);
        let request = RoutingRequest {
            estimated_tokens_in: 10,
            estimated_tokens_out: 10,
            required_capabilities: vec![Capability::Tools],
        };
        let arms = ArmTable::new("chat", Arc::new(InMemoryArmPersistence::new()), vec![BanditArm::new("cheap")]);
        let policy = EpsilonGreedy::new(0.0);
        let result = decide(&registry(), &request, &budget, &arms, &policy, None);
        assert!(result.is_fail());
        assert_eq!(result.error_kind(), Some(ErrorKind::PolicyDenied));
    }
}
