//! Learning-engine router: bandit policies, candidate
//! filtering, budget-aware selection, experiment harness, shadow bakeoff.

pub mod arm;
pub mod budget;
pub mod candidate;
pub mod experiment;
pub mod linalg;
pub mod persistence;
pub mod policies;
pub mod reward;
pub mod router;

pub use arm::{BanditArm, ContextModel, CURRENT_ARM_VERSION};
pub use budget::{BudgetRegistry, BudgetState};
pub use candidate::{available_candidates, filter_by_budget, filter_by_capability, Capability, ModelCandidate, RoutingRequest};
pub use experiment::{assign, bakeoff, traffic_split_fraction, Arm, BakeoffReport, RewardSample, ShadowRecord};
pub use persistence::{ArmPersistence, ArmTable, InMemoryArmPersistence};
pub use policies::{EpsilonGreedy, LinTs, LinUcb, Policy, RewardModel, ThompsonSampling, Ucb1};
pub use reward::{compute_reward, CallOutcome, RewardWeights, PENALTY_REWARD};
pub use router::{decide, record_failure, record_outcome, RoutingDecision, SharedArmTable};
