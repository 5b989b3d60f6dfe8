//! Candidate set construction and filtering:
//! tenant-scoped registry -> budget preflight -> capability gate.

use std::collections::HashSet;

use crate::budget::BudgetState;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Vision,
    Tools,
    LongContext,
}

#[derive(Debug, Clone)]
pub struct ModelCandidate {
    pub arm_id: String,
    pub capabilities: HashSet<Capability>,
    pub price_per_token_usd: f64,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct RoutingRequest {
    pub estimated_tokens_in: u64,
    pub estimated_tokens_out: u64,
    pub required_capabilities: Vec<Capability>,
}

/// Builds the tenant-scoped candidate registry view: filtered to
/// capability/modality/availability before the budget/capability gates run.
pub fn available_candidates(registry: &[ModelCandidate]) -> Vec<&ModelCandidate> {
    registry.iter().filter(|c| c.available).collect()
}

/// Step 2: budget preflight. Rejects any candidate whose estimated cost
/// exceeds the tenant's remaining hard cap.
pub fn filter_by_budget<'a>(
    candidates: Vec<&'a ModelCandidate>,
    request: &RoutingRequest,
    budget: &BudgetState,
) -> Vec<&'a ModelCandidate> {
    let total_tokens = (request.estimated_tokens_in + request.estimated_tokens_out) as f64;
    candidates
        .into_iter()
        .filter(|c| {
            let estimated_cost = total_tokens * c.price_per_token_usd;
            budget.preflight(estimated_cost).is_ok()
        })
        .collect()
}

/// Step 3: capability gate. A candidate survives only if it has every
/// capability the request requires.
pub fn filter_by_capability<'a>(
    candidates: Vec<&'a ModelCandidate>,
    request: &RoutingRequest,
) -> Vec<&'a ModelCandidate> {
    candidates
        .into_iter()
        .filter(|c| {
            request
                .required_capabilities
                .iter()
                .all(|cap| c.capabilities.contains(cap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, price: f64, caps: Vec<Capability>) -> ModelCandidate {
        ModelCandidate {
            arm_id: id.to_string(),
            capabilities: caps.into_iter().collect(),
            price_per_token_usd: price,
            available: true,
        }
    }

    #[test]
    fn budget_filter_rejects_too_expensive_candidates() {
        let budget = BudgetState::new("t1", "w1", 0.01);
        let registry = vec![candidate("cheap", 0.000001, vec![]), candidate("pricey", 0.01, vec![])];
        let request = RoutingRequest {
            estimated_tokens_in: 1000,
            estimated_tokens_out: 1000,
            required_capabilities: vec![],
        };
        let survivors = filter_by_budget(available_candidates(&registry), &request, &budget);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].arm_id, "cheap");
    }

    #[test]
    fn capability_filter_requires_all_capabilities() {
        let registry = vec![
            candidate("vision_only", 0.0, vec![Capability::Vision]),
            candidate("vision_and_tools", 0.0, vec![Capability::Vision, Capability::Tools]),
        ];
        let request = RoutingRequest {
            estimated_tokens_in: 0,
            estimated_tokens_out: 0,
            required_capabilities: vec![Capability::Vision, Capability::Tools],
        };
        let survivors = filter_by_capability(available_candidates(&registry), &request);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].arm_id, "vision_and_tools");
    }

    #[test]
    fn unavailable_candidates_excluded_upfront() {
        let mut registry = vec![candidate("a", 0.0, vec![])];
        registry[0].available = false;
        assert!(available_candidates(&registry).is_empty());
    }
}
