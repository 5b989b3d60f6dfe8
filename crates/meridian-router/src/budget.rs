//! `BudgetState` and the preflight check: budget exactly equals
//! estimated cost -> call allowed; budget less than cost by 1 token ->
//! budget_exceeded.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use meridian_core::ErrorKind;

#[derive(Debug, Clone)]
pub struct BudgetState {
    pub tenant: String,
    pub workspace: String,
    pub window_start: DateTime<Utc>,
    pub spent_tokens: u64,
    pub spent_usd: f64,
    pub hard_cap_usd: f64,
}

impl BudgetState {
    pub fn new(tenant: impl Into<String>, workspace: impl Into<String>, hard_cap_usd: f64) -> Self {
        Self {
            tenant: tenant.into(),
            workspace: workspace.into(),
            window_start: Utc::now(),
            spent_tokens: 0,
            spent_usd: 0.0,
            hard_cap_usd,
        }
    }

    pub fn remaining_usd(&self) -> f64 {
        (self.hard_cap_usd - self.spent_usd).max(0.0)
    }

    /// Preflight check: `estimated_cost <= remaining` passes, strictly
    /// greater fails.
    pub fn preflight(&self, estimated_cost_usd: f64) -> Result<(), ErrorKind> {
        if estimated_cost_usd <= self.remaining_usd() {
            Ok(())
        } else {
            Err(ErrorKind::BudgetExceeded)
        }
    }

    pub fn record_spend(&mut self, tokens: u64, cost_usd: f64) {
        self.spent_tokens += tokens;
        self.spent_usd += cost_usd;
    }
}

/// Per-`(tenant, workspace)` budget tracker: the remaining hard cap
/// for the tenant window.
#[derive(Default)]
pub struct BudgetRegistry {
    states: DashMap<(String, String), BudgetState>,
}

impl BudgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, tenant: &str, workspace: &str, hard_cap_usd: f64) -> BudgetState {
        self.states
            .entry((tenant.to_string(), workspace.to_string()))
            .or_insert_with(|| BudgetState::new(tenant, workspace, hard_cap_usd))
            .clone()
    }

    pub fn record_spend(&self, tenant: &str, workspace: &str, tokens: u64, cost_usd: f64) {
        if let Some(mut entry) = self.states.get_mut(&(tenant.to_string(), workspace.to_string())) {
            entry.record_spend(tokens, cost_usd);
        }
    }
}
