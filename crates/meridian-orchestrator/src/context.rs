//! Shared-context contract: a mission carries a typed context
//! dict (transcript, metadata, prior stage outputs). Before invoking any
//! agent/LLM stage, the orchestrator must populate that stage's tool
//! wrappers with the subset of context they need; failing to populate is
//! a hard fail for that stage, never a silent empty-input continuation.

use dashmap::DashMap;
use meridian_tenant::TenantContext;
use serde_json::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    #[error("stage {stage} requires context key(s) {missing:?} which were never populated")]
    MissingKeys { stage: String, missing: Vec<String> },
}

/// The mission's shared context: transcript, metadata, and every prior
/// stage's output, addressable by key. Cheap to clone (internally an
/// `Arc`-backed map) so every stage can hold a handle to it.
#[derive(Clone)]
pub struct MissionContext {
    pub mission_id: String,
    pub tenant: TenantContext,
    values: std::sync::Arc<DashMap<String, Value>>,
}

impl MissionContext {
    pub fn new(mission_id: impl Into<String>, tenant: TenantContext) -> Self {
        Self {
            mission_id: mission_id.into(),
            tenant,
            values: std::sync::Arc::new(DashMap::new()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Validates that every key a stage declared as required is present
    /// and returns the populated subset (the "tool wrapper" input) — or a
    /// [`ContextError`] naming what's missing ( "failing to
    /// populate = hard fail for that stage").
    pub fn populate(&self, stage: &str, required_keys: &[&'static str]) -> Result<Vec<(String, Value)>, ContextError> {
        let mut populated = Vec::with_capacity(required_keys.len());
        let mut missing = Vec::new();
        for key in required_keys {
            match self.get(key) {
                Some(value) => populated.push((key.to_string(), value)),
                None => missing.push(key.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(ContextError::MissingKeys {
                stage: stage.to_string(),
                missing,
            });
        }
        Ok(populated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MissionContext {
        MissionContext::new("m1", TenantContext::new("t1", "w1"))
    }

    #[test]
    fn populate_succeeds_when_all_keys_present() {
        let ctx = ctx();
        ctx.set("transcript", Value::String("hello".to_string()));
        let populated = ctx.populate("synth", &["transcript"]).expect("populated");
        assert_eq!(populated.len(), 1);
    }

    #[test]
    fn populate_fails_on_missing_keys() {
        let ctx = ctx();
        let err = ctx.populate("synth", &["transcript", "topics"]).unwrap_err();
        match err {
            ContextError::MissingKeys { missing, .. } => {
                assert_eq!(missing, vec!["transcript".to_string(), "topics".to_string()]);
            }
        }
    }
}
