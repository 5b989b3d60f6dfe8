//! Quality gates: after each stage, a quality assessor scores
//! content-substance + evidence-grounding + reasoning + UX heuristics. If
//! the score is below threshold, the orchestrator retries with a
//! stronger router policy, degrades and continues with a warning, or
//! short-circuits the mission — the action is policy-per-depth.

use serde_json::Value;

use crate::types::MissionDepth;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScore {
    pub content_substance: f64,
    pub evidence_grounding: f64,
    pub reasoning: f64,
    pub ux: f64,
}

impl QualityScore {
    /// Equal-weighted composite in `[0, 1]`. The four heuristics'
    /// combination is policy, not a fixed contract (same stance as the
    /// router's reward weights) — equal weighting is the sane default
    /// absent a stated preference.
    pub fn composite(&self) -> f64 {
        (self.content_substance + self.evidence_grounding + self.reasoning + self.ux) / 4.0
    }
}

pub trait QualityAssessor: Send + Sync {
    fn assess(&self, stage_output: &Value) -> QualityScore;
}

/// Cheap structural heuristic: substance from output size, grounding from
/// presence of a `citations` array, reasoning from a `policy_trace`/
/// `reasoning` field, UX from the output simply being well-formed JSON
/// (always true here, but keeps the four-heuristic shape names
/// an implementer's swap-in point for a stronger assessor).
pub struct HeuristicQualityAssessor;

impl QualityAssessor for HeuristicQualityAssessor {
    fn assess(&self, stage_output: &Value) -> QualityScore {
        let content_substance = match stage_output {
            Value::String(s) => (s.len() as f64 / 200.0).min(1.0),
            Value::Object(map) => (map.len() as f64 / 6.0).min(1.0),
            Value::Array(items) => (items.len() as f64 / 6.0).min(1.0),
            Value::Null => 0.0,
            _ => 0.5,
        };
        let evidence_grounding = stage_output
            .get("citations")
            .and_then(|c| c.as_array())
            .map(|c| if c.is_empty() { 0.0 } else { 1.0 })
            .unwrap_or(0.5);
        let reasoning = stage_output
            .get("policy_trace")
            .or_else(|| stage_output.get("reasoning"))
            .map(|_| 1.0)
            .unwrap_or(0.5);
        let ux = 1.0;

        QualityScore {
            content_substance,
            evidence_grounding,
            reasoning,
            ux,
        }
    }
}

/// What the orchestrator does when a stage's composite score falls below
/// [`GatePolicy::threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Re-run the stage once with a stronger router policy.
    RetryWithStrongerPolicy,
    /// Continue the mission, recording a warning on the result.
    DegradeAndContinue,
    /// Abort the mission now with `ShortCircuited`.
    ShortCircuit,
}

#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    pub threshold: f64,
    pub action: GateAction,
}

impl GatePolicy {
    /// Default per-depth gate policy.
    /// Shallower missions degrade rather than retry (a standard mission
    /// is meant to be cheap); deeper missions retry before giving up, and
    /// the deepest (experimental) short-circuits rather than silently
    /// shipping a low-quality result from a mission meant to explore.
    pub fn for_depth(depth: MissionDepth) -> Self {
        match depth {
            MissionDepth::Standard => GatePolicy {
                threshold: 0.4,
                action: GateAction::DegradeAndContinue,
            },
            MissionDepth::Deep => GatePolicy {
                threshold: 0.5,
                action: GateAction::RetryWithStrongerPolicy,
            },
            MissionDepth::Comprehensive => GatePolicy {
                threshold: 0.6,
                action: GateAction::RetryWithStrongerPolicy,
            },
            MissionDepth::Experimental => GatePolicy {
                threshold: 0.65,
                action: GateAction::ShortCircuit,
            },
        }
    }

    pub fn passes(&self, score: QualityScore) -> bool {
        score.composite() >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_output_scores_low_substance() {
        let assessor = HeuristicQualityAssessor;
        let score = assessor.assess(&Value::Null);
        assert_eq!(score.content_substance, 0.0);
    }

    #[test]
    fn output_with_citations_scores_full_grounding() {
        let assessor = HeuristicQualityAssessor;
        let score = assessor.assess(&json!({"citations": ["a", "b"]}));
        assert_eq!(score.evidence_grounding, 1.0);
    }

    #[test]
    fn standard_depth_degrades_on_low_score() {
        let policy = GatePolicy::for_depth(MissionDepth::Standard);
        assert_eq!(policy.action, GateAction::DegradeAndContinue);
        let low = QualityScore {
            content_substance: 0.0,
            evidence_grounding: 0.0,
            reasoning: 0.0,
            ux: 0.0,
        };
        assert!(!policy.passes(low));
    }

    #[test]
    fn experimental_depth_short_circuits() {
        let policy = GatePolicy::for_depth(MissionDepth::Experimental);
        assert_eq!(policy.action, GateAction::ShortCircuit);
    }
}
