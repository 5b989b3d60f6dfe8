//! Experiment harness: stable-hash traffic split between a
//! control and a candidate policy, shadow (dry-run) execution, and a
//! bakeoff report comparing reward distributions per arm/policy.
//!
//! The statistical-comparison shape generalizes a two-variant A/B test
//! runner to N-arm bandit comparison (see DESIGN.md).

use sha2::{Digest, Sha256};

/// Stable hash of `(tenant, request_id)` mapped into `[0, 1)`, used to
/// deterministically bucket a request into control or candidate.
pub fn traffic_split_fraction(tenant: &str, request_id: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(tenant.as_bytes());
    hasher.update(b"\0");
    hasher.update(request_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(bytes);
    value as f64 / u64::MAX as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    Control,
    Candidate,
}

/// Assigns a request to control or candidate by stable hash, with
/// `candidate_fraction` of traffic going to the candidate.
pub fn assign(tenant: &str, request_id: &str, candidate_fraction: f64) -> Arm {
    if traffic_split_fraction(tenant, request_id) < candidate_fraction {
        Arm::Candidate
    } else {
        Arm::Control
    }
}

/// A shadow-mode decision: the candidate policy's choice was computed but
/// not used to serve the request ( "shadow mode runs candidate
/// offline... records hypothetical reward for later comparison").
#[derive(Debug, Clone)]
pub struct ShadowRecord {
    pub arm_id: String,
    pub hypothetical_reward: f64,
}

#[derive(Debug, Clone)]
pub struct RewardSample {
    pub policy: String,
    pub reward: f64,
}

#[derive(Debug, Clone)]
pub struct ArmSummary {
    pub policy: String,
    pub mean: f64,
    pub variance: f64,
    pub n: usize,
    /// 95% confidence interval half-width around `mean`, Welch-style
    /// (no statistics crate in the dependency stack for this, see DESIGN.md).
    pub confidence_interval: f64,
}

#[derive(Debug, Clone)]
pub struct BakeoffReport {
    pub summaries: Vec<ArmSummary>,
}

fn mean_and_variance(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / n;
    let variance = if n > 1.0 {
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, variance)
}

/// Builds a bakeoff report: mean, variance, 95% CI per policy, grouping
/// `samples` by `policy`.
pub fn bakeoff(samples: &[RewardSample]) -> BakeoffReport {
    let mut policies: Vec<String> = samples.iter().map(|s| s.policy.clone()).collect();
    policies.sort();
    policies.dedup();

    let summaries = policies
        .into_iter()
        .map(|policy| {
            let values: Vec<f64> = samples
                .iter()
                .filter(|s| s.policy == policy)
                .map(|s| s.reward)
                .collect();
            let (mean, variance) = mean_and_variance(&values);
            let n = values.len();
            // 1.96 * standard error, the usual 95% normal-approximation CI.
            let confidence_interval = if n > 0 {
                1.96 * (variance / n as f64).sqrt()
            } else {
                0.0
            };
            ArmSummary {
                policy,
                mean,
                variance,
                n,
                confidence_interval,
            }
        })
        .collect();

    BakeoffReport { summaries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traffic_split_is_deterministic() {
        let a = traffic_split_fraction("t1", "req-1");
        let b = traffic_split_fraction("t1", "req-1");
        assert_eq!(a, b);
        let c = traffic_split_fraction("t1", "req-2");
        assert_ne!(a, c);
    }

    #[test]
    fn assign_respects_fraction_extremes() {
        assert_eq!(assign("t1", "req-1", 0.0), Arm::Control);
        assert_eq!(assign("t1", "req-1", 1.0), Arm::Candidate);
    }

    #[test]
    fn bakeoff_groups_by_policy() {
        let samples = vec![
            RewardSample { policy: "control".to_string(), reward: 0.5 },
            RewardSample { policy: "control".to_string(), reward: 0.7 },
            RewardSample { policy: "candidate".to_string(), reward: 0.9 },
        ];
        let report = bakeoff(&samples);
        assert_eq!(report.summaries.len(), 2);
        let control = report.summaries.iter().find(|s| s.policy == "control").unwrap();
        assert!((control.mean - 0.6).abs() < 1e-9);
    }
}
