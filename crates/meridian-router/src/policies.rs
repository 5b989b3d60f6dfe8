//! Bandit policies: epsilon-greedy, Thompson sampling (Beta or
//! Gaussian posterior), UCB1, LinUCB, LinTS. All share [`Policy`]:
//! `select(context) -> arm_id`, `update(arm_id, reward, context)`.
//!
//! Ties in `argmax` are broken by lowest arm id for reproducibility.

use parking_lot::Mutex;
use rand::Rng;
use rand_distr::{Beta, Distribution, Normal};

use crate::arm::{BanditArm, ContextModel};
use crate::linalg::{dot, quadratic_form, Matrix};

pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;
    fn select(&self, arms: &[BanditArm], context: Option<&[f64]>) -> Option<String>;
    fn update(&self, arm: &mut BanditArm, reward: f64, context: Option<&[f64]>);
}

/// Deterministic argmax with lowest-arm-id tie-break.
fn argmax_by_id<'a>(scored: impl Iterator<Item = (&'a BanditArm, f64)>) -> Option<String> {
    let mut sorted: Vec<(&BanditArm, f64)> = scored.collect();
    sorted.sort_by(|a, b| a.0.arm_id.cmp(&b.0.arm_id));
    let mut best: Option<(&BanditArm, f64)> = None;
    for candidate in sorted {
        match &best {
            Some((_, best_score)) if candidate.1 <= *best_score => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|(arm, _)| arm.arm_id.clone())
}

pub struct EpsilonGreedy {
    epsilon: Mutex<f64>,
    decay: Option<f64>,
    floor: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: Mutex::new(epsilon),
            decay: None,
            floor: 0.0,
        }
    }

    pub fn with_decay(mut self, decay: f64, floor: f64) -> Self {
        self.decay = Some(decay);
        self.floor = floor;
        self
    }
}

impl Policy for EpsilonGreedy {
    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }

    fn select(&self, arms: &[BanditArm], _context: Option<&[f64]>) -> Option<String> {
        if arms.is_empty() {
            return None;
        }
        let epsilon = *self.epsilon.lock();
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < epsilon {
            let mut sorted: Vec<&BanditArm> = arms.iter().collect();
            sorted.sort_by(|a, b| a.arm_id.cmp(&b.arm_id));
            let idx = rng.gen_range(0..sorted.len());
            return Some(sorted[idx].arm_id.clone());
        }
        argmax_by_id(arms.iter().map(|a| (a, a.mean_reward())))
    }

    fn update(&self, arm: &mut BanditArm, reward: f64, _context: Option<&[f64]>) {
        arm.record(reward);
        if let Some(decay) = self.decay {
            let mut epsilon = self.epsilon.lock();
            *epsilon = (*epsilon * decay).max(self.floor);
        }
    }
}

#[derive(Clone, Copy)]
pub enum RewardModel {
    /// Beta-Bernoulli for rewards clipped to `[0, 1]`.
    Beta,
    /// Gaussian posterior for continuous rewards.
    Gaussian,
}

pub struct ThompsonSampling {
    model: RewardModel,
}

impl ThompsonSampling {
    pub fn new(model: RewardModel) -> Self {
        Self { model }
    }
}

impl Policy for ThompsonSampling {
    fn name(&self) -> &'static str {
        "thompson"
    }

    fn select(&self, arms: &[BanditArm], _context: Option<&[f64]>) -> Option<String> {
        if arms.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let sampled: Vec<(&BanditArm, f64)> = arms
            .iter()
            .map(|arm| {
                let sample = match self.model {
                    RewardModel::Beta => {
                        let alpha = (arm.reward_sum + 1.0).max(1e-6);
                        let beta_param = ((arm.pulls as f64 - arm.reward_sum) + 1.0).max(1e-6);
                        Beta::new(alpha, beta_param)
                            .map(|d| d.sample(&mut rng))
                            .unwrap_or(0.0)
                    }
                    RewardModel::Gaussian => {
                        let mean = arm.mean_reward();
                        let std = (arm.variance() / (arm.pulls.max(1) as f64)).sqrt().max(1e-3);
                        Normal::new(mean, std).map(|d| d.sample(&mut rng)).unwrap_or(mean)
                    }
                };
                (arm, sample)
            })
            .collect();
        argmax_by_id(sampled.into_iter())
    }

    fn update(&self, arm: &mut BanditArm, reward: f64, _context: Option<&[f64]>) {
        arm.record(reward);
    }
}

pub struct Ucb1;

impl Policy for Ucb1 {
    fn name(&self) -> &'static str {
        "ucb1"
    }

    fn select(&self, arms: &[BanditArm], _context: Option<&[f64]>) -> Option<String> {
        if arms.is_empty() {
            return None;
        }
        // Unpulled arms get priority (infinite UCB) so every arm gets an
        // initial pull before the bound kicks in.
        if let Some(id) = argmax_by_id(arms.iter().filter(|a| a.pulls == 0).map(|a| (a, 0.0))) {
            return Some(id);
        }
        let total_pulls: u64 = arms.iter().map(|a| a.pulls).sum();
        let scored = arms.iter().map(|arm| {
            let bound = arm.mean_reward()
                + ((2.0 * (total_pulls as f64).ln()) / arm.pulls as f64).sqrt();
            (arm, bound)
        });
        argmax_by_id(scored)
    }

    fn update(&self, arm: &mut BanditArm, reward: f64, _context: Option<&[f64]>) {
        arm.record(reward);
    }
}

/// Shared LinUCB/LinTS ridge-regression scoring: `theta = A^-1 b`.
fn ridge_theta(model: &ContextModel) -> (Matrix, Vec<f64>) {
    let a = Matrix::from_flat(model.dimension, model.a_matrix.clone());
    let a_inv = a.inverse().unwrap_or_else(|| Matrix::identity(model.dimension));
    let theta = a_inv.mul_vec(&model.b_vector);
    (a_inv, theta)
}

pub struct LinUcb {
    alpha: f64,
}

impl LinUcb {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Policy for LinUcb {
    fn name(&self) -> &'static str {
        "linucb"
    }

    fn select(&self, arms: &[BanditArm], context: Option<&[f64]>) -> Option<String> {
        let context = context?;
        if arms.is_empty() {
            return None;
        }
        let scored = arms.iter().filter_map(|arm| {
            let model = arm.context_features.as_ref()?;
            let (a_inv, theta) = ridge_theta(model);
            let score = dot(&theta, context) + self.alpha * quadratic_form(context, &a_inv).sqrt();
            Some((arm, score))
        });
        argmax_by_id(scored)
    }

    fn update(&self, arm: &mut BanditArm, reward: f64, context: Option<&[f64]>) {
        arm.record(reward);
        if let (Some(model), Some(context)) = (arm.context_features.as_mut(), context) {
            let mut a = Matrix::from_flat(model.dimension, model.a_matrix.clone());
            a.add_outer_product(context);
            model.a_matrix = a.data;
            for (b, x) in model.b_vector.iter_mut().zip(context.iter()) {
                *b += reward * x;
            }
        }
    }
}

pub struct LinTs {
    alpha: f64,
}

impl LinTs {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Policy for LinTs {
    fn name(&self) -> &'static str {
        "lints"
    }

    fn select(&self, arms: &[BanditArm], context: Option<&[f64]>) -> Option<String> {
        let context = context?;
        if arms.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let scored: Vec<(&BanditArm, f64)> = arms
            .iter()
            .filter_map(|arm| {
                let model = arm.context_features.as_ref()?;
                let (a_inv, theta) = ridge_theta(model);
                let sampled_theta: Vec<f64> = theta
                    .iter()
                    .enumerate()
                    .map(|(i, &mean)| {
                        let variance = (self.alpha * self.alpha * a_inv.get(i, i)).max(1e-9);
                        Normal::new(mean, variance.sqrt())
                            .map(|d| d.sample(&mut rng))
                            .unwrap_or(mean)
                    })
                    .collect();
                Some((arm, dot(&sampled_theta, context)))
            })
            .collect();
        argmax_by_id(scored.into_iter())
    }

    fn update(&self, arm: &mut BanditArm, reward: f64, context: Option<&[f64]>) {
        arm.record(reward);
        if let (Some(model), Some(context)) = (arm.context_features.as_mut(), context) {
            let mut a = Matrix::from_flat(model.dimension, model.a_matrix.clone());
            a.add_outer_product(context);
            model.a_matrix = a.data;
            for (b, x) in model.b_vector.iter_mut().zip(context.iter()) {
                *b += reward * x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arms(ids: &[&str]) -> Vec<BanditArm> {
        ids.iter().map(|id| BanditArm::new(*id)).collect()
    }

    #[test]
    fn epsilon_greedy_exploits_best_mean_with_zero_epsilon() {
        let policy = EpsilonGreedy::new(0.0);
        let mut arms = arms(&["a", "b"]);
        arms[0].record(0.2);
        arms[1].record(0.9);
        assert_eq!(policy.select(&arms, None), Some("b".to_string()));
    }

    #[test]
    fn ties_break_on_lowest_arm_id() {
        let policy = Ucb1;
        let mut arms = arms(&["z", "a"]);
        arms[0].record(0.5);
        arms[0].record(0.5);
        arms[1].record(0.5);
        arms[1].record(0.5);
        // Both arms have identical pulls/mean; deterministic tie-break
        // picks the lowest arm id.
        assert_eq!(policy.select(&arms, None), Some("a".to_string()));
    }

    #[test]
    fn ucb1_prioritizes_unpulled_arms() {
        let policy = Ucb1;
        let mut arms = arms(&["a", "b"]);
        arms[0].record(0.9);
        arms[0].record(0.9);
        // "b" has zero pulls; must be picked first regardless of "a"'s mean.
        assert_eq!(policy.select(&arms, None), Some("b".to_string()));
    }

    #[test]
    fn linucb_requires_context() {
        let policy = LinUcb::new(1.0);
        let arms = vec![BanditArm::new("a").with_context_model(2)];
        assert!(policy.select(&arms, None).is_none());
        assert!(policy.select(&arms, Some(&[1.0, 0.0])).is_some());
    }

    #[test]
    fn linucb_update_shifts_theta_toward_rewarded_context() {
        let policy = LinUcb::new(0.1);
        let mut arm = BanditArm::new("a").with_context_model(2);
        for _ in 0..20 {
            policy.update(&mut arm, 1.0, Some(&[1.0, 0.0]));
        }
        let (_, theta) = ridge_theta(arm.context_features.as_ref().unwrap());
        assert!(theta[0] > theta[1]);
    }
}
