//! `WatchItem`: watchlist-driven discovery state, mutated only
//! inside the scheduler tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The RL pacing arm currently governing this watch's poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingArm {
    Fast,
    Normal,
    Slow,
}

impl PacingArm {
    pub fn arm_id(self) -> &'static str {
        match self {
            PacingArm::Fast => "fast",
            PacingArm::Normal => "normal",
            PacingArm::Slow => "slow",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "fast" => PacingArm::Fast,
            "slow" => PacingArm::Slow,
            _ => PacingArm::Normal,
        }
    }

    /// Default interval in seconds for each pacing arm; tunable in a real
    /// deployment but given sane fixed defaults here ( posture on
    /// tunables that aren't contracts).
    pub fn interval_s(self) -> i64 {
        match self {
            PacingArm::Fast => 30,
            PacingArm::Normal => 300,
            PacingArm::Slow => 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchItem {
    pub tenant: String,
    pub workspace: String,
    pub source_kind: String,
    pub handle: String,
    pub last_seen_external_id: Option<String>,
    pub poll_interval_s: i64,
    pub next_poll_at: DateTime<Utc>,
    pub rl_state: PacingArm,
}

impl WatchItem {
    pub fn new(
        tenant: impl Into<String>,
        workspace: impl Into<String>,
        source_kind: impl Into<String>,
        handle: impl Into<String>,
    ) -> Self {
        let arm = PacingArm::Normal;
        Self {
            tenant: tenant.into(),
            workspace: workspace.into(),
            source_kind: source_kind.into(),
            handle: handle.into(),
            last_seen_external_id: None,
            poll_interval_s: arm.interval_s(),
            next_poll_at: Utc::now(),
            rl_state: arm,
        }
    }

    /// The durable row's identity key (tenant, workspace, source_kind,
    /// handle) — unique per watchlist entry.
    pub fn key(&self) -> (String, String, String, String) {
        (
            self.tenant.clone(),
            self.workspace.clone(),
            self.source_kind.clone(),
            self.handle.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_arm_round_trips_through_string() {
        for arm in [PacingArm::Fast, PacingArm::Normal, PacingArm::Slow] {
            assert_eq!(PacingArm::parse(arm.arm_id()), arm);
        }
    }

    #[test]
    fn new_watch_item_defaults_to_normal_pacing() {
        let item = WatchItem::new("t1", "w1", "youtube", "@channel");
        assert_eq!(item.rl_state, PacingArm::Normal);
        assert_eq!(item.poll_interval_s, 300);
    }
}
