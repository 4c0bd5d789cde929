use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use vigil_types::{TokenAmount, BPS_DENOMINATOR, DAY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Seconds after verification during which an appeal may be raised
    pub dispute_window: u64,
    pub min_dispute_bond: TokenAmount,
    /// Worker's share of the payout; the rest goes to the verifier reward pool
    pub worker_share_bps: u32,
    pub max_summary_len: usize,
    pub max_evidence_entries: usize,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            dispute_window: 7 * DAY,
            min_dispute_bond: TokenAmount::from_tokens(10),
            worker_share_bps: 8_000, // 80/20
            max_summary_len: 512,
            max_evidence_entries: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitteeConfig {
    pub min_stake: TokenAmount,
    pub min_eligible: usize,
    /// Panel size, 3 to 5
    pub panel_size: usize,
    pub min_reputation: u8,
    pub voting_period: u64,
    /// Paid per vote, scaled by task weight / 100
    pub reward_per_vote: TokenAmount,
    pub slash_bps: u32,
    pub reentry_reputation: u8,
}

impl Default for CommitteeConfig {
    fn default() -> Self {
        Self {
            min_stake: TokenAmount::from_tokens(100),
            min_eligible: 3,
            panel_size: 3,
            min_reputation: 50,
            voting_period: 3 * DAY,
            reward_per_vote: TokenAmount::from_tokens(5),
            slash_bps: 5_000, // 50% of stake
            reentry_reputation: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    pub min_stake: TokenAmount,
    pub min_eligible: usize,
    pub panel_size: usize,
    pub min_reputation: u8,
    pub commit_period: u64,
    pub reveal_period: u64,
    pub reward_per_majority_vote: TokenAmount,
    pub max_justification_len: usize,
    pub reentry_reputation: u8,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            min_stake: TokenAmount::from_tokens(500), // court of last resort
            min_eligible: 3,
            panel_size: 3,
            min_reputation: 60,
            commit_period: 2 * DAY,
            reveal_period: 2 * DAY,
            reward_per_majority_vote: TokenAmount::from_tokens(10),
            max_justification_len: 1_024,
            reentry_reputation: 50,
        }
    }
}

/// How `auto_assign_worker` picks among eligible workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Rotate through workers in registration order
    RoundRobin,
    /// Largest stake first, earliest registration on ties
    HighestStake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub min_payout: TokenAmount,
    pub min_duration: u64,
    pub max_duration: u64,
    pub platform_fee_bps: u32,
    pub min_worker_stake: TokenAmount,
    pub worker_slash_bps: u32,
    pub selection_policy: SelectionPolicy,
    pub reentry_reputation: u8,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            min_payout: TokenAmount::from_tokens(10),
            min_duration: DAY,
            max_duration: 90 * DAY,
            platform_fee_bps: 250, // 2.5%
            min_worker_stake: TokenAmount::from_tokens(50),
            worker_slash_bps: 5_000,
            selection_policy: SelectionPolicy::RoundRobin,
            reentry_reputation: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub escrow: EscrowConfig,
    pub committee: CommitteeConfig,
    pub arbitration: ArbitrationConfig,
    pub factory: FactoryConfig,
}

fn check(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ProtocolError::InvalidConfiguration(message.into()))
    }
}

fn check_bps(value: u32, name: &str) -> Result<()> {
    check(
        value as u128 <= BPS_DENOMINATOR,
        format!("{} must be at most {} bps", name, BPS_DENOMINATOR),
    )
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        let e = &self.escrow;
        check(e.dispute_window > 0, "escrow.dispute_window must be positive")?;
        check_bps(e.worker_share_bps, "escrow.worker_share_bps")?;
        check(e.max_evidence_entries > 0, "escrow.max_evidence_entries must be positive")?;

        let c = &self.committee;
        check(
            (3..=5).contains(&c.panel_size),
            "committee.panel_size must be between 3 and 5",
        )?;
        check(c.min_eligible >= 3, "committee.min_eligible must be at least 3")?;
        check(c.voting_period > 0, "committee.voting_period must be positive")?;
        check(c.min_reputation <= 100, "committee.min_reputation must be at most 100")?;
        check(c.reentry_reputation <= 100, "committee.reentry_reputation must be at most 100")?;
        check_bps(c.slash_bps, "committee.slash_bps")?;

        let a = &self.arbitration;
        check(
            (3..=5).contains(&a.panel_size),
            "arbitration.panel_size must be between 3 and 5",
        )?;
        check(a.min_eligible >= 3, "arbitration.min_eligible must be at least 3")?;
        check(
            a.commit_period > 0 && a.reveal_period > 0,
            "arbitration phases must have positive length",
        )?;
        check(a.min_reputation <= 100, "arbitration.min_reputation must be at most 100")?;
        check(a.reentry_reputation <= 100, "arbitration.reentry_reputation must be at most 100")?;
        check(
            a.min_stake >= c.min_stake,
            "arbitration.min_stake must not be below committee.min_stake",
        )?;

        let f = &self.factory;
        check(
            f.min_duration > 0 && f.min_duration <= f.max_duration,
            "factory duration bounds are inconsistent",
        )?;
        check(!f.min_payout.is_zero(), "factory.min_payout must be positive")?;
        check_bps(f.platform_fee_bps, "factory.platform_fee_bps")?;
        check_bps(f.worker_slash_bps, "factory.worker_slash_bps")?;
        check(f.reentry_reputation <= 100, "factory.reentry_reputation must be at most 100")?;
        Ok(())
    }
}
