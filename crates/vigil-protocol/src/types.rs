use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_types::{
    AccountAddress, SubjectCommitment, TargetEntityId, TaskId, Timestamp, TokenAmount,
};

/// Task lifecycle.
///
/// `Created → Requested → Responded → Verified → [Disputed] → {Completed,
/// Failed, Refunded}`. A disputed task goes back to `Verified` when the
/// committee decision stands, or to `Failed` when it is overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Created,
    Requested,
    Responded,
    Verified,
    Disputed,
    Completed,
    Failed,
    Refunded,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }

    /// Before the committee has verified the task.
    pub fn is_pre_verification(&self) -> bool {
        matches!(self, Self::Created | Self::Requested | Self::Responded)
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        use TaskState::*;
        match (self, next) {
            (Created, Requested) => true,
            (Requested, Responded) => true,
            (Responded, Verified) => true,
            (Verified, Disputed) => true,
            (Verified, Completed) => true,

            // Dispute outcomes
            (Disputed, Verified) => true,
            (Disputed, Failed) => true,

            (Created | Requested | Responded, Failed) => true,
            (Created | Requested | Responded, Refunded) => true,
            (Failed, Refunded) => true,

            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantRole {
    Worker,
    Verifier,
    Arbitrator,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Verifier => "verifier",
            Self::Arbitrator => "arbitrator",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque pointer to off-protocol evidence. Stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub reference: String,
    pub summary: String,
    pub submitter: AccountAddress,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNote {
    pub state: TaskState,
    pub summary: String,
    pub at: Timestamp,
}

/// Read-only projection of a task, shared across component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub target: TargetEntityId,
    pub subject: SubjectCommitment,
    pub requester: AccountAddress,
    pub worker: Option<AccountAddress>,
    pub payout: TokenAmount,
    pub weight: u32,
    pub state: TaskState,
    pub created_at: Timestamp,
    pub deadline: Timestamp,
    pub evidence: Vec<EvidenceEntry>,
    pub progress: Vec<ProgressNote>,
    pub dispute_window_end: Option<Timestamp>,
    pub dispute_initiator: Option<AccountAddress>,
    pub dispute_bond: TokenAmount,
    pub escrowed: TokenAmount,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeDecision {
    UpholdOriginal,
    OverrideOriginal,
    Inconclusive,
}

impl DisputeDecision {
    /// Whether the committee's approval stands under this decision.
    /// `None` when the appeal reached no decision.
    pub fn approval_stands(&self) -> Option<bool> {
        match self {
            Self::UpholdOriginal => Some(true),
            Self::OverrideOriginal => Some(false),
            Self::Inconclusive => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArbitrationVote {
    Uphold,
    Override,
}

impl ArbitrationVote {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Uphold => 1,
            Self::Override => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutKind {
    WorkerShare,
    VerifierPoolShare,
    Refund,
    BondReturn,
    BondForfeit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: AccountAddress,
    pub amount: TokenAmount,
    pub kind: PayoutKind,
}

/// Funds that left a task's custody in one terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub task_id: TaskId,
    pub state: TaskState,
    pub payouts: Vec<Payout>,
    pub settled_at: Timestamp,
}

impl SettlementReceipt {
    pub fn total(&self) -> TokenAmount {
        self.payouts
            .iter()
            .fold(TokenAmount::ZERO, |acc, p| acc.saturating_add(p.amount))
    }

    pub fn amount_for(&self, kind: PayoutKind) -> TokenAmount {
        self.payouts
            .iter()
            .filter(|p| p.kind == kind)
            .fold(TokenAmount::ZERO, |acc, p| acc.saturating_add(p.amount))
    }
}

/// Where a dispute bond went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondSettlement {
    pub task_id: TaskId,
    pub decision: DisputeDecision,
    pub payout: Payout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashRecord {
    pub role: ParticipantRole,
    pub account: AccountAddress,
    pub amount: TokenAmount,
    pub remaining_stake: TokenAmount,
    pub reason: String,
}

/// Serde for 32-byte digests as hex strings.
pub(crate) mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map_err(serde::de::Error::custom)?
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Refunded.is_terminal());

        // Failed still holds funds until refunded
        assert!(!TaskState::Failed.is_terminal());
        assert!(!TaskState::Verified.is_terminal());
        assert!(!TaskState::Disputed.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        assert!(TaskState::Created.can_transition_to(&TaskState::Requested));
        assert!(TaskState::Requested.can_transition_to(&TaskState::Responded));
        assert!(TaskState::Responded.can_transition_to(&TaskState::Verified));
        assert!(TaskState::Verified.can_transition_to(&TaskState::Completed));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!TaskState::Created.can_transition_to(&TaskState::Responded));
        assert!(!TaskState::Responded.can_transition_to(&TaskState::Requested));
        assert!(!TaskState::Requested.can_transition_to(&TaskState::Verified));
        assert!(!TaskState::Completed.can_transition_to(&TaskState::Refunded));
        assert!(!TaskState::Refunded.can_transition_to(&TaskState::Refunded));
    }

    #[test]
    fn test_verified_and_disputed_cannot_fail_directly() {
        assert!(!TaskState::Verified.can_transition_to(&TaskState::Failed));
        assert!(!TaskState::Verified.can_transition_to(&TaskState::Refunded));
        assert!(!TaskState::Disputed.can_transition_to(&TaskState::Refunded));
        assert!(TaskState::Disputed.can_transition_to(&TaskState::Failed));
    }

    #[test]
    fn test_dispute_decision_mapping() {
        assert_eq!(DisputeDecision::UpholdOriginal.approval_stands(), Some(true));
        assert_eq!(DisputeDecision::OverrideOriginal.approval_stands(), Some(false));
        assert_eq!(DisputeDecision::Inconclusive.approval_stands(), None);
    }
}
