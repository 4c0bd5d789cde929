use crate::commitment::{vote_commitment, Salt};
use crate::config::ArbitrationConfig;
use crate::error::{ProtocolError, Result};
use crate::events::{EventBus, ProtocolEvent};
use crate::gates::{DisputeGate, PanelAccountability, TaskDirectory, WorkerAccountability};
use crate::roster::{RosterMember, RosterStats, StakedRoster};
use crate::types::{
    ArbitrationVote, BondSettlement, DisputeDecision, ParticipantRole, PayoutKind, SlashRecord,
    TaskState,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use vigil_beacon::{select_panel, PanelDraw, RandomnessSource};
use vigil_ledger::Ledger;
use vigil_types::{AccountAddress, DisputeId, IdAllocator, TaskId, Timestamp, TokenAmount};

pub const ARBITRATOR_PANEL_DOMAIN: &str = "arbitrator-panel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputePhase {
    Commit,
    Reveal,
    /// Decided; bond, penalties or rewards still being applied
    Settling,
    Resolved,
}

/// An arbitrator's vote: a commitment until revealed, then the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ballot {
    Committed {
        #[serde(with = "crate::types::hex32")]
        commitment: [u8; 32],
        committed_at: Timestamp,
    },
    Revealed {
        vote: ArbitrationVote,
        justification: String,
        revealed_at: Timestamp,
    },
}

impl Ballot {
    pub fn revealed_vote(&self) -> Option<ArbitrationVote> {
        match self {
            Self::Revealed { vote, .. } => Some(*vote),
            Self::Committed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeView {
    pub dispute_id: DisputeId,
    pub task_id: TaskId,
    pub initiator: AccountAddress,
    pub reason: String,
    pub bond: TokenAmount,
    pub draw: PanelDraw,
    pub ballots: BTreeMap<AccountAddress, Ballot>,
    pub uphold_votes: usize,
    pub override_votes: usize,
    pub phase: DisputePhase,
    pub decision: Option<DisputeDecision>,
    pub created_at: Timestamp,
    pub commit_deadline: Timestamp,
    pub reveal_deadline: Timestamp,
    pub bond_settlement: Option<BondSettlement>,
    pub bond_returned: bool,
    pub worker_penalty_done: bool,
    /// Set when an override slashed the task's worker
    pub worker_slash: Option<SlashRecord>,
    pub accountability_done: bool,
    pub slashed_verifiers: Vec<SlashRecord>,
    pub rewards_paid: bool,
    pub rewards: Vec<(AccountAddress, TokenAmount)>,
    pub unpaid_rewards: TokenAmount,
    pub resolved_at: Option<Timestamp>,
}

impl DisputeView {
    pub fn panel(&self) -> &[AccountAddress] {
        &self.draw.members
    }

    pub fn committed_count(&self) -> usize {
        self.ballots.len()
    }

    pub fn revealed_count(&self) -> usize {
        self.uphold_votes + self.override_votes
    }

    /// Majority of reveals. Ties and zero reveals are inconclusive.
    pub fn tally_decision(&self) -> DisputeDecision {
        use std::cmp::Ordering;
        match self.override_votes.cmp(&self.uphold_votes) {
            Ordering::Greater => DisputeDecision::OverrideOriginal,
            Ordering::Less => DisputeDecision::UpholdOriginal,
            Ordering::Equal => DisputeDecision::Inconclusive,
        }
    }

    /// The commit phase ends at its deadline even if not everyone committed.
    fn refresh_phase(&mut self, now: Timestamp) {
        if self.phase == DisputePhase::Commit && now >= self.commit_deadline {
            self.phase = DisputePhase::Reveal;
        }
    }

    fn begin_settling(&mut self) {
        self.phase = DisputePhase::Settling;
        self.decision = Some(self.tally_decision());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub dispute_id: DisputeId,
    pub task_id: TaskId,
    pub decision: DisputeDecision,
    pub bond: Option<BondSettlement>,
    pub worker_slash: Option<SlashRecord>,
    pub slashed_verifiers: Vec<SlashRecord>,
    pub rewards: Vec<(AccountAddress, TokenAmount)>,
    pub unpaid_rewards: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealReceipt {
    pub dispute_id: DisputeId,
    pub arbitrator: AccountAddress,
    pub vote: ArbitrationVote,
    /// Set when this reveal was the last one and the dispute settled
    pub resolution: Option<DisputeResolution>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArbitrationStats {
    pub arbitrators: RosterStats,
    pub disputes: usize,
    pub open: usize,
    pub upheld: usize,
    pub overridden: usize,
    pub inconclusive: usize,
    pub bonds_returned: usize,
    pub bonds_forfeited: usize,
    pub pool_balance: TokenAmount,
}

/// Staked arbitrators deciding appeals with a commit-reveal vote.
pub struct DisputeArbitration {
    config: ArbitrationConfig,
    roster: StakedRoster,
    disputes: Arc<RwLock<HashMap<DisputeId, Arc<Mutex<DisputeView>>>>>,
    by_task: Arc<RwLock<HashMap<TaskId, DisputeId>>>,
    ids: IdAllocator<DisputeId>,
    escrow: Arc<dyn DisputeGate>,
    committee: Arc<dyn PanelAccountability>,
    workers: Arc<dyn WorkerAccountability>,
    beacon: Arc<dyn RandomnessSource>,
    ledger: Arc<dyn Ledger>,
    pool: AccountAddress,
    operator: AccountAddress,
    events: EventBus,
}

impl DisputeArbitration {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ArbitrationConfig,
        escrow: Arc<dyn DisputeGate>,
        committee: Arc<dyn PanelAccountability>,
        workers: Arc<dyn WorkerAccountability>,
        beacon: Arc<dyn RandomnessSource>,
        ledger: Arc<dyn Ledger>,
        pool: AccountAddress,
        stake_vault: AccountAddress,
        operator: AccountAddress,
        events: EventBus,
    ) -> Self {
        let roster = StakedRoster::new(
            ParticipantRole::Arbitrator,
            config.min_stake,
            config.reentry_reputation,
            stake_vault,
            operator,
            ledger.clone(),
            events.clone(),
        );
        Self {
            config,
            roster,
            disputes: Arc::new(RwLock::new(HashMap::new())),
            by_task: Arc::new(RwLock::new(HashMap::new())),
            ids: IdAllocator::new(),
            escrow,
            committee,
            workers,
            beacon,
            ledger,
            pool,
            operator,
            events,
        }
    }

    pub fn pool(&self) -> AccountAddress {
        self.pool
    }

    pub async fn register_arbitrator(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        description: &str,
        now: Timestamp,
    ) -> Result<RosterMember> {
        self.roster.register(account, stake, description, now).await
    }

    pub async fn reregister_arbitrator(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
        now: Timestamp,
    ) -> Result<RosterMember> {
        self.roster.reregister(account, top_up, now).await
    }

    pub async fn fund_pool(&self, funder: AccountAddress, amount: TokenAmount) -> Result<()> {
        self.ledger
            .transfer_from(self.operator, funder, self.pool, amount)
            .await?;
        info!(funder = %funder, amount = %amount, "💰 Arbitration pool funded");
        Ok(())
    }

    async fn lock(&self, dispute_id: DisputeId) -> Result<OwnedMutexGuard<DisputeView>> {
        let entry = self
            .disputes
            .read()
            .await
            .get(&dispute_id)
            .cloned()
            .ok_or(ProtocolError::DisputeNotFound(dispute_id))?;
        entry
            .try_lock_owned()
            .map_err(|_| ProtocolError::ResourceBusy(dispute_id.to_string()))
    }

    /// Appeal a verified task. The panel is drawn before the bond is pulled, so
    /// a shortage of arbitrators rejects the call with no funds moved.
    pub async fn create_dispute(
        &self,
        task_id: TaskId,
        initiator: AccountAddress,
        reason: &str,
        bond: TokenAmount,
        now: Timestamp,
    ) -> Result<DisputeView> {
        let mut by_task = self.by_task.write().await;
        if by_task.contains_key(&task_id) {
            return Err(ProtocolError::DisputeAlreadyRaised(task_id));
        }

        let task = self.escrow.task_view(task_id).await?;
        if task.state != TaskState::Verified {
            return Err(ProtocolError::InvalidTaskState {
                task_id,
                expected: "Verified".to_string(),
                actual: task.state,
            });
        }

        // Verifiers who sat on the task's session never judge their own vote
        let mut exclude = vec![task.requester, initiator];
        exclude.extend(task.worker);
        exclude.extend(self.committee.panel_members(task_id).await?);
        let eligible = self
            .roster
            .eligible(self.config.min_reputation, &exclude)
            .await;
        if eligible.len() < self.config.min_eligible {
            return Err(ProtocolError::InsufficientEligible {
                role: ParticipantRole::Arbitrator,
                required: self.config.min_eligible,
                available: eligible.len(),
            });
        }
        let size = self.config.panel_size.min(eligible.len());
        let output = self
            .beacon
            .draw(ARBITRATOR_PANEL_DOMAIN, task_id.value())
            .await?;
        let draw = select_panel(
            &output,
            ARBITRATOR_PANEL_DOMAIN,
            task_id.value(),
            &eligible,
            size,
        )?;

        self.escrow
            .open_dispute(task_id, initiator, reason, bond, now)
            .await?;

        let dispute_id = self.ids.next_id();
        let commit_deadline = now.saturating_add(self.config.commit_period);
        let dispute = DisputeView {
            dispute_id,
            task_id,
            initiator,
            reason: reason.to_string(),
            bond,
            draw,
            ballots: BTreeMap::new(),
            uphold_votes: 0,
            override_votes: 0,
            phase: DisputePhase::Commit,
            decision: None,
            created_at: now,
            commit_deadline,
            reveal_deadline: commit_deadline.saturating_add(self.config.reveal_period),
            bond_settlement: None,
            bond_returned: false,
            worker_penalty_done: false,
            worker_slash: None,
            accountability_done: false,
            slashed_verifiers: Vec::new(),
            rewards_paid: false,
            rewards: Vec::new(),
            unpaid_rewards: TokenAmount::ZERO,
            resolved_at: None,
        };
        self.disputes
            .write()
            .await
            .insert(dispute_id, Arc::new(Mutex::new(dispute.clone())));
        by_task.insert(task_id, dispute_id);

        info!(
            dispute_id = %dispute_id,
            task_id = %task_id,
            initiator = %initiator,
            bond = %bond,
            panel_size = dispute.draw.members.len(),
            commit_deadline,
            "⚖️ Dispute created"
        );
        self.events.emit(ProtocolEvent::DisputeCreated {
            dispute_id,
            task_id,
            initiator,
            bond,
        });
        Ok(dispute)
    }

    pub async fn commit_vote(
        &self,
        dispute_id: DisputeId,
        arbitrator: AccountAddress,
        commitment: [u8; 32],
        now: Timestamp,
    ) -> Result<DisputeView> {
        let mut dispute = self.lock(dispute_id).await?;
        dispute.refresh_phase(now);
        if dispute.phase == DisputePhase::Resolved {
            return Err(ProtocolError::DisputeResolved(dispute_id));
        }
        if dispute.phase != DisputePhase::Commit {
            return Err(ProtocolError::WrongPhase {
                dispute_id,
                expected: DisputePhase::Commit,
                actual: dispute.phase,
            });
        }
        if !dispute.panel().contains(&arbitrator) {
            return Err(ProtocolError::NotPanelMember { account: arbitrator });
        }
        if dispute.ballots.contains_key(&arbitrator) {
            return Err(ProtocolError::AlreadyCommitted { account: arbitrator });
        }

        dispute.ballots.insert(
            arbitrator,
            Ballot::Committed {
                commitment,
                committed_at: now,
            },
        );
        debug!(
            dispute_id = %dispute_id,
            arbitrator = %arbitrator,
            committed = dispute.committed_count(),
            "Vote commitment recorded"
        );
        self.events.emit(ProtocolEvent::VoteCommitted {
            dispute_id,
            arbitrator,
        });

        if dispute.committed_count() == dispute.panel().len() {
            dispute.phase = DisputePhase::Reveal;
            dispute.reveal_deadline = now.saturating_add(self.config.reveal_period);
            info!(
                dispute_id = %dispute_id,
                reveal_deadline = dispute.reveal_deadline,
                "🔓 All arbitrators committed, reveal phase open"
            );
        }
        Ok(dispute.clone())
    }

    /// Open a commitment. A reveal that does not hash to the stored
    /// commitment is rejected and not counted.
    pub async fn reveal_vote(
        &self,
        dispute_id: DisputeId,
        arbitrator: AccountAddress,
        vote: ArbitrationVote,
        justification: &str,
        salt: &Salt,
        now: Timestamp,
    ) -> Result<RevealReceipt> {
        let mut dispute = self.lock(dispute_id).await?;
        dispute.refresh_phase(now);
        if dispute.phase == DisputePhase::Resolved {
            return Err(ProtocolError::DisputeResolved(dispute_id));
        }
        if dispute.phase != DisputePhase::Reveal {
            return Err(ProtocolError::WrongPhase {
                dispute_id,
                expected: DisputePhase::Reveal,
                actual: dispute.phase,
            });
        }
        if now >= dispute.reveal_deadline {
            return Err(ProtocolError::DeadlineExceeded {
                deadline: dispute.reveal_deadline,
                current: now,
            });
        }
        if !dispute.panel().contains(&arbitrator) {
            return Err(ProtocolError::NotPanelMember { account: arbitrator });
        }
        let stored = match dispute.ballots.get(&arbitrator) {
            None => return Err(ProtocolError::NotCommitted { account: arbitrator }),
            Some(Ballot::Revealed { .. }) => {
                return Err(ProtocolError::AlreadyRevealed { account: arbitrator })
            }
            Some(Ballot::Committed { commitment, .. }) => *commitment,
        };
        if justification.len() > self.config.max_justification_len {
            return Err(ProtocolError::InvalidInput(format!(
                "justification exceeds {} bytes",
                self.config.max_justification_len
            )));
        }
        if vote_commitment(dispute_id, arbitrator, vote, justification, salt) != stored {
            warn!(
                dispute_id = %dispute_id,
                arbitrator = %arbitrator,
                "Reveal does not match commitment"
            );
            return Err(ProtocolError::CommitmentMismatch {
                dispute_id,
                account: arbitrator,
            });
        }

        dispute.ballots.insert(
            arbitrator,
            Ballot::Revealed {
                vote,
                justification: justification.to_string(),
                revealed_at: now,
            },
        );
        match vote {
            ArbitrationVote::Uphold => dispute.uphold_votes += 1,
            ArbitrationVote::Override => dispute.override_votes += 1,
        }
        info!(
            dispute_id = %dispute_id,
            arbitrator = %arbitrator,
            vote = ?vote,
            uphold = dispute.uphold_votes,
            override_ = dispute.override_votes,
            "🗳️ Vote revealed"
        );
        self.events.emit(ProtocolEvent::VoteRevealed {
            dispute_id,
            arbitrator,
            vote,
        });

        let mut resolution = None;
        if dispute.revealed_count() == dispute.committed_count() {
            dispute.begin_settling();
            match self.settle(&mut dispute, now).await {
                Ok(r) => resolution = Some(r),
                // The reveal stands; resolve_dispute finishes the settlement
                Err(e) => warn!(
                    dispute_id = %dispute_id,
                    error = %e,
                    "Settlement deferred"
                ),
            }
        }

        Ok(RevealReceipt {
            dispute_id,
            arbitrator,
            vote,
            resolution,
        })
    }

    /// Force resolution once the reveal deadline has passed, or finish a
    /// settlement that stopped part way. Anyone may call it.
    pub async fn resolve_dispute(
        &self,
        dispute_id: DisputeId,
        now: Timestamp,
    ) -> Result<DisputeResolution> {
        let mut dispute = self.lock(dispute_id).await?;
        dispute.refresh_phase(now);
        match dispute.phase {
            DisputePhase::Resolved => return Err(ProtocolError::DisputeResolved(dispute_id)),
            DisputePhase::Commit => {
                return Err(ProtocolError::DeadlineNotReached {
                    deadline: dispute.commit_deadline,
                    current: now,
                })
            }
            DisputePhase::Reveal => {
                // Nobody committed: nothing left to wait for
                if dispute.committed_count() > 0 && now < dispute.reveal_deadline {
                    return Err(ProtocolError::DeadlineNotReached {
                        deadline: dispute.reveal_deadline,
                        current: now,
                    });
                }
                dispute.begin_settling();
            }
            DisputePhase::Settling => {}
        }
        self.settle(&mut dispute, now).await
    }

    /// Each stage runs once; a failed stage is retried by the next call.
    async fn settle(&self, dispute: &mut DisputeView, now: Timestamp) -> Result<DisputeResolution> {
        let decision = dispute.tally_decision();
        dispute.decision = Some(decision);

        if dispute.bond_settlement.is_none() {
            let settlement = self
                .escrow
                .settle_dispute(dispute.task_id, decision, now)
                .await?;
            dispute.bond_returned = settlement.payout.kind == PayoutKind::BondReturn;
            dispute.bond_settlement = Some(settlement);
        }

        if !dispute.worker_penalty_done {
            if decision == DisputeDecision::OverrideOriginal {
                dispute.worker_slash = self.workers.penalize_worker(dispute.task_id).await?;
            }
            dispute.worker_penalty_done = true;
        }

        if !dispute.accountability_done {
            let slashed = self
                .committee
                .handle_dispute_resolution(dispute.task_id, decision, now)
                .await?;
            dispute.slashed_verifiers.extend(slashed);
            dispute.accountability_done = true;
        }

        if !dispute.rewards_paid {
            self.pay_rewards(dispute, decision).await?;
            dispute.rewards_paid = true;
        }

        dispute.phase = DisputePhase::Resolved;
        dispute.resolved_at = Some(now);

        info!(
            dispute_id = %dispute.dispute_id,
            task_id = %dispute.task_id,
            decision = ?decision,
            bond_returned = dispute.bond_returned,
            verifiers_slashed = dispute.slashed_verifiers.len(),
            arbitrators_rewarded = dispute.rewards.len(),
            "🏛️ Dispute resolved"
        );
        self.events.emit(ProtocolEvent::DisputeResolved {
            dispute_id: dispute.dispute_id,
            task_id: dispute.task_id,
            decision,
        });

        Ok(DisputeResolution {
            dispute_id: dispute.dispute_id,
            task_id: dispute.task_id,
            decision,
            bond: dispute.bond_settlement.clone(),
            worker_slash: dispute.worker_slash.clone(),
            slashed_verifiers: dispute.slashed_verifiers.clone(),
            rewards: dispute.rewards.clone(),
            unpaid_rewards: dispute.unpaid_rewards,
        })
    }

    /// Reward majority voters while the pool allows and update every
    /// assignee's accuracy. Inconclusive appeals change neither.
    async fn pay_rewards(
        &self,
        dispute: &mut DisputeView,
        decision: DisputeDecision,
    ) -> Result<()> {
        let majority = match decision {
            DisputeDecision::UpholdOriginal => ArbitrationVote::Uphold,
            DisputeDecision::OverrideOriginal => ArbitrationVote::Override,
            DisputeDecision::Inconclusive => return Ok(()),
        };

        let per_vote = self.config.reward_per_majority_vote;
        let mut available = self.ledger.balance_of(self.pool).await?;
        let mut payable = Vec::new();
        let mut unpaid = TokenAmount::ZERO;
        for (arbitrator, ballot) in dispute.ballots.iter() {
            if ballot.revealed_vote() != Some(majority) {
                continue;
            }
            match available.checked_sub(per_vote) {
                Some(rest) => {
                    available = rest;
                    payable.push((*arbitrator, per_vote));
                }
                None => unpaid = unpaid.saturating_add(per_vote),
            }
        }
        if !payable.is_empty() {
            self.ledger.transfer_split(self.pool, &payable).await?;
        }
        if !unpaid.is_zero() {
            warn!(
                dispute_id = %dispute.dispute_id,
                unpaid = %unpaid,
                "Arbitration pool could not cover every reward"
            );
        }

        for member in dispute.draw.members.iter() {
            let correct = dispute
                .ballots
                .get(member)
                .and_then(Ballot::revealed_vote)
                == Some(majority);
            self.roster.record_outcome(*member, correct).await;
        }

        dispute.rewards = payable;
        dispute.unpaid_rewards = unpaid;
        Ok(())
    }

    pub async fn dispute(&self, dispute_id: DisputeId) -> Result<DisputeView> {
        let entry = self
            .disputes
            .read()
            .await
            .get(&dispute_id)
            .cloned()
            .ok_or(ProtocolError::DisputeNotFound(dispute_id))?;
        let dispute = entry.lock().await;
        Ok(dispute.clone())
    }

    pub async fn dispute_for_task(&self, task_id: TaskId) -> Option<DisputeView> {
        let dispute_id = self.by_task.read().await.get(&task_id).copied()?;
        self.dispute(dispute_id).await.ok()
    }

    pub async fn arbitrator(&self, account: AccountAddress) -> Option<RosterMember> {
        self.roster.member(account).await
    }

    pub async fn arbitrators(&self) -> Vec<RosterMember> {
        self.roster.members().await
    }

    pub async fn get_stats(&self) -> ArbitrationStats {
        let entries: Vec<Arc<Mutex<DisputeView>>> =
            self.disputes.read().await.values().cloned().collect();
        let mut stats = ArbitrationStats {
            arbitrators: self.roster.get_stats().await,
            disputes: entries.len(),
            pool_balance: self
                .ledger
                .balance_of(self.pool)
                .await
                .unwrap_or(TokenAmount::ZERO),
            ..Default::default()
        };
        for entry in entries {
            let dispute = entry.lock().await;
            if dispute.phase != DisputePhase::Resolved {
                stats.open += 1;
                continue;
            }
            match dispute.decision {
                Some(DisputeDecision::UpholdOriginal) => stats.upheld += 1,
                Some(DisputeDecision::OverrideOriginal) => stats.overridden += 1,
                Some(DisputeDecision::Inconclusive) | None => stats.inconclusive += 1,
            }
            if dispute.bond_returned {
                stats.bonds_returned += 1;
            } else {
                stats.bonds_forfeited += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_with(uphold: usize, override_: usize) -> DisputeView {
        DisputeView {
            dispute_id: DisputeId::new(1),
            task_id: TaskId::new(1),
            initiator: AccountAddress::from_label("requester"),
            reason: "not done".to_string(),
            bond: TokenAmount::from_tokens(50),
            draw: PanelDraw {
                members: Vec::new(),
                round: 0,
                randomness: [0u8; 32],
            },
            ballots: BTreeMap::new(),
            uphold_votes: uphold,
            override_votes: override_,
            phase: DisputePhase::Commit,
            decision: None,
            created_at: 0,
            commit_deadline: 100,
            reveal_deadline: 200,
            bond_settlement: None,
            bond_returned: false,
            worker_penalty_done: false,
            worker_slash: None,
            accountability_done: false,
            slashed_verifiers: Vec::new(),
            rewards_paid: false,
            rewards: Vec::new(),
            unpaid_rewards: TokenAmount::ZERO,
            resolved_at: None,
        }
    }

    #[test]
    fn test_tally_decision() {
        assert_eq!(view_with(1, 2).tally_decision(), DisputeDecision::OverrideOriginal);
        assert_eq!(view_with(2, 1).tally_decision(), DisputeDecision::UpholdOriginal);
        assert_eq!(view_with(1, 1).tally_decision(), DisputeDecision::Inconclusive);
        assert_eq!(view_with(0, 0).tally_decision(), DisputeDecision::Inconclusive);
    }

    #[test]
    fn test_commit_phase_closes_at_deadline() {
        let mut view = view_with(0, 0);
        view.refresh_phase(99);
        assert_eq!(view.phase, DisputePhase::Commit);
        view.refresh_phase(100);
        assert_eq!(view.phase, DisputePhase::Reveal);
    }
}
