use crate::config::CommitteeConfig;
use crate::error::{ProtocolError, Result};
use crate::events::{EventBus, ProtocolEvent};
use crate::gates::{CompletionGate, PanelAccountability, TaskDirectory};
use crate::roster::{RosterMember, RosterStats, StakedRoster};
use crate::types::{DisputeDecision, ParticipantRole, SlashRecord, TaskState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use vigil_beacon::{select_panel, PanelDraw, RandomnessSource};
use vigil_ledger::Ledger;
use vigil_types::{AccountAddress, TaskId, Timestamp, TokenAmount};

pub const VERIFIER_PANEL_DOMAIN: &str = "verifier-panel";

/// Running vote count for one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionTally {
    pub panel_size: usize,
    pub approvals: usize,
    pub rejections: usize,
}

impl SessionTally {
    pub fn new(panel_size: usize) -> Self {
        Self {
            panel_size,
            approvals: 0,
            rejections: 0,
        }
    }

    pub fn votes(&self) -> usize {
        self.approvals + self.rejections
    }

    /// Strictly more than half the panel approved. Ties are not approval.
    pub fn is_approved(&self) -> bool {
        self.approvals * 2 > self.panel_size
    }

    /// Enough rejections that the remaining votes can no longer approve.
    pub fn approval_impossible(&self) -> bool {
        self.rejections * 2 >= self.panel_size
    }

    /// The outcome once it can no longer change, or when everyone has voted.
    pub fn decided(&self) -> Option<bool> {
        if self.is_approved() {
            Some(true)
        } else if self.approval_impossible() || self.votes() >= self.panel_size {
            Some(false)
        } else {
            None
        }
    }

    pub fn with_vote(&self, approve: bool) -> Self {
        let mut next = *self;
        if approve {
            next.approvals += 1;
        } else {
            next.rejections += 1;
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Completed {
        approved: bool,
        completed_at: Timestamp,
    },
    /// The task failed or was refunded before the panel decided
    Abandoned { closed_at: Timestamp },
}

impl SessionStatus {
    /// `None` while open. An abandoned session counts as not approved.
    pub fn approved(&self) -> Option<bool> {
        match self {
            Self::Open => None,
            Self::Completed { approved, .. } => Some(*approved),
            Self::Abandoned { .. } => Some(false),
        }
    }
}

/// One task's verification panel and its votes. The panel is fixed at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub task_id: TaskId,
    pub draw: PanelDraw,
    pub votes: BTreeMap<AccountAddress, bool>,
    pub tally: SessionTally,
    pub weight: u32,
    pub started_at: Timestamp,
    pub deadline: Timestamp,
    pub status: SessionStatus,
    pub rewards_distributed: bool,
    pub dispute_handled: bool,
}

impl SessionView {
    pub fn panel(&self) -> &[AccountAddress] {
        &self.draw.members
    }

    pub fn is_completed(&self) -> bool {
        !matches!(self.status, SessionStatus::Open)
    }

    fn complete(&mut self, approved: bool, now: Timestamp) {
        self.status = SessionStatus::Completed {
            approved,
            completed_at: now,
        };
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitteeStats {
    pub verifiers: RosterStats,
    pub sessions: usize,
    pub open_sessions: usize,
    pub approved: usize,
    pub rejected: usize,
    pub abandoned: usize,
    pub reward_pool_balance: TokenAmount,
}

/// Staked verifiers voting on task completion.
pub struct VerifierCommittee {
    config: CommitteeConfig,
    roster: StakedRoster,
    sessions: Arc<RwLock<HashMap<TaskId, Arc<Mutex<SessionView>>>>>,
    escrow: Arc<dyn CompletionGate>,
    beacon: Arc<dyn RandomnessSource>,
    ledger: Arc<dyn Ledger>,
    reward_pool: AccountAddress,
    operator: AccountAddress,
    events: EventBus,
}

impl VerifierCommittee {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CommitteeConfig,
        escrow: Arc<dyn CompletionGate>,
        beacon: Arc<dyn RandomnessSource>,
        ledger: Arc<dyn Ledger>,
        reward_pool: AccountAddress,
        stake_vault: AccountAddress,
        operator: AccountAddress,
        events: EventBus,
    ) -> Self {
        let roster = StakedRoster::new(
            ParticipantRole::Verifier,
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
            sessions: Arc::new(RwLock::new(HashMap::new())),
            escrow,
            beacon,
            ledger,
            reward_pool,
            operator,
            events,
        }
    }

    pub fn reward_pool(&self) -> AccountAddress {
        self.reward_pool
    }

    pub async fn register_verifier(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        description: &str,
        now: Timestamp,
    ) -> Result<RosterMember> {
        self.roster.register(account, stake, description, now).await
    }

    pub async fn reregister_verifier(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
        now: Timestamp,
    ) -> Result<RosterMember> {
        self.roster.reregister(account, top_up, now).await
    }

    pub async fn fund_reward_pool(
        &self,
        funder: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.ledger
            .transfer_from(self.operator, funder, self.reward_pool, amount)
            .await?;
        info!(funder = %funder, amount = %amount, "💰 Verifier reward pool funded");
        Ok(())
    }

    async fn lock(&self, task_id: TaskId) -> Result<OwnedMutexGuard<SessionView>> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or(ProtocolError::SessionNotFound(task_id))?;
        entry
            .try_lock_owned()
            .map_err(|_| ProtocolError::ResourceBusy(format!("session for {}", task_id)))
    }

    /// Draw a panel for a responded task. The task's requester and worker are
    /// never on it.
    pub async fn start_session(&self, task_id: TaskId, now: Timestamp) -> Result<SessionView> {
        let task = self.escrow.task_view(task_id).await?;
        if task.state != TaskState::Responded {
            return Err(ProtocolError::InvalidTaskState {
                task_id,
                expected: "Responded".to_string(),
                actual: task.state,
            });
        }
        if now >= task.deadline {
            return Err(ProtocolError::DeadlineExceeded {
                deadline: task.deadline,
                current: now,
            });
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&task_id) {
            return Err(ProtocolError::SessionExists(task_id));
        }

        let mut exclude = vec![task.requester];
        exclude.extend(task.worker);
        let eligible = self
            .roster
            .eligible(self.config.min_reputation, &exclude)
            .await;
        if eligible.len() < self.config.min_eligible {
            return Err(ProtocolError::InsufficientEligible {
                role: ParticipantRole::Verifier,
                required: self.config.min_eligible,
                available: eligible.len(),
            });
        }

        let size = self.config.panel_size.min(eligible.len());
        let output = self
            .beacon
            .draw(VERIFIER_PANEL_DOMAIN, task_id.value())
            .await?;
        let draw = select_panel(&output, VERIFIER_PANEL_DOMAIN, task_id.value(), &eligible, size)?;

        let session = SessionView {
            task_id,
            tally: SessionTally::new(draw.members.len()),
            draw,
            votes: BTreeMap::new(),
            weight: task.weight,
            started_at: now,
            deadline: now.saturating_add(self.config.voting_period),
            status: SessionStatus::Open,
            rewards_distributed: false,
            dispute_handled: false,
        };
        sessions.insert(task_id, Arc::new(Mutex::new(session.clone())));

        info!(
            task_id = %task_id,
            panel_size = session.draw.members.len(),
            eligible = eligible.len(),
            beacon_round = session.draw.round,
            deadline = session.deadline,
            "🧑‍⚖️ Verification session started"
        );
        self.events.emit(ProtocolEvent::SessionStarted {
            task_id,
            panel: session.draw.members.clone(),
            deadline: session.deadline,
        });
        Ok(session)
    }

    /// Record a panel member's vote. The vote that decides approval also
    /// verifies the task; if the escrow refuses, the vote is not recorded.
    pub async fn cast_vote(
        &self,
        task_id: TaskId,
        voter: AccountAddress,
        approve: bool,
        now: Timestamp,
    ) -> Result<SessionView> {
        let mut session = self.lock(task_id).await?;
        if session.is_completed() {
            return Err(ProtocolError::SessionCompleted(task_id));
        }
        if !session.panel().contains(&voter) {
            return Err(ProtocolError::NotPanelMember { account: voter });
        }
        if session.votes.contains_key(&voter) {
            return Err(ProtocolError::AlreadyVoted { account: voter });
        }
        if now >= session.deadline {
            return Err(ProtocolError::DeadlineExceeded {
                deadline: session.deadline,
                current: now,
            });
        }

        let next = session.tally.with_vote(approve);
        let outcome = next.decided();
        if outcome == Some(true) {
            self.escrow.verify_completion(task_id, now).await?;
        }

        session.votes.insert(voter, approve);
        session.tally = next;
        debug!(
            task_id = %task_id,
            voter = %voter,
            approve,
            approvals = next.approvals,
            rejections = next.rejections,
            "Verification vote recorded"
        );
        self.events.emit(ProtocolEvent::VerificationVoteCast {
            task_id,
            verifier: voter,
            approve,
        });

        if let Some(approved) = outcome {
            session.complete(approved, now);
            self.log_completion(&session, approved);
        }
        Ok(session.clone())
    }

    /// Close a session whose voting deadline has passed.
    pub async fn complete_verification(
        &self,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<SessionView> {
        let mut session = self.lock(task_id).await?;
        if session.is_completed() {
            return Err(ProtocolError::SessionCompleted(task_id));
        }
        if now < session.deadline {
            return Err(ProtocolError::DeadlineNotReached {
                deadline: session.deadline,
                current: now,
            });
        }

        let approved = session.tally.is_approved();
        if approved {
            self.escrow.verify_completion(task_id, now).await?;
        }
        session.complete(approved, now);
        self.log_completion(&session, approved);
        Ok(session.clone())
    }

    /// Close a still-open session whose task has failed or been refunded.
    /// Returns `None` when there is no open session for the task.
    pub async fn abandon_session(
        &self,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<Option<SessionView>> {
        if !self.sessions.read().await.contains_key(&task_id) {
            return Ok(None);
        }
        let mut session = self.lock(task_id).await?;
        if session.is_completed() {
            return Ok(None);
        }
        let task = self.escrow.task_view(task_id).await?;
        if !matches!(task.state, TaskState::Failed | TaskState::Refunded) {
            return Err(ProtocolError::InvalidTaskState {
                task_id,
                expected: "Failed or Refunded".to_string(),
                actual: task.state,
            });
        }

        session.status = SessionStatus::Abandoned { closed_at: now };
        info!(
            task_id = %task_id,
            votes = session.votes.len(),
            task_state = ?task.state,
            "🚫 Verification session abandoned"
        );
        self.events.emit(ProtocolEvent::SessionCompleted {
            task_id,
            approved: false,
        });
        Ok(Some(session.clone()))
    }

    fn log_completion(&self, session: &SessionView, approved: bool) {
        info!(
            task_id = %session.task_id,
            approved,
            approvals = session.tally.approvals,
            rejections = session.tally.rejections,
            panel_size = session.tally.panel_size,
            "🏁 Verification session completed"
        );
        self.events.emit(ProtocolEvent::SessionCompleted {
            task_id: session.task_id,
            approved,
        });
    }

    /// Pay every panel member who voted, scaled by the task weight, and
    /// update their accuracy against the session outcome.
    pub async fn distribute_rewards(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<(AccountAddress, TokenAmount)>> {
        let mut session = self.lock(task_id).await?;
        let approved = session
            .status
            .approved()
            .ok_or(ProtocolError::SessionOpen(task_id))?;
        if session.rewards_distributed {
            return Err(ProtocolError::RewardsAlreadyDistributed(task_id));
        }

        let per_vote = self
            .config
            .reward_per_vote
            .mul_div(session.weight as u128, 100)
            .ok_or(ProtocolError::Overflow("verifier reward"))?;
        let rewards: Vec<(AccountAddress, TokenAmount)> =
            session.votes.keys().map(|v| (*v, per_vote)).collect();
        let total = per_vote
            .checked_mul(rewards.len() as u128)
            .ok_or(ProtocolError::Overflow("verifier reward"))?;

        let available = self.ledger.balance_of(self.reward_pool).await?;
        if available < total {
            return Err(ProtocolError::RewardPoolExhausted {
                needed: total,
                available,
            });
        }
        self.ledger.transfer_split(self.reward_pool, &rewards).await?;
        session.rewards_distributed = true;

        // Abandoned sessions have no verdict to measure votes against
        if !matches!(session.status, SessionStatus::Abandoned { .. }) {
            for (voter, vote) in session.votes.iter() {
                self.roster.record_outcome(*voter, *vote == approved).await;
            }
        }

        info!(
            task_id = %task_id,
            recipients = rewards.len(),
            per_vote = %per_vote,
            total = %total,
            "🎁 Verifier rewards distributed"
        );
        self.events.emit(ProtocolEvent::RewardsDistributed {
            task_id,
            recipients: rewards.len(),
            total,
        });
        Ok(rewards)
    }

    pub async fn session(&self, task_id: TaskId) -> Result<SessionView> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or(ProtocolError::SessionNotFound(task_id))?;
        let session = entry.lock().await;
        Ok(session.clone())
    }

    pub async fn verifier(&self, account: AccountAddress) -> Option<RosterMember> {
        self.roster.member(account).await
    }

    pub async fn verifiers(&self) -> Vec<RosterMember> {
        self.roster.members().await
    }

    pub async fn get_stats(&self) -> CommitteeStats {
        let entries: Vec<Arc<Mutex<SessionView>>> =
            self.sessions.read().await.values().cloned().collect();
        let mut stats = CommitteeStats {
            verifiers: self.roster.get_stats().await,
            sessions: entries.len(),
            reward_pool_balance: self
                .ledger
                .balance_of(self.reward_pool)
                .await
                .unwrap_or(TokenAmount::ZERO),
            ..Default::default()
        };
        for entry in entries {
            match entry.lock().await.status {
                SessionStatus::Open => stats.open_sessions += 1,
                SessionStatus::Completed { approved: true, .. } => stats.approved += 1,
                SessionStatus::Completed { approved: false, .. } => stats.rejected += 1,
                SessionStatus::Abandoned { .. } => stats.abandoned += 1,
            }
        }
        stats
    }
}

#[async_trait]
impl PanelAccountability for VerifierCommittee {
    async fn panel_members(&self, task_id: TaskId) -> Result<Vec<AccountAddress>> {
        match self.session(task_id).await {
            Ok(session) => Ok(session.draw.members),
            Err(ProtocolError::SessionNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn handle_dispute_resolution(
        &self,
        task_id: TaskId,
        decision: DisputeDecision,
        _now: Timestamp,
    ) -> Result<Vec<SlashRecord>> {
        let mut session = self.lock(task_id).await?;
        if session.dispute_handled {
            return Ok(Vec::new());
        }
        let Some(approval_stands) = decision.approval_stands() else {
            session.dispute_handled = true;
            info!(task_id = %task_id, "Inconclusive appeal, no verifier penalties");
            return Ok(Vec::new());
        };

        let reason = format!("vote contradicted appeal decision {:?}", decision);
        let dissenters: Vec<AccountAddress> = session
            .votes
            .iter()
            .filter(|(_, vote)| **vote != approval_stands)
            .map(|(voter, _)| *voter)
            .collect();

        let mut slashed = Vec::new();
        for voter in dissenters {
            // Members slashed on an earlier attempt come back as None
            if let Some(record) = self
                .roster
                .slash(voter, self.config.slash_bps, self.reward_pool, &reason)
                .await?
            {
                slashed.push(record);
            }
        }
        session.dispute_handled = true;

        if !slashed.is_empty() {
            warn!(
                task_id = %task_id,
                decision = ?decision,
                slashed = slashed.len(),
                "Verifiers penalized after appeal"
            );
        }
        Ok(slashed)
    }
}
