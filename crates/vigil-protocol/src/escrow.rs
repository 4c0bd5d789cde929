use crate::config::EscrowConfig;
use crate::error::{ProtocolError, Result};
use crate::events::{EventBus, ProtocolEvent};
use crate::gates::{CompletionGate, DisputeGate, TaskDirectory};
use crate::types::{
    BondSettlement, DisputeDecision, EvidenceEntry, Payout, PayoutKind, ProgressNote,
    SettlementReceipt, TaskState, TaskView,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};
use vigil_ledger::Ledger;
use vigil_types::{
    AccountAddress, IdAllocator, SubjectCommitment, TargetEntityId, TaskId, Timestamp,
    TokenAmount,
};

pub const TASK_CUSTODY_DOMAIN: &str = "vigil/task-escrow";

/// Parameters for a new task, already validated by the factory.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub requester: AccountAddress,
    pub target: TargetEntityId,
    pub subject: SubjectCommitment,
    pub payout: TokenAmount,
    pub fee: TokenAmount,
    pub weight: u32,
    pub duration: u64,
    pub worker: Option<AccountAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeldDispute {
    initiator: AccountAddress,
    bond: TokenAmount,
    reason: String,
    raised_at: Timestamp,
    bond_settled: bool,
}

/// One task's lifecycle and the funds held for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEscrow {
    task_id: TaskId,
    target: TargetEntityId,
    subject: SubjectCommitment,
    requester: AccountAddress,
    worker: Option<AccountAddress>,
    payout: TokenAmount,
    weight: u32,
    state: TaskState,
    created_at: Timestamp,
    deadline: Timestamp,
    evidence: Vec<EvidenceEntry>,
    progress: Vec<ProgressNote>,
    dispute_window_end: Option<Timestamp>,
    dispute: Option<HeldDispute>,
    paid_in: TokenAmount,
    released: TokenAmount,
    /// Set once the payout has left custody. Checked before every release.
    payout_released: bool,
    failure_reason: Option<String>,
}

impl TaskEscrow {
    fn new(task_id: TaskId, params: &NewTask, now: Timestamp) -> Self {
        Self {
            task_id,
            target: params.target,
            subject: params.subject,
            requester: params.requester,
            worker: None,
            payout: params.payout,
            weight: params.weight,
            state: TaskState::Created,
            created_at: now,
            deadline: now.saturating_add(params.duration),
            evidence: Vec::new(),
            progress: Vec::new(),
            dispute_window_end: None,
            dispute: None,
            paid_in: TokenAmount::ZERO,
            released: TokenAmount::ZERO,
            payout_released: false,
            failure_reason: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn custody(&self) -> AccountAddress {
        AccountAddress::derive(TASK_CUSTODY_DOMAIN, self.task_id.value())
    }

    /// Funds paid in minus funds released.
    pub fn escrowed(&self) -> TokenAmount {
        self.paid_in.saturating_sub(self.released)
    }

    pub fn view(&self) -> TaskView {
        TaskView {
            task_id: self.task_id,
            target: self.target,
            subject: self.subject,
            requester: self.requester,
            worker: self.worker,
            payout: self.payout,
            weight: self.weight,
            state: self.state,
            created_at: self.created_at,
            deadline: self.deadline,
            evidence: self.evidence.clone(),
            progress: self.progress.clone(),
            dispute_window_end: self.dispute_window_end,
            dispute_initiator: self.dispute.as_ref().map(|d| d.initiator),
            dispute_bond: self
                .dispute
                .as_ref()
                .map(|d| d.bond)
                .unwrap_or(TokenAmount::ZERO),
            escrowed: self.escrowed(),
            failure_reason: self.failure_reason.clone(),
        }
    }

    fn invalid_state(&self, expected: &str) -> ProtocolError {
        ProtocolError::InvalidTaskState {
            task_id: self.task_id,
            expected: expected.to_string(),
            actual: self.state,
        }
    }

    fn ensure_state(&self, expected: TaskState) -> Result<()> {
        if self.state != expected {
            return Err(self.invalid_state(&format!("{:?}", expected)));
        }
        Ok(())
    }

    fn ensure_before_deadline(&self, now: Timestamp) -> Result<()> {
        if now >= self.deadline {
            return Err(ProtocolError::DeadlineExceeded {
                deadline: self.deadline,
                current: now,
            });
        }
        Ok(())
    }

    fn ensure_not_released(&self) -> Result<()> {
        if self.payout_released {
            return Err(ProtocolError::AlreadySettled(self.task_id));
        }
        Ok(())
    }

    fn ensure_worker(&self, caller: AccountAddress) -> Result<()> {
        match self.worker {
            None => Err(ProtocolError::NoWorkerAssigned(self.task_id)),
            Some(worker) if worker == caller => Ok(()),
            Some(_) => Err(ProtocolError::Unauthorized {
                caller,
                action: "advance a task assigned to another worker",
            }),
        }
    }

    fn transition(&mut self, to: TaskState) -> Result<TaskState> {
        if !self.state.can_transition_to(&to) {
            return Err(self.invalid_state(&format!("a state leading to {:?}", to)));
        }
        let from = self.state;
        self.state = to;
        Ok(from)
    }

    fn assign(&mut self, worker: AccountAddress, now: Timestamp) -> Result<()> {
        self.ensure_state(TaskState::Created)?;
        if self.worker.is_some() {
            return Err(ProtocolError::WorkerAlreadyAssigned(self.task_id));
        }
        if worker == self.requester {
            return Err(ProtocolError::WorkerIsRequester);
        }
        self.ensure_before_deadline(now)?;
        self.worker = Some(worker);
        Ok(())
    }

    fn advance(
        &mut self,
        caller: AccountAddress,
        to: TaskState,
        summary: &str,
        max_summary_len: usize,
        now: Timestamp,
    ) -> Result<TaskState> {
        self.ensure_worker(caller)?;
        self.ensure_before_deadline(now)?;
        check_text("summary", summary, max_summary_len)?;
        let from = self.transition(to)?;
        self.progress.push(ProgressNote {
            state: to,
            summary: summary.to_string(),
            at: now,
        });
        Ok(from)
    }
}

fn check_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.len() > max_len {
        return Err(ProtocolError::InvalidInput(format!(
            "{} exceeds {} bytes",
            field, max_len
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowStats {
    pub total_tasks: usize,
    pub by_state: HashMap<String, usize>,
    pub total_escrowed: TokenAmount,
    pub total_released: TokenAmount,
}

/// Arena of task escrows. Each task sits behind its own lock; a call that
/// finds the lock taken is rejected with `ResourceBusy` rather than queued.
pub struct EscrowBook {
    config: EscrowConfig,
    ledger: Arc<dyn Ledger>,
    tasks: Arc<RwLock<HashMap<TaskId, Arc<Mutex<TaskEscrow>>>>>,
    ids: IdAllocator<TaskId>,
    operator: AccountAddress,
    verifier_pool: AccountAddress,
    forfeit_pool: AccountAddress,
    events: EventBus,
}

impl EscrowBook {
    pub fn new(
        config: EscrowConfig,
        ledger: Arc<dyn Ledger>,
        operator: AccountAddress,
        verifier_pool: AccountAddress,
        forfeit_pool: AccountAddress,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            ledger,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            ids: IdAllocator::new(),
            operator,
            verifier_pool,
            forfeit_pool,
            events,
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    async fn entry(&self, task_id: TaskId) -> Result<Arc<Mutex<TaskEscrow>>> {
        self.tasks
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or(ProtocolError::TaskNotFound(task_id))
    }

    /// Exclusive access for one transition.
    async fn lock(&self, task_id: TaskId) -> Result<OwnedMutexGuard<TaskEscrow>> {
        self.entry(task_id)
            .await?
            .try_lock_owned()
            .map_err(|_| ProtocolError::ResourceBusy(task_id.to_string()))
    }

    fn emit_transition(&self, task_id: TaskId, from: TaskState, to: TaskState, at: Timestamp) {
        self.events.emit(ProtocolEvent::TaskStateChanged {
            task_id,
            from,
            to,
            at,
        });
    }

    /// Pull payout into the task's custody and the fee to `fee_collector` in
    /// one ledger call, then register the task.
    pub async fn open_task(
        &self,
        params: NewTask,
        fee_collector: AccountAddress,
        now: Timestamp,
    ) -> Result<TaskId> {
        if params.worker == Some(params.requester) {
            return Err(ProtocolError::WorkerIsRequester);
        }

        let task_id = self.ids.next_id();
        let mut task = TaskEscrow::new(task_id, &params, now);
        let custody = task.custody();

        self.ledger
            .pull_split(
                self.operator,
                params.requester,
                &[(custody, params.payout), (fee_collector, params.fee)],
            )
            .await?;
        task.paid_in = params.payout;
        task.worker = params.worker;

        let deadline = task.deadline;
        self.tasks
            .write()
            .await
            .insert(task_id, Arc::new(Mutex::new(task)));

        info!(
            task_id = %task_id,
            requester = %params.requester,
            payout = %params.payout,
            fee = %params.fee,
            deadline,
            "📝 Task escrow opened"
        );
        self.events.emit(ProtocolEvent::TaskCreated {
            task_id,
            requester: params.requester,
            payout: params.payout,
            fee: params.fee,
            deadline,
        });
        if let Some(worker) = params.worker {
            self.events
                .emit(ProtocolEvent::WorkerAssigned { task_id, worker });
        }
        Ok(task_id)
    }

    pub async fn assign_worker(
        &self,
        task_id: TaskId,
        worker: AccountAddress,
        now: Timestamp,
    ) -> Result<()> {
        let mut task = self.lock(task_id).await?;
        task.assign(worker, now)?;

        info!(task_id = %task_id, worker = %worker, "👷 Worker assigned");
        self.events
            .emit(ProtocolEvent::WorkerAssigned { task_id, worker });
        Ok(())
    }

    pub async fn mark_requested(
        &self,
        task_id: TaskId,
        caller: AccountAddress,
        summary: &str,
        now: Timestamp,
    ) -> Result<()> {
        self.advance(task_id, caller, TaskState::Requested, summary, now)
            .await
    }

    pub async fn mark_responded(
        &self,
        task_id: TaskId,
        caller: AccountAddress,
        summary: &str,
        now: Timestamp,
    ) -> Result<()> {
        self.advance(task_id, caller, TaskState::Responded, summary, now)
            .await
    }

    async fn advance(
        &self,
        task_id: TaskId,
        caller: AccountAddress,
        to: TaskState,
        summary: &str,
        now: Timestamp,
    ) -> Result<()> {
        let mut task = self.lock(task_id).await?;
        let from = task.advance(caller, to, summary, self.config.max_summary_len, now)?;

        info!(task_id = %task_id, from = ?from, to = ?to, "➡️ Task advanced");
        self.emit_transition(task_id, from, to, now);
        Ok(())
    }

    /// Append evidence. `verifier_panel` is the task's current verification
    /// panel; its members may submit alongside the worker.
    pub async fn submit_evidence(
        &self,
        task_id: TaskId,
        caller: AccountAddress,
        reference: &str,
        summary: &str,
        verifier_panel: &[AccountAddress],
        now: Timestamp,
    ) -> Result<()> {
        let mut task = self.lock(task_id).await?;
        if !matches!(task.state, TaskState::Requested | TaskState::Responded) {
            return Err(task.invalid_state("Requested or Responded"));
        }
        if task.worker != Some(caller) && !verifier_panel.contains(&caller) {
            return Err(ProtocolError::Unauthorized {
                caller,
                action: "submit evidence",
            });
        }
        task.ensure_before_deadline(now)?;
        check_text("reference", reference, self.config.max_summary_len)?;
        check_text("summary", summary, self.config.max_summary_len)?;
        if task.evidence.len() >= self.config.max_evidence_entries {
            return Err(ProtocolError::EvidenceLimit {
                task_id,
                limit: self.config.max_evidence_entries,
            });
        }

        task.evidence.push(EvidenceEntry {
            reference: reference.to_string(),
            summary: summary.to_string(),
            submitter: caller,
            submitted_at: now,
        });

        debug!(
            task_id = %task_id,
            submitter = %caller,
            entries = task.evidence.len(),
            "Evidence appended"
        );
        self.events.emit(ProtocolEvent::EvidenceSubmitted {
            task_id,
            submitter: caller,
            reference: reference.to_string(),
        });
        Ok(())
    }

    /// Release the payout: worker share to the worker, the rest to the verifier
    /// reward pool. Only after the dispute window has elapsed undisputed.
    pub async fn complete_task(
        &self,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<SettlementReceipt> {
        let mut task = self.lock(task_id).await?;
        task.ensure_not_released()?;
        task.ensure_state(TaskState::Verified)?;
        let window_end = task
            .dispute_window_end
            .ok_or_else(|| task.invalid_state("Verified with an open dispute window"))?;
        if now < window_end {
            return Err(ProtocolError::DisputeWindowOpen {
                task_id,
                window_end,
                current: now,
            });
        }
        let worker = task.worker.ok_or(ProtocolError::NoWorkerAssigned(task_id))?;

        let worker_amount = task
            .payout
            .bps(self.config.worker_share_bps)
            .ok_or(ProtocolError::Overflow("worker share"))?;
        let pool_amount = task.payout.saturating_sub(worker_amount);
        let payouts = vec![
            Payout {
                recipient: worker,
                amount: worker_amount,
                kind: PayoutKind::WorkerShare,
            },
            Payout {
                recipient: self.verifier_pool,
                amount: pool_amount,
                kind: PayoutKind::VerifierPoolShare,
            },
        ];

        let from = task.state;
        task.payout_released = true;
        task.state = TaskState::Completed;
        if let Err(e) = self.release(task.custody(), &payouts).await {
            task.payout_released = false;
            task.state = from;
            return Err(e);
        }
        task.released = task.released.saturating_add(task.payout);

        info!(
            task_id = %task_id,
            worker = %worker,
            worker_amount = %worker_amount,
            pool_amount = %pool_amount,
            "✅ Task completed, payout released"
        );
        self.emit_transition(task_id, from, TaskState::Completed, now);
        self.emit_payouts(task_id, &payouts);

        Ok(SettlementReceipt {
            task_id,
            state: TaskState::Completed,
            payouts,
            settled_at: now,
        })
    }

    /// Before the deadline the worker may abandon a pre-verification task and
    /// the requester may cancel one the worker has not yet responded to. Once
    /// the deadline has passed anyone may fail it.
    pub async fn mark_failed(
        &self,
        task_id: TaskId,
        caller: AccountAddress,
        reason: &str,
        now: Timestamp,
    ) -> Result<TaskView> {
        let mut task = self.lock(task_id).await?;
        task.ensure_not_released()?;
        if !task.state.is_pre_verification() {
            return Err(task.invalid_state("Created, Requested or Responded"));
        }
        if now < task.deadline && task.worker != Some(caller) {
            if caller != task.requester {
                return Err(ProtocolError::Unauthorized {
                    caller,
                    action: "fail a task before its deadline",
                });
            }
            // A response is the verifiers' to judge, not the requester's
            if task.state == TaskState::Responded {
                return Err(ProtocolError::Unauthorized {
                    caller,
                    action: "cancel a responded task before its deadline",
                });
            }
        }
        check_text("reason", reason, self.config.max_summary_len)?;

        let from = task.transition(TaskState::Failed)?;
        task.failure_reason = Some(reason.to_string());

        warn!(task_id = %task_id, caller = %caller, reason, "❌ Task marked failed");
        self.emit_transition(task_id, from, TaskState::Failed, now);
        Ok(task.view())
    }

    /// Return escrowed funds to the requester, plus any unsettled bond to its
    /// initiator. Allowed from `Failed`, or pre-verification once the deadline
    /// has passed.
    pub async fn refund(&self, task_id: TaskId, now: Timestamp) -> Result<SettlementReceipt> {
        let mut task = self.lock(task_id).await?;
        task.ensure_not_released()?;
        match task.state {
            TaskState::Failed => {}
            state if state.is_pre_verification() => {
                if now < task.deadline {
                    return Err(ProtocolError::DeadlineNotReached {
                        deadline: task.deadline,
                        current: now,
                    });
                }
            }
            _ => return Err(task.invalid_state("Failed, or pre-verification past deadline")),
        }

        let mut payouts = vec![Payout {
            recipient: task.requester,
            amount: task.payout,
            kind: PayoutKind::Refund,
        }];
        let held_bond = task
            .dispute
            .as_ref()
            .filter(|d| !d.bond_settled)
            .map(|d| (d.initiator, d.bond));
        if let Some((initiator, bond)) = held_bond {
            payouts.push(Payout {
                recipient: initiator,
                amount: bond,
                kind: PayoutKind::BondReturn,
            });
        }
        let total = payouts
            .iter()
            .fold(TokenAmount::ZERO, |acc, p| acc.saturating_add(p.amount));

        let from = task.state;
        task.payout_released = true;
        task.state = TaskState::Refunded;
        if let Some(dispute) = task.dispute.as_mut() {
            dispute.bond_settled = true;
        }
        if let Err(e) = self.release(task.custody(), &payouts).await {
            task.payout_released = false;
            task.state = from;
            if held_bond.is_some() {
                if let Some(dispute) = task.dispute.as_mut() {
                    dispute.bond_settled = false;
                }
            }
            return Err(e);
        }
        task.released = task.released.saturating_add(total);

        info!(
            task_id = %task_id,
            requester = %task.requester,
            amount = %total,
            "↩️ Task refunded"
        );
        self.emit_transition(task_id, from, TaskState::Refunded, now);
        self.emit_payouts(task_id, &payouts);

        Ok(SettlementReceipt {
            task_id,
            state: TaskState::Refunded,
            payouts,
            settled_at: now,
        })
    }

    async fn release(&self, custody: AccountAddress, payouts: &[Payout]) -> Result<()> {
        let legs: Vec<(AccountAddress, TokenAmount)> = payouts
            .iter()
            .filter(|p| !p.amount.is_zero())
            .map(|p| (p.recipient, p.amount))
            .collect();
        self.ledger.transfer_split(custody, &legs).await?;
        Ok(())
    }

    fn emit_payouts(&self, task_id: TaskId, payouts: &[Payout]) {
        for payout in payouts {
            self.events.emit(ProtocolEvent::FundsReleased {
                task_id,
                recipient: payout.recipient,
                amount: payout.amount,
            });
        }
    }

    pub async fn task(&self, task_id: TaskId) -> Result<TaskView> {
        let entry = self.entry(task_id).await?;
        let task = entry.lock().await;
        Ok(task.view())
    }

    /// Every task, ordered by id.
    pub async fn tasks(&self) -> Vec<TaskView> {
        let entries: Vec<Arc<Mutex<TaskEscrow>>> =
            self.tasks.read().await.values().cloned().collect();
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            views.push(entry.lock().await.view());
        }
        views.sort_by_key(|v| v.task_id);
        views
    }

    pub async fn get_stats(&self) -> EscrowStats {
        let entries: Vec<Arc<Mutex<TaskEscrow>>> =
            self.tasks.read().await.values().cloned().collect();
        let mut stats = EscrowStats {
            total_tasks: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            let task = entry.lock().await;
            *stats
                .by_state
                .entry(format!("{:?}", task.state))
                .or_insert(0) += 1;
            stats.total_escrowed = stats.total_escrowed.saturating_add(task.escrowed());
            stats.total_released = stats.total_released.saturating_add(task.released);
        }
        stats
    }
}

#[async_trait]
impl TaskDirectory for EscrowBook {
    async fn task_view(&self, task_id: TaskId) -> Result<TaskView> {
        self.task(task_id).await
    }
}

#[async_trait]
impl CompletionGate for EscrowBook {
    async fn verify_completion(&self, task_id: TaskId, now: Timestamp) -> Result<Timestamp> {
        let mut task = self.lock(task_id).await?;
        task.ensure_state(TaskState::Responded)?;
        if task.evidence.is_empty() {
            return Err(ProtocolError::NoEvidence(task_id));
        }
        task.ensure_before_deadline(now)?;

        let window_end = now.saturating_add(self.config.dispute_window);
        let from = task.transition(TaskState::Verified)?;
        task.dispute_window_end = Some(window_end);

        info!(
            task_id = %task_id,
            window_end,
            "🔏 Task verified, dispute window opened"
        );
        self.emit_transition(task_id, from, TaskState::Verified, now);
        Ok(window_end)
    }
}

#[async_trait]
impl DisputeGate for EscrowBook {
    async fn open_dispute(
        &self,
        task_id: TaskId,
        initiator: AccountAddress,
        reason: &str,
        bond: TokenAmount,
        now: Timestamp,
    ) -> Result<()> {
        let mut task = self.lock(task_id).await?;
        task.ensure_not_released()?;
        if task.dispute.is_some() {
            return Err(ProtocolError::DisputeAlreadyRaised(task_id));
        }
        task.ensure_state(TaskState::Verified)?;
        if initiator != task.requester && task.worker != Some(initiator) {
            return Err(ProtocolError::Unauthorized {
                caller: initiator,
                action: "dispute a task they are not party to",
            });
        }
        let window_end = task
            .dispute_window_end
            .ok_or_else(|| task.invalid_state("Verified with an open dispute window"))?;
        if now >= window_end {
            return Err(ProtocolError::DisputeWindowClosed {
                task_id,
                window_end,
                current: now,
            });
        }
        if bond < self.config.min_dispute_bond {
            return Err(ProtocolError::BelowMinimum {
                what: "dispute bond",
                minimum: self.config.min_dispute_bond,
                provided: bond,
            });
        }
        check_text("reason", reason, self.config.max_summary_len)?;

        self.ledger
            .transfer_from(self.operator, initiator, task.custody(), bond)
            .await?;

        let from = task.transition(TaskState::Disputed)?;
        task.paid_in = task.paid_in.saturating_add(bond);
        task.dispute = Some(HeldDispute {
            initiator,
            bond,
            reason: reason.to_string(),
            raised_at: now,
            bond_settled: false,
        });

        info!(
            task_id = %task_id,
            initiator = %initiator,
            bond = %bond,
            "⚖️ Dispute bond escrowed"
        );
        self.emit_transition(task_id, from, TaskState::Disputed, now);
        Ok(())
    }

    async fn settle_dispute(
        &self,
        task_id: TaskId,
        decision: DisputeDecision,
        now: Timestamp,
    ) -> Result<BondSettlement> {
        let mut task = self.lock(task_id).await?;
        task.ensure_state(TaskState::Disputed)?;
        let (initiator, bond) = match task.dispute.as_ref() {
            Some(d) if !d.bond_settled => (d.initiator, d.bond),
            _ => return Err(task.invalid_state("Disputed with an unsettled bond")),
        };

        let (payout, next) = match decision {
            DisputeDecision::OverrideOriginal => (
                Payout {
                    recipient: initiator,
                    amount: bond,
                    kind: PayoutKind::BondReturn,
                },
                TaskState::Failed,
            ),
            DisputeDecision::UpholdOriginal | DisputeDecision::Inconclusive => (
                Payout {
                    recipient: self.forfeit_pool,
                    amount: bond,
                    kind: PayoutKind::BondForfeit,
                },
                TaskState::Verified,
            ),
        };

        let from = task.transition(next)?;
        if let Some(dispute) = task.dispute.as_mut() {
            dispute.bond_settled = true;
        }
        if let Err(e) = self.release(task.custody(), std::slice::from_ref(&payout)).await {
            task.state = from;
            if let Some(dispute) = task.dispute.as_mut() {
                dispute.bond_settled = false;
            }
            return Err(e);
        }
        task.released = task.released.saturating_add(bond);
        if next == TaskState::Failed {
            task.failure_reason = Some("committee decision overridden on appeal".to_string());
        }

        info!(
            task_id = %task_id,
            decision = ?decision,
            recipient = %payout.recipient,
            bond = %bond,
            "⚖️ Dispute bond settled"
        );
        self.emit_transition(task_id, from, next, now);
        self.emit_payouts(task_id, std::slice::from_ref(&payout));

        Ok(BondSettlement {
            task_id,
            decision,
            payout,
        })
    }
}
