use crate::config::{FactoryConfig, SelectionPolicy};
use crate::error::{ProtocolError, Result};
use crate::escrow::{EscrowBook, NewTask};
use crate::events::EventBus;
use crate::gates::WorkerAccountability;
use crate::roster::{RosterStats, StakedRoster};
use crate::types::{ParticipantRole, SettlementReceipt, SlashRecord, TaskState, TaskView};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use vigil_ledger::{Ledger, TargetRegistry};
use vigil_types::{
    AccountAddress, SubjectCommitment, TargetEntityId, TaskId, Timestamp, TokenAmount,
    BPS_DENOMINATOR,
};

/// Outcomes kept for the rolling success rate.
pub const SUCCESS_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub target: TargetEntityId,
    pub subject: SubjectCommitment,
    pub payout: TokenAmount,
    pub duration: u64,
    /// Assign this worker immediately
    pub worker: Option<AccountAddress>,
}

#[derive(Debug, Clone, Default)]
struct WorkerPerformance {
    completed: u64,
    failed: u64,
    recent: VecDeque<bool>,
}

impl WorkerPerformance {
    fn record(&mut self, success: bool) {
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        if self.recent.len() == SUCCESS_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(success);
    }

    fn success_rate_bps(&self) -> u32 {
        if self.recent.is_empty() {
            return 0;
        }
        let successes = self.recent.iter().filter(|s| **s).count() as u128;
        (successes * BPS_DENOMINATOR / self.recent.len() as u128) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub account: AccountAddress,
    pub stake: TokenAmount,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    /// Over the last `SUCCESS_WINDOW` outcomes, 0 without history
    pub success_rate_bps: u32,
    pub reputation: u8,
    pub slashed: bool,
    pub registered_at: Timestamp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryStats {
    pub workers: RosterStats,
    pub tasks_created: usize,
    pub fees_collected: TokenAmount,
}

/// Task creation, the worker directory and the settlement entry points that
/// feed worker statistics.
pub struct TaskFactory {
    config: FactoryConfig,
    escrow: Arc<EscrowBook>,
    registry: Arc<dyn TargetRegistry>,
    roster: StakedRoster,
    performance: Arc<RwLock<HashMap<AccountAddress, WorkerPerformance>>>,
    outcomes_recorded: Arc<RwLock<HashSet<TaskId>>>,
    penalized: Arc<RwLock<HashSet<TaskId>>>,
    cursor: Mutex<usize>,
    tasks_created: Arc<RwLock<usize>>,
    fees_collected: Arc<RwLock<TokenAmount>>,
    fee_collector: AccountAddress,
    slash_destination: AccountAddress,
}

impl TaskFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FactoryConfig,
        escrow: Arc<EscrowBook>,
        registry: Arc<dyn TargetRegistry>,
        ledger: Arc<dyn Ledger>,
        fee_collector: AccountAddress,
        stake_vault: AccountAddress,
        slash_destination: AccountAddress,
        operator: AccountAddress,
        events: EventBus,
    ) -> Self {
        let roster = StakedRoster::new(
            ParticipantRole::Worker,
            config.min_worker_stake,
            config.reentry_reputation,
            stake_vault,
            operator,
            ledger,
            events,
        );
        Self {
            config,
            escrow,
            registry,
            roster,
            performance: Arc::new(RwLock::new(HashMap::new())),
            outcomes_recorded: Arc::new(RwLock::new(HashSet::new())),
            penalized: Arc::new(RwLock::new(HashSet::new())),
            cursor: Mutex::new(0),
            tasks_created: Arc::new(RwLock::new(0)),
            fees_collected: Arc::new(RwLock::new(TokenAmount::ZERO)),
            fee_collector,
            slash_destination,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub async fn register_worker(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        now: Timestamp,
    ) -> Result<WorkerRecord> {
        self.roster.register(account, stake, "", now).await?;
        self.performance
            .write()
            .await
            .insert(account, WorkerPerformance::default());
        self.worker(account)
            .await
            .ok_or(ProtocolError::NotRegistered {
                role: ParticipantRole::Worker,
                account,
            })
    }

    pub async fn reregister_worker(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
        now: Timestamp,
    ) -> Result<WorkerRecord> {
        self.roster.reregister(account, top_up, now).await?;
        self.worker(account)
            .await
            .ok_or(ProtocolError::NotRegistered {
                role: ParticipantRole::Worker,
                account,
            })
    }

    /// Validate, pull payout plus platform fee in one ledger call and open
    /// the task escrow.
    pub async fn create_task(
        &self,
        requester: AccountAddress,
        request: CreateTask,
        now: Timestamp,
    ) -> Result<TaskView> {
        if request.payout < self.config.min_payout {
            return Err(ProtocolError::BelowMinimum {
                what: "payout",
                minimum: self.config.min_payout,
                provided: request.payout,
            });
        }
        if request.duration < self.config.min_duration
            || request.duration > self.config.max_duration
        {
            return Err(ProtocolError::DurationOutOfBounds {
                duration: request.duration,
                min: self.config.min_duration,
                max: self.config.max_duration,
            });
        }
        let target = self.registry.weight_and_status(request.target).await?;
        if !target.active {
            return Err(ProtocolError::TargetInactive(request.target));
        }
        if let Some(worker) = request.worker {
            if worker == requester {
                return Err(ProtocolError::WorkerIsRequester);
            }
            self.roster.ensure_active(worker).await?;
        }

        let fee = request
            .payout
            .bps(self.config.platform_fee_bps)
            .ok_or(ProtocolError::Overflow("platform fee"))?;
        let task_id = self
            .escrow
            .open_task(
                NewTask {
                    requester,
                    target: request.target,
                    subject: request.subject,
                    payout: request.payout,
                    fee,
                    weight: target.weight,
                    duration: request.duration,
                    worker: request.worker,
                },
                self.fee_collector,
                now,
            )
            .await?;

        *self.tasks_created.write().await += 1;
        {
            let mut fees = self.fees_collected.write().await;
            *fees = fees.saturating_add(fee);
        }
        self.escrow.task(task_id).await
    }

    async fn requester_only(&self, task_id: TaskId, caller: AccountAddress) -> Result<TaskView> {
        let task = self.escrow.task(task_id).await?;
        if task.requester != caller {
            return Err(ProtocolError::Unauthorized {
                caller,
                action: "assign workers to another requester's task",
            });
        }
        Ok(task)
    }

    pub async fn assign_worker(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        worker: AccountAddress,
        now: Timestamp,
    ) -> Result<()> {
        self.requester_only(task_id, caller).await?;
        self.roster.ensure_active(worker).await?;
        self.escrow.assign_worker(task_id, worker, now).await
    }

    pub async fn self_assign(
        &self,
        worker: AccountAddress,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<()> {
        self.roster.ensure_active(worker).await?;
        self.escrow.assign_worker(task_id, worker, now).await
    }

    /// Assign the worker picked by the configured [`SelectionPolicy`].
    pub async fn auto_assign_worker(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<AccountAddress> {
        let task = self.requester_only(task_id, caller).await?;
        if task.worker.is_some() {
            return Err(ProtocolError::WorkerAlreadyAssigned(task_id));
        }

        let eligible = self.roster.eligible(0, &[task.requester]).await;
        if eligible.is_empty() {
            return Err(ProtocolError::InsufficientEligible {
                role: ParticipantRole::Worker,
                required: 1,
                available: 0,
            });
        }

        let worker = match self.config.selection_policy {
            SelectionPolicy::RoundRobin => {
                let mut cursor = self.cursor.lock().await;
                let chosen = eligible[*cursor % eligible.len()];
                *cursor = cursor.wrapping_add(1);
                chosen
            }
            SelectionPolicy::HighestStake => {
                let mut members = self.roster.members().await;
                members.retain(|m| eligible.contains(&m.account));
                members
                    .into_iter()
                    .max_by_key(|m| (m.stake, Reverse(m.sequence)))
                    .map(|m| m.account)
                    .ok_or(ProtocolError::InsufficientEligible {
                        role: ParticipantRole::Worker,
                        required: 1,
                        available: 0,
                    })?
            }
        };

        self.escrow.assign_worker(task_id, worker, now).await?;
        debug!(
            task_id = %task_id,
            worker = %worker,
            policy = ?self.config.selection_policy,
            "Worker chosen by policy"
        );
        Ok(worker)
    }

    async fn record_outcome(&self, task_id: TaskId, worker: AccountAddress, success: bool) {
        if !self.outcomes_recorded.write().await.insert(task_id) {
            return;
        }
        self.performance
            .write()
            .await
            .entry(worker)
            .or_default()
            .record(success);
        self.roster.record_outcome(worker, success).await;
    }

    /// Settle a verified task and credit the worker. The registry is told the
    /// target's removal is complete; a failing notification does not undo the
    /// settlement.
    pub async fn complete_task(
        &self,
        task_id: TaskId,
        now: Timestamp,
    ) -> Result<SettlementReceipt> {
        let receipt = self.escrow.complete_task(task_id, now).await?;
        let task = self.escrow.task(task_id).await?;
        if let Some(worker) = task.worker {
            self.record_outcome(task_id, worker, true).await;
        }

        if let Err(e) = self.registry.removal_completed(task.target, task_id).await {
            warn!(
                task_id = %task_id,
                target = %task.target,
                error = %e,
                "Registry notification failed"
            );
        }
        Ok(receipt)
    }

    pub async fn mark_failed(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        reason: &str,
        now: Timestamp,
    ) -> Result<TaskView> {
        let task = self.escrow.mark_failed(task_id, caller, reason, now).await?;
        let Some(worker) = task.worker else {
            return Ok(task);
        };
        if caller == task.requester && now < task.deadline {
            // Cancelled by the requester: not the worker's failure, and the
            // later refund must not count it either
            self.outcomes_recorded.write().await.insert(task_id);
            debug!(
                task_id = %task_id,
                worker = %worker,
                "Requester cancellation, no worker outcome"
            );
        } else {
            self.record_outcome(task_id, worker, false).await;
        }
        Ok(task)
    }

    pub async fn refund(&self, task_id: TaskId, now: Timestamp) -> Result<SettlementReceipt> {
        let receipt = self.escrow.refund(task_id, now).await?;
        if let Some(worker) = self.escrow.task(task_id).await?.worker {
            self.record_outcome(task_id, worker, false).await;
        }
        Ok(receipt)
    }

    /// Unassigned `Created` tasks whose deadline has not passed.
    pub async fn available_tasks(&self, now: Timestamp) -> Vec<TaskView> {
        self.escrow
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.state == TaskState::Created && t.worker.is_none() && now < t.deadline)
            .collect()
    }

    pub async fn tasks_by_requester(&self, requester: AccountAddress) -> Vec<TaskView> {
        self.escrow
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.requester == requester)
            .collect()
    }

    pub async fn tasks_by_worker(&self, worker: AccountAddress) -> Vec<TaskView> {
        self.escrow
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.worker == Some(worker))
            .collect()
    }

    pub async fn worker(&self, account: AccountAddress) -> Option<WorkerRecord> {
        let member = self.roster.member(account).await?;
        let performance = self.performance.read().await;
        let perf = performance.get(&account).cloned().unwrap_or_default();
        Some(WorkerRecord {
            account,
            stake: member.stake,
            completed_tasks: perf.completed,
            failed_tasks: perf.failed,
            success_rate_bps: perf.success_rate_bps(),
            reputation: member.reputation,
            slashed: member.slashed,
            registered_at: member.registered_at,
        })
    }

    pub async fn workers(&self) -> Vec<WorkerRecord> {
        let mut records = Vec::new();
        for member in self.roster.members().await {
            if let Some(record) = self.worker(member.account).await {
                records.push(record);
            }
        }
        records
    }

    pub async fn get_stats(&self) -> FactoryStats {
        let stats = FactoryStats {
            workers: self.roster.get_stats().await,
            tasks_created: *self.tasks_created.read().await,
            fees_collected: *self.fees_collected.read().await,
        };
        info!(
            tasks_created = stats.tasks_created,
            workers = stats.workers.registered,
            "📊 Factory stats"
        );
        stats
    }
}

#[async_trait]
impl WorkerAccountability for TaskFactory {
    /// The task has already been failed by the bond stage and may have been
    /// refunded since; either way the worker pays once.
    async fn penalize_worker(&self, task_id: TaskId) -> Result<Option<SlashRecord>> {
        let task = self.escrow.task(task_id).await?;
        if !matches!(task.state, TaskState::Failed | TaskState::Refunded) {
            return Err(ProtocolError::InvalidTaskState {
                task_id,
                expected: "Failed or Refunded".to_string(),
                actual: task.state,
            });
        }
        let worker = task.worker.ok_or(ProtocolError::NoWorkerAssigned(task_id))?;

        let mut penalized = self.penalized.write().await;
        if penalized.contains(&task_id) {
            return Ok(None);
        }
        let record = self
            .roster
            .slash(
                worker,
                self.config.worker_slash_bps,
                self.slash_destination,
                "task verification overridden on appeal",
            )
            .await?;
        penalized.insert(task_id);
        drop(penalized);

        self.record_outcome(task_id, worker, false).await;
        debug!(
            task_id = %task_id,
            worker = %worker,
            slashed = record.is_some(),
            "Worker penalty applied"
        );
        Ok(record)
    }
}
