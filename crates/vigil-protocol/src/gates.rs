//! Narrow capabilities components hold on each other, keyed by id.
//!
//! The committee sees the escrow only as a [`CompletionGate`]; arbitration
//! sees it as a [`DisputeGate`], the committee as [`PanelAccountability`]
//! and the factory as [`WorkerAccountability`]. Nothing points back up the
//! chain.

use crate::error::Result;
use crate::types::{BondSettlement, DisputeDecision, SlashRecord, TaskView};
use async_trait::async_trait;
use vigil_types::{AccountAddress, TaskId, Timestamp, TokenAmount};

#[async_trait]
pub trait TaskDirectory: Send + Sync {
    async fn task_view(&self, task_id: TaskId) -> Result<TaskView>;
}

#[async_trait]
pub trait CompletionGate: TaskDirectory {
    /// Flip a responded task to verified. Returns the end of the dispute window.
    async fn verify_completion(&self, task_id: TaskId, now: Timestamp) -> Result<Timestamp>;
}

#[async_trait]
pub trait DisputeGate: TaskDirectory {
    async fn open_dispute(
        &self,
        task_id: TaskId,
        initiator: AccountAddress,
        reason: &str,
        bond: TokenAmount,
        now: Timestamp,
    ) -> Result<()>;

    async fn settle_dispute(
        &self,
        task_id: TaskId,
        decision: DisputeDecision,
        now: Timestamp,
    ) -> Result<BondSettlement>;
}

#[async_trait]
pub trait PanelAccountability: Send + Sync {
    /// Verifiers on the task's panel, empty when no session exists.
    async fn panel_members(&self, task_id: TaskId) -> Result<Vec<AccountAddress>>;

    /// Slash panel members whose vote disagrees with the appeal decision.
    /// Runs at most once per task.
    async fn handle_dispute_resolution(
        &self,
        task_id: TaskId,
        decision: DisputeDecision,
        now: Timestamp,
    ) -> Result<Vec<SlashRecord>>;
}

#[async_trait]
pub trait WorkerAccountability: Send + Sync {
    /// Slash the worker of a task whose verification was overridden on
    /// appeal. Runs at most once per task; later calls return `None`.
    async fn penalize_worker(&self, task_id: TaskId) -> Result<Option<SlashRecord>>;
}
