use crate::arbitration::{
    ArbitrationStats, DisputeArbitration, DisputeResolution, DisputeView, RevealReceipt,
};
use crate::commitment::Salt;
use crate::committee::{CommitteeStats, SessionView, VerifierCommittee};
use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::escrow::{EscrowBook, EscrowStats};
use crate::events::{EventBus, ProtocolEvent};
use crate::factory::{CreateTask, FactoryStats, TaskFactory, WorkerRecord};
use crate::gates::{CompletionGate, DisputeGate, PanelAccountability, WorkerAccountability};
use crate::roster::RosterMember;
use crate::types::{ArbitrationVote, SettlementReceipt, TaskView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vigil_beacon::RandomnessSource;
use vigil_ledger::{Ledger, TargetRegistry};
use vigil_types::{AccountAddress, Clock, DisputeId, TaskId, Timestamp, TokenAmount};

/// Accounts owned by the protocol itself. Users approve `operator` before
/// any call that pulls their funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAccounts {
    pub operator: AccountAddress,
    pub verifier_pool: AccountAddress,
    pub verifier_vault: AccountAddress,
    pub arbitration_pool: AccountAddress,
    pub arbitrator_vault: AccountAddress,
    pub worker_vault: AccountAddress,
    pub fee_collector: AccountAddress,
}

impl ProtocolAccounts {
    pub fn derive() -> Self {
        Self {
            operator: AccountAddress::derive("vigil/operator", 0),
            verifier_pool: AccountAddress::derive("vigil/verifier-pool", 0),
            verifier_vault: AccountAddress::derive("vigil/verifier-stakes", 0),
            arbitration_pool: AccountAddress::derive("vigil/arbitration-pool", 0),
            arbitrator_vault: AccountAddress::derive("vigil/arbitrator-stakes", 0),
            worker_vault: AccountAddress::derive("vigil/worker-stakes", 0),
            fee_collector: AccountAddress::derive("vigil/fee-collector", 0),
        }
    }
}

impl Default for ProtocolAccounts {
    fn default() -> Self {
        Self::derive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub now: Timestamp,
    pub escrow: EscrowStats,
    pub committee: CommitteeStats,
    pub arbitration: ArbitrationStats,
    pub factory: FactoryStats,
}

/// The assembled protocol. Every operation reads the clock once and hands
/// the same instant to each component it touches.
pub struct Protocol {
    config: ProtocolConfig,
    accounts: ProtocolAccounts,
    clock: Arc<dyn Clock>,
    escrow: Arc<EscrowBook>,
    committee: Arc<VerifierCommittee>,
    arbitration: Arc<DisputeArbitration>,
    factory: Arc<TaskFactory>,
}

impl Protocol {
    pub fn new(
        config: ProtocolConfig,
        ledger: Arc<dyn Ledger>,
        registry: Arc<dyn TargetRegistry>,
        beacon: Arc<dyn RandomnessSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::build(config, ledger, registry, beacon, clock, EventBus::disabled())
    }

    /// Like [`Protocol::new`], also returning the stream of emitted events.
    pub fn with_events(
        config: ProtocolConfig,
        ledger: Arc<dyn Ledger>,
        registry: Arc<dyn TargetRegistry>,
        beacon: Arc<dyn RandomnessSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ProtocolEvent>)> {
        let (events, rx) = EventBus::channel();
        let protocol = Self::build(config, ledger, registry, beacon, clock, events)?;
        Ok((protocol, rx))
    }

    fn build(
        config: ProtocolConfig,
        ledger: Arc<dyn Ledger>,
        registry: Arc<dyn TargetRegistry>,
        beacon: Arc<dyn RandomnessSource>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        let accounts = ProtocolAccounts::derive();

        let escrow = Arc::new(EscrowBook::new(
            config.escrow.clone(),
            ledger.clone(),
            accounts.operator,
            accounts.verifier_pool,
            accounts.arbitration_pool,
            events.clone(),
        ));
        let committee = Arc::new(VerifierCommittee::new(
            config.committee.clone(),
            escrow.clone() as Arc<dyn CompletionGate>,
            beacon.clone(),
            ledger.clone(),
            accounts.verifier_pool,
            accounts.verifier_vault,
            accounts.operator,
            events.clone(),
        ));
        let factory = Arc::new(TaskFactory::new(
            config.factory.clone(),
            escrow.clone(),
            registry,
            ledger.clone(),
            accounts.fee_collector,
            accounts.worker_vault,
            accounts.verifier_pool,
            accounts.operator,
            events.clone(),
        ));
        let arbitration = Arc::new(DisputeArbitration::new(
            config.arbitration.clone(),
            escrow.clone() as Arc<dyn DisputeGate>,
            committee.clone() as Arc<dyn PanelAccountability>,
            factory.clone() as Arc<dyn WorkerAccountability>,
            beacon,
            ledger,
            accounts.arbitration_pool,
            accounts.arbitrator_vault,
            accounts.operator,
            events,
        ));

        info!(
            operator = %accounts.operator,
            panel_size = config.committee.panel_size,
            arbitration_panel = config.arbitration.panel_size,
            "🚀 Protocol assembled"
        );

        Ok(Self {
            config,
            accounts,
            clock,
            escrow,
            committee,
            arbitration,
            factory,
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn accounts(&self) -> &ProtocolAccounts {
        &self.accounts
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn escrow(&self) -> &Arc<EscrowBook> {
        &self.escrow
    }

    pub fn committee(&self) -> &Arc<VerifierCommittee> {
        &self.committee
    }

    pub fn arbitration(&self) -> &Arc<DisputeArbitration> {
        &self.arbitration
    }

    pub fn factory(&self) -> &Arc<TaskFactory> {
        &self.factory
    }

    // Tasks

    pub async fn create_task(
        &self,
        requester: AccountAddress,
        request: CreateTask,
    ) -> Result<TaskView> {
        self.factory.create_task(requester, request, self.now()).await
    }

    pub async fn assign_worker(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        worker: AccountAddress,
    ) -> Result<()> {
        self.factory
            .assign_worker(caller, task_id, worker, self.now())
            .await
    }

    pub async fn self_assign(&self, worker: AccountAddress, task_id: TaskId) -> Result<()> {
        self.factory.self_assign(worker, task_id, self.now()).await
    }

    pub async fn auto_assign_worker(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
    ) -> Result<AccountAddress> {
        self.factory
            .auto_assign_worker(caller, task_id, self.now())
            .await
    }

    pub async fn mark_requested(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        summary: &str,
    ) -> Result<()> {
        self.escrow
            .mark_requested(task_id, caller, summary, self.now())
            .await
    }

    pub async fn mark_responded(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        summary: &str,
    ) -> Result<()> {
        self.escrow
            .mark_responded(task_id, caller, summary, self.now())
            .await
    }

    /// The worker or a member of the task's verification panel may attach
    /// evidence.
    pub async fn submit_evidence(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        reference: &str,
        summary: &str,
    ) -> Result<()> {
        let now = self.now();
        let panel = self
            .committee
            .panel_members(task_id)
            .await
            .unwrap_or_default();
        self.escrow
            .submit_evidence(task_id, caller, reference, summary, &panel, now)
            .await
    }

    pub async fn complete_task(&self, task_id: TaskId) -> Result<SettlementReceipt> {
        self.factory.complete_task(task_id, self.now()).await
    }

    pub async fn mark_failed(
        &self,
        caller: AccountAddress,
        task_id: TaskId,
        reason: &str,
    ) -> Result<TaskView> {
        let now = self.now();
        let task = self.factory.mark_failed(caller, task_id, reason, now).await?;
        self.close_abandoned_session(task_id, now).await;
        Ok(task)
    }

    pub async fn refund(&self, task_id: TaskId) -> Result<SettlementReceipt> {
        let now = self.now();
        let receipt = self.factory.refund(task_id, now).await?;
        self.close_abandoned_session(task_id, now).await;
        Ok(receipt)
    }

    /// A task that left `Responded` without a verdict takes its open session
    /// with it. The task transition already stands, so a failure is logged.
    async fn close_abandoned_session(&self, task_id: TaskId, now: Timestamp) {
        if let Err(e) = self.committee.abandon_session(task_id, now).await {
            warn!(
                task_id = %task_id,
                error = %e,
                "Open verification session not closed"
            );
        }
    }

    // Workers

    pub async fn register_worker(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
    ) -> Result<WorkerRecord> {
        self.factory.register_worker(account, stake, self.now()).await
    }

    pub async fn reregister_worker(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
    ) -> Result<WorkerRecord> {
        self.factory
            .reregister_worker(account, top_up, self.now())
            .await
    }

    // Verification

    pub async fn register_verifier(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        description: &str,
    ) -> Result<RosterMember> {
        self.committee
            .register_verifier(account, stake, description, self.now())
            .await
    }

    pub async fn reregister_verifier(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
    ) -> Result<RosterMember> {
        self.committee
            .reregister_verifier(account, top_up, self.now())
            .await
    }

    pub async fn fund_verifier_pool(
        &self,
        funder: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.committee.fund_reward_pool(funder, amount).await
    }

    pub async fn start_verification_session(&self, task_id: TaskId) -> Result<SessionView> {
        self.committee.start_session(task_id, self.now()).await
    }

    pub async fn cast_verification_vote(
        &self,
        verifier: AccountAddress,
        task_id: TaskId,
        approve: bool,
    ) -> Result<SessionView> {
        self.committee
            .cast_vote(task_id, verifier, approve, self.now())
            .await
    }

    pub async fn complete_verification(&self, task_id: TaskId) -> Result<SessionView> {
        self.committee
            .complete_verification(task_id, self.now())
            .await
    }

    pub async fn distribute_verification_rewards(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<(AccountAddress, TokenAmount)>> {
        self.committee.distribute_rewards(task_id).await
    }

    // Appeals

    pub async fn register_arbitrator(
        &self,
        account: AccountAddress,
        stake: TokenAmount,
        description: &str,
    ) -> Result<RosterMember> {
        self.arbitration
            .register_arbitrator(account, stake, description, self.now())
            .await
    }

    pub async fn reregister_arbitrator(
        &self,
        account: AccountAddress,
        top_up: TokenAmount,
    ) -> Result<RosterMember> {
        self.arbitration
            .reregister_arbitrator(account, top_up, self.now())
            .await
    }

    pub async fn fund_arbitration_pool(
        &self,
        funder: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        self.arbitration.fund_pool(funder, amount).await
    }

    pub async fn initiate_dispute(
        &self,
        initiator: AccountAddress,
        task_id: TaskId,
        reason: &str,
        bond: TokenAmount,
    ) -> Result<DisputeView> {
        self.arbitration
            .create_dispute(task_id, initiator, reason, bond, self.now())
            .await
    }

    pub async fn commit_vote(
        &self,
        arbitrator: AccountAddress,
        dispute_id: DisputeId,
        commitment: [u8; 32],
    ) -> Result<DisputeView> {
        self.arbitration
            .commit_vote(dispute_id, arbitrator, commitment, self.now())
            .await
    }

    pub async fn reveal_vote(
        &self,
        arbitrator: AccountAddress,
        dispute_id: DisputeId,
        vote: ArbitrationVote,
        justification: &str,
        salt: &Salt,
    ) -> Result<RevealReceipt> {
        self.arbitration
            .reveal_vote(dispute_id, arbitrator, vote, justification, salt, self.now())
            .await
    }

    /// Force resolution after the reveal deadline, or finish a settlement
    /// that stopped part way.
    pub async fn resolve_dispute(&self, dispute_id: DisputeId) -> Result<DisputeResolution> {
        self.arbitration
            .resolve_dispute(dispute_id, self.now())
            .await
    }

    // Queries

    pub async fn task(&self, task_id: TaskId) -> Result<TaskView> {
        self.escrow.task(task_id).await
    }

    pub async fn tasks(&self) -> Vec<TaskView> {
        self.escrow.tasks().await
    }

    pub async fn available_tasks(&self) -> Vec<TaskView> {
        self.factory.available_tasks(self.now()).await
    }

    pub async fn tasks_by_requester(&self, requester: AccountAddress) -> Vec<TaskView> {
        self.factory.tasks_by_requester(requester).await
    }

    pub async fn tasks_by_worker(&self, worker: AccountAddress) -> Vec<TaskView> {
        self.factory.tasks_by_worker(worker).await
    }

    pub async fn session(&self, task_id: TaskId) -> Result<SessionView> {
        self.committee.session(task_id).await
    }

    pub async fn dispute(&self, dispute_id: DisputeId) -> Result<DisputeView> {
        self.arbitration.dispute(dispute_id).await
    }

    pub async fn dispute_for_task(&self, task_id: TaskId) -> Option<DisputeView> {
        self.arbitration.dispute_for_task(task_id).await
    }

    pub async fn worker(&self, account: AccountAddress) -> Option<WorkerRecord> {
        self.factory.worker(account).await
    }

    pub async fn workers(&self) -> Vec<WorkerRecord> {
        self.factory.workers().await
    }

    pub async fn verifier(&self, account: AccountAddress) -> Option<RosterMember> {
        self.committee.verifier(account).await
    }

    pub async fn verifiers(&self) -> Vec<RosterMember> {
        self.committee.verifiers().await
    }

    pub async fn arbitrator(&self, account: AccountAddress) -> Option<RosterMember> {
        self.arbitration.arbitrator(account).await
    }

    pub async fn arbitrators(&self) -> Vec<RosterMember> {
        self.arbitration.arbitrators().await
    }

    pub async fn stats(&self) -> ProtocolStats {
        ProtocolStats {
            now: self.now(),
            escrow: self.escrow.get_stats().await,
            committee: self.committee.get_stats().await,
            arbitration: self.arbitration.get_stats().await,
            factory: self.factory.get_stats().await,
        }
    }
}
