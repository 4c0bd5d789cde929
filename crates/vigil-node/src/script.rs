//! JSON scripts driving an in-memory protocol instance.
//!
//! Accounts are named by labels; each label maps to a fixed address. Task and
//! dispute ids are the plain numbers the protocol hands out, starting at 1.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vigil_beacon::SeededBeacon;
use vigil_ledger::{Ledger, MemoryLedger, MemoryRegistry};
use vigil_protocol::{
    vote_commitment, ArbitrationVote, CreateTask, Protocol, ProtocolError, ProtocolStats, Salt,
};
use vigil_types::{
    AccountAddress, Clock, DisputeId, ManualClock, SubjectCommitment, TargetEntityId, TaskId,
    Timestamp, TokenAmount,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
    }
}

fn default_true() -> bool {
    true
}

/// One operation. Amounts are decimal token strings such as `"50"` or `"0.5"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Mint {
        account: String,
        amount: TokenAmount,
    },
    /// Allow the protocol operator to pull from `owner`
    Approve {
        owner: String,
        amount: TokenAmount,
    },
    /// Mint plus approve
    Fund {
        account: String,
        amount: TokenAmount,
    },
    Advance {
        seconds: u64,
    },
    RegisterTarget {
        target: u64,
        weight: u32,
        #[serde(default = "default_true")]
        active: bool,
    },
    RegisterWorker {
        account: String,
        stake: TokenAmount,
    },
    ReregisterWorker {
        account: String,
        top_up: TokenAmount,
    },
    RegisterVerifier {
        account: String,
        stake: TokenAmount,
        #[serde(default)]
        description: String,
    },
    ReregisterVerifier {
        account: String,
        top_up: TokenAmount,
    },
    RegisterArbitrator {
        account: String,
        stake: TokenAmount,
        #[serde(default)]
        description: String,
    },
    ReregisterArbitrator {
        account: String,
        top_up: TokenAmount,
    },
    FundVerifierPool {
        funder: String,
        amount: TokenAmount,
    },
    FundArbitrationPool {
        funder: String,
        amount: TokenAmount,
    },
    CreateTask {
        requester: String,
        target: u64,
        /// Hashed before it reaches the protocol
        subject: String,
        payout: TokenAmount,
        duration: u64,
        #[serde(default)]
        worker: Option<String>,
    },
    AssignWorker {
        requester: String,
        task: u64,
        worker: String,
    },
    SelfAssign {
        worker: String,
        task: u64,
    },
    AutoAssignWorker {
        requester: String,
        task: u64,
    },
    MarkRequested {
        worker: String,
        task: u64,
        summary: String,
    },
    MarkResponded {
        worker: String,
        task: u64,
        summary: String,
    },
    SubmitEvidence {
        caller: String,
        task: u64,
        reference: String,
        summary: String,
    },
    StartVerificationSession {
        task: u64,
    },
    CastVerificationVote {
        verifier: String,
        task: u64,
        approve: bool,
    },
    /// Every panel member of the session votes the same way until it closes
    PanelVote {
        task: u64,
        approve: bool,
    },
    CompleteVerification {
        task: u64,
    },
    DistributeVerificationRewards {
        task: u64,
    },
    InitiateDispute {
        initiator: String,
        task: u64,
        reason: String,
        bond: TokenAmount,
    },
    CommitVote {
        arbitrator: String,
        dispute: u64,
        vote: ArbitrationVote,
        justification: String,
        /// Phrase the salt is derived from; reuse it for the reveal
        salt: String,
    },
    RevealVote {
        arbitrator: String,
        dispute: u64,
        vote: ArbitrationVote,
        justification: String,
        salt: String,
    },
    ResolveDispute {
        dispute: u64,
    },
    CompleteTask {
        task: u64,
    },
    MarkFailed {
        caller: String,
        task: u64,
        reason: String,
    },
    Refund {
        task: u64,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Mint { .. } => "mint",
            Step::Approve { .. } => "approve",
            Step::Fund { .. } => "fund",
            Step::Advance { .. } => "advance",
            Step::RegisterTarget { .. } => "register_target",
            Step::RegisterWorker { .. } => "register_worker",
            Step::ReregisterWorker { .. } => "reregister_worker",
            Step::RegisterVerifier { .. } => "register_verifier",
            Step::ReregisterVerifier { .. } => "reregister_verifier",
            Step::RegisterArbitrator { .. } => "register_arbitrator",
            Step::ReregisterArbitrator { .. } => "reregister_arbitrator",
            Step::FundVerifierPool { .. } => "fund_verifier_pool",
            Step::FundArbitrationPool { .. } => "fund_arbitration_pool",
            Step::CreateTask { .. } => "create_task",
            Step::AssignWorker { .. } => "assign_worker",
            Step::SelfAssign { .. } => "self_assign",
            Step::AutoAssignWorker { .. } => "auto_assign_worker",
            Step::MarkRequested { .. } => "mark_requested",
            Step::MarkResponded { .. } => "mark_responded",
            Step::SubmitEvidence { .. } => "submit_evidence",
            Step::StartVerificationSession { .. } => "start_verification_session",
            Step::CastVerificationVote { .. } => "cast_verification_vote",
            Step::PanelVote { .. } => "panel_vote",
            Step::CompleteVerification { .. } => "complete_verification",
            Step::DistributeVerificationRewards { .. } => "distribute_verification_rewards",
            Step::InitiateDispute { .. } => "initiate_dispute",
            Step::CommitVote { .. } => "commit_vote",
            Step::RevealVote { .. } => "reveal_vote",
            Step::ResolveDispute { .. } => "resolve_dispute",
            Step::CompleteTask { .. } => "complete_task",
            Step::MarkFailed { .. } => "mark_failed",
            Step::Refund { .. } => "refund",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: String,
    pub at: Timestamp,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptReport {
    pub description: String,
    pub steps: Vec<StepOutcome>,
    /// Index of the rejected step a strict run stopped at
    pub halted_at: Option<usize>,
    pub stats: ProtocolStats,
    pub balances: BTreeMap<String, TokenAmount>,
}

impl ScriptReport {
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

pub struct ScriptRunner {
    protocol: Protocol,
    ledger: MemoryLedger,
    registry: MemoryRegistry,
    clock: Arc<ManualClock>,
    labels: BTreeMap<String, AccountAddress>,
}

impl ScriptRunner {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let ledger = MemoryLedger::new();
        let registry = MemoryRegistry::new();
        let clock = Arc::new(ManualClock::new(config.simulation.start_time));
        let protocol = Protocol::new(
            config.protocol.clone(),
            Arc::new(ledger.clone()),
            Arc::new(registry.clone()),
            Arc::new(SeededBeacon::from_phrase(&config.simulation.beacon_seed)),
            clock.clone(),
        )
        .context("assembling protocol")?;

        Ok(Self {
            protocol,
            ledger,
            registry,
            clock,
            labels: BTreeMap::new(),
        })
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Address for `label`, remembered for the balance report.
    pub fn account(&mut self, label: &str) -> AccountAddress {
        *self
            .labels
            .entry(label.to_string())
            .or_insert_with(|| AccountAddress::from_label(label))
    }

    /// Run every step. A rejected step is recorded; in strict mode the run
    /// stops there.
    pub async fn run(&mut self, script: &Script, strict: bool) -> Result<ScriptReport> {
        info!(
            steps = script.steps.len(),
            strict,
            start = self.clock.now(),
            "▶️ Running script"
        );

        let mut outcomes = Vec::with_capacity(script.steps.len());
        let mut halted_at = None;
        for (index, step) in script.steps.iter().enumerate() {
            let at = self.clock.now();
            let outcome = match self.execute(step).await {
                Ok(result) => {
                    debug!(index, op = step.name(), "Step applied");
                    StepOutcome {
                        index,
                        op: step.name().to_string(),
                        at,
                        ok: true,
                        result: Some(result),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(index, op = step.name(), error = %e, "Step rejected");
                    StepOutcome {
                        index,
                        op: step.name().to_string(),
                        at,
                        ok: false,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            let rejected = !outcome.ok;
            outcomes.push(outcome);
            if rejected && strict {
                halted_at = Some(index);
                break;
            }
        }

        let report = ScriptReport {
            description: script.description.clone(),
            steps: outcomes,
            halted_at,
            stats: self.protocol.stats().await,
            balances: self.balances().await?,
        };
        info!(
            applied = report.steps.len() - report.rejected(),
            rejected = report.rejected(),
            "🏁 Script finished"
        );
        Ok(report)
    }

    async fn balances(&self) -> Result<BTreeMap<String, TokenAmount>> {
        let accounts = self.protocol.accounts();
        let mut named: Vec<(String, AccountAddress)> = self
            .labels
            .iter()
            .map(|(label, address)| (label.clone(), *address))
            .collect();
        named.push(("protocol:verifier_pool".to_string(), accounts.verifier_pool));
        named.push(("protocol:arbitration_pool".to_string(), accounts.arbitration_pool));
        named.push(("protocol:fee_collector".to_string(), accounts.fee_collector));

        let mut balances = BTreeMap::new();
        for (label, address) in named {
            balances.insert(label, self.ledger.balance_of(address).await?);
        }
        Ok(balances)
    }

    async fn execute(&mut self, step: &Step) -> Result<Value, ProtocolError> {
        let operator = self.protocol.accounts().operator;
        let value = match step {
            Step::Mint { account, amount } => {
                let account = self.account(account);
                self.ledger.mint(account, *amount).await?;
                json!({ "account": account })
            }
            Step::Approve { owner, amount } => {
                let owner = self.account(owner);
                self.ledger.approve(owner, operator, *amount).await?;
                json!({ "owner": owner, "spender": operator })
            }
            Step::Fund { account, amount } => {
                let account = self.account(account);
                self.ledger.mint(account, *amount).await?;
                let allowance = self.ledger.allowance(account, operator).await?;
                self.ledger
                    .approve(account, operator, allowance.saturating_add(*amount))
                    .await?;
                json!({ "account": account })
            }
            Step::Advance { seconds } => json!({ "now": self.clock.advance(*seconds) }),
            Step::RegisterTarget {
                target,
                weight,
                active,
            } => {
                self.registry
                    .register(TargetEntityId::new(*target), *weight, *active)
                    .await;
                json!({ "target": target, "weight": weight, "active": active })
            }
            Step::RegisterWorker { account, stake } => {
                let account = self.account(account);
                to_value(self.protocol.register_worker(account, *stake).await?)
            }
            Step::ReregisterWorker { account, top_up } => {
                let account = self.account(account);
                to_value(self.protocol.reregister_worker(account, *top_up).await?)
            }
            Step::RegisterVerifier {
                account,
                stake,
                description,
            } => {
                let account = self.account(account);
                to_value(
                    self.protocol
                        .register_verifier(account, *stake, description)
                        .await?,
                )
            }
            Step::ReregisterVerifier { account, top_up } => {
                let account = self.account(account);
                to_value(self.protocol.reregister_verifier(account, *top_up).await?)
            }
            Step::RegisterArbitrator {
                account,
                stake,
                description,
            } => {
                let account = self.account(account);
                to_value(
                    self.protocol
                        .register_arbitrator(account, *stake, description)
                        .await?,
                )
            }
            Step::ReregisterArbitrator { account, top_up } => {
                let account = self.account(account);
                to_value(self.protocol.reregister_arbitrator(account, *top_up).await?)
            }
            Step::FundVerifierPool { funder, amount } => {
                let funder = self.account(funder);
                self.protocol.fund_verifier_pool(funder, *amount).await?;
                json!({ "funder": funder })
            }
            Step::FundArbitrationPool { funder, amount } => {
                let funder = self.account(funder);
                self.protocol.fund_arbitration_pool(funder, *amount).await?;
                json!({ "funder": funder })
            }
            Step::CreateTask {
                requester,
                target,
                subject,
                payout,
                duration,
                worker,
            } => {
                let requester = self.account(requester);
                let worker = worker.as_deref().map(|w| self.account(w));
                let request = CreateTask {
                    target: TargetEntityId::new(*target),
                    subject: SubjectCommitment::commit(subject.as_bytes()),
                    payout: *payout,
                    duration: *duration,
                    worker,
                };
                to_value(self.protocol.create_task(requester, request).await?)
            }
            Step::AssignWorker {
                requester,
                task,
                worker,
            } => {
                let requester = self.account(requester);
                let worker = self.account(worker);
                self.protocol
                    .assign_worker(requester, TaskId::new(*task), worker)
                    .await?;
                json!({ "task": task, "worker": worker })
            }
            Step::SelfAssign { worker, task } => {
                let worker = self.account(worker);
                self.protocol.self_assign(worker, TaskId::new(*task)).await?;
                json!({ "task": task, "worker": worker })
            }
            Step::AutoAssignWorker { requester, task } => {
                let requester = self.account(requester);
                let worker = self
                    .protocol
                    .auto_assign_worker(requester, TaskId::new(*task))
                    .await?;
                json!({ "task": task, "worker": worker })
            }
            Step::MarkRequested {
                worker,
                task,
                summary,
            } => {
                let worker = self.account(worker);
                self.protocol
                    .mark_requested(worker, TaskId::new(*task), summary)
                    .await?;
                to_value(self.protocol.task(TaskId::new(*task)).await?)
            }
            Step::MarkResponded {
                worker,
                task,
                summary,
            } => {
                let worker = self.account(worker);
                self.protocol
                    .mark_responded(worker, TaskId::new(*task), summary)
                    .await?;
                to_value(self.protocol.task(TaskId::new(*task)).await?)
            }
            Step::SubmitEvidence {
                caller,
                task,
                reference,
                summary,
            } => {
                let caller = self.account(caller);
                self.protocol
                    .submit_evidence(caller, TaskId::new(*task), reference, summary)
                    .await?;
                json!({ "task": task, "reference": reference })
            }
            Step::StartVerificationSession { task } => {
                to_value(
                    self.protocol
                        .start_verification_session(TaskId::new(*task))
                        .await?,
                )
            }
            Step::CastVerificationVote {
                verifier,
                task,
                approve,
            } => {
                let verifier = self.account(verifier);
                to_value(
                    self.protocol
                        .cast_verification_vote(verifier, TaskId::new(*task), *approve)
                        .await?,
                )
            }
            Step::PanelVote { task, approve } => {
                let task_id = TaskId::new(*task);
                let session = self.protocol.session(task_id).await?;
                let mut last = session.clone();
                for member in session.panel() {
                    if last.is_completed() {
                        break;
                    }
                    last = self
                        .protocol
                        .cast_verification_vote(*member, task_id, *approve)
                        .await?;
                }
                to_value(last)
            }
            Step::CompleteVerification { task } => {
                to_value(
                    self.protocol
                        .complete_verification(TaskId::new(*task))
                        .await?,
                )
            }
            Step::DistributeVerificationRewards { task } => {
                let rewards = self
                    .protocol
                    .distribute_verification_rewards(TaskId::new(*task))
                    .await?;
                to_value(rewards)
            }
            Step::InitiateDispute {
                initiator,
                task,
                reason,
                bond,
            } => {
                let initiator = self.account(initiator);
                to_value(
                    self.protocol
                        .initiate_dispute(initiator, TaskId::new(*task), reason, *bond)
                        .await?,
                )
            }
            Step::CommitVote {
                arbitrator,
                dispute,
                vote,
                justification,
                salt,
            } => {
                let arbitrator = self.account(arbitrator);
                let dispute_id = DisputeId::new(*dispute);
                let commitment = vote_commitment(
                    dispute_id,
                    arbitrator,
                    *vote,
                    justification,
                    &Salt::from_phrase(salt),
                );
                let view = self
                    .protocol
                    .commit_vote(arbitrator, dispute_id, commitment)
                    .await?;
                json!({
                    "dispute": dispute,
                    "phase": view.phase,
                    "committed": view.committed_count(),
                })
            }
            Step::RevealVote {
                arbitrator,
                dispute,
                vote,
                justification,
                salt,
            } => {
                let arbitrator = self.account(arbitrator);
                to_value(
                    self.protocol
                        .reveal_vote(
                            arbitrator,
                            DisputeId::new(*dispute),
                            *vote,
                            justification,
                            &Salt::from_phrase(salt),
                        )
                        .await?,
                )
            }
            Step::ResolveDispute { dispute } => {
                to_value(self.protocol.resolve_dispute(DisputeId::new(*dispute)).await?)
            }
            Step::CompleteTask { task } => {
                to_value(self.protocol.complete_task(TaskId::new(*task)).await?)
            }
            Step::MarkFailed {
                caller,
                task,
                reason,
            } => {
                let caller = self.account(caller);
                to_value(
                    self.protocol
                        .mark_failed(caller, TaskId::new(*task), reason)
                        .await?,
                )
            }
            Step::Refund { task } => to_value(self.protocol.refund(TaskId::new(*task)).await?),
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
