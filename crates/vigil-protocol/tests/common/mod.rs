#![allow(dead_code)]

use std::sync::Arc;
use vigil_beacon::SeededBeacon;
use vigil_ledger::{Ledger, MemoryLedger, MemoryRegistry};
use vigil_protocol::{
    ArbitrationVote, CreateTask, DisputeView, Protocol, ProtocolConfig, SealedVote,
};
use vigil_types::{
    AccountAddress, ManualClock, SubjectCommitment, TargetEntityId, TaskId, Timestamp,
    TokenAmount, DAY,
};

pub const START: Timestamp = 1_700_000_000;

pub fn tokens(n: u64) -> TokenAmount {
    TokenAmount::from_tokens(n)
}

pub fn account(label: &str) -> AccountAddress {
    AccountAddress::from_label(label)
}

pub struct Harness {
    pub protocol: Protocol,
    pub ledger: MemoryLedger,
    pub registry: MemoryRegistry,
    pub clock: Arc<ManualClock>,
    pub requester: AccountAddress,
    pub worker: AccountAddress,
    pub target: TargetEntityId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(ProtocolConfig::default()).await
    }

    pub async fn with_config(config: ProtocolConfig) -> Self {
        let ledger = MemoryLedger::new();
        let registry = MemoryRegistry::new();
        let clock = Arc::new(ManualClock::new(START));
        let protocol = Protocol::new(
            config,
            Arc::new(ledger.clone()),
            Arc::new(registry.clone()),
            Arc::new(SeededBeacon::from_phrase("vigil test beacon")),
            clock.clone(),
        )
        .unwrap();

        let target = TargetEntityId::new(1);
        registry.register(target, 100, true).await;

        let harness = Self {
            protocol,
            ledger,
            registry,
            clock,
            requester: account("requester"),
            worker: account("worker"),
            target,
        };
        harness.fund(harness.requester, tokens(1_000)).await;
        harness.fund(harness.worker, tokens(1_000)).await;
        harness
            .protocol
            .register_worker(harness.worker, tokens(50))
            .await
            .unwrap();
        harness
    }

    /// Mint and approve the protocol operator to pull it.
    pub async fn fund(&self, account: AccountAddress, amount: TokenAmount) {
        self.ledger.mint(account, amount).await.unwrap();
        self.ledger
            .approve(account, self.protocol.accounts().operator, tokens(1_000_000))
            .await
            .unwrap();
    }

    pub async fn balance(&self, account: AccountAddress) -> TokenAmount {
        self.ledger.balance_of(account).await.unwrap()
    }

    pub fn advance(&self, seconds: u64) -> Timestamp {
        self.clock.advance(seconds)
    }

    pub async fn register_verifiers(&self, n: usize) -> Vec<AccountAddress> {
        let mut out = Vec::new();
        for i in 0..n {
            let verifier = account(&format!("verifier-{i}"));
            self.fund(verifier, tokens(1_000)).await;
            self.protocol
                .register_verifier(verifier, tokens(100), "field reviewer")
                .await
                .unwrap();
            out.push(verifier);
        }
        self.fund(account("sponsor"), tokens(10_000)).await;
        self.protocol
            .fund_verifier_pool(account("sponsor"), tokens(500))
            .await
            .unwrap();
        out
    }

    pub async fn register_arbitrators(&self, n: usize) -> Vec<AccountAddress> {
        let mut out = Vec::new();
        for i in 0..n {
            let arbitrator = account(&format!("arbitrator-{i}"));
            self.fund(arbitrator, tokens(2_000)).await;
            self.protocol
                .register_arbitrator(arbitrator, tokens(500), "appeals")
                .await
                .unwrap();
            out.push(arbitrator);
        }
        self.fund(account("court-sponsor"), tokens(10_000)).await;
        self.protocol
            .fund_arbitration_pool(account("court-sponsor"), tokens(500))
            .await
            .unwrap();
        out
    }

    pub async fn create_task(&self, payout: u64, duration: u64) -> TaskId {
        self.protocol
            .create_task(
                self.requester,
                CreateTask {
                    target: self.target,
                    subject: SubjectCommitment::commit(b"remove listing 42"),
                    payout: tokens(payout),
                    duration,
                    worker: None,
                },
            )
            .await
            .unwrap()
            .task_id
    }

    /// Scenario A up to the point where verifiers vote.
    pub async fn responded_task(&self) -> TaskId {
        let task_id = self.create_task(50, 30 * DAY).await;
        self.protocol
            .assign_worker(self.requester, task_id, self.worker)
            .await
            .unwrap();
        self.protocol
            .mark_requested(self.worker, task_id, "removal request sent")
            .await
            .unwrap();
        self.protocol
            .submit_evidence(self.worker, task_id, "bafy-request-receipt", "request receipt")
            .await
            .unwrap();
        self.protocol
            .mark_responded(self.worker, task_id, "provider confirmed removal")
            .await
            .unwrap();
        task_id
    }

    /// Verified task with its session panel, every member voting approve until
    /// the session closes.
    pub async fn verified_task(&self) -> (TaskId, Vec<AccountAddress>) {
        let task_id = self.responded_task().await;
        let session = self
            .protocol
            .start_verification_session(task_id)
            .await
            .unwrap();
        let panel = session.draw.members.clone();
        for verifier in &panel {
            let view = self
                .protocol
                .cast_verification_vote(*verifier, task_id, true)
                .await
                .unwrap();
            if view.status.approved().is_some() {
                break;
            }
        }
        (task_id, panel)
    }

    /// Commit then reveal the given votes, one per panel member in order.
    pub async fn vote_dispute(&self, dispute: &DisputeView, votes: &[ArbitrationVote]) {
        let panel = dispute.panel().to_vec();
        let sealed: Vec<SealedVote> = votes
            .iter()
            .map(|v| SealedVote::new(*v, "reviewed the evidence"))
            .collect();
        for (arbitrator, vote) in panel.iter().zip(&sealed) {
            self.protocol
                .commit_vote(
                    *arbitrator,
                    dispute.dispute_id,
                    vote.commitment(dispute.dispute_id, *arbitrator),
                )
                .await
                .unwrap();
        }
        for (arbitrator, vote) in panel.iter().zip(&sealed) {
            self.protocol
                .reveal_vote(
                    *arbitrator,
                    dispute.dispute_id,
                    vote.vote,
                    &vote.justification,
                    &vote.salt,
                )
                .await
                .unwrap();
        }
    }
}
