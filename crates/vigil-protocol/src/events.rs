use crate::types::{ArbitrationVote, DisputeDecision, ParticipantRole, TaskState};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vigil_types::{AccountAddress, DisputeId, TaskId, Timestamp, TokenAmount};

/// Emitted after every successful state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    TaskCreated {
        task_id: TaskId,
        requester: AccountAddress,
        payout: TokenAmount,
        fee: TokenAmount,
        deadline: Timestamp,
    },
    WorkerAssigned {
        task_id: TaskId,
        worker: AccountAddress,
    },
    TaskStateChanged {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
        at: Timestamp,
    },
    EvidenceSubmitted {
        task_id: TaskId,
        submitter: AccountAddress,
        reference: String,
    },
    FundsReleased {
        task_id: TaskId,
        recipient: AccountAddress,
        amount: TokenAmount,
    },
    ParticipantRegistered {
        role: ParticipantRole,
        account: AccountAddress,
        stake: TokenAmount,
    },
    StakeSlashed {
        role: ParticipantRole,
        account: AccountAddress,
        amount: TokenAmount,
        reason: String,
    },
    SessionStarted {
        task_id: TaskId,
        panel: Vec<AccountAddress>,
        deadline: Timestamp,
    },
    VerificationVoteCast {
        task_id: TaskId,
        verifier: AccountAddress,
        approve: bool,
    },
    SessionCompleted {
        task_id: TaskId,
        approved: bool,
    },
    RewardsDistributed {
        task_id: TaskId,
        recipients: usize,
        total: TokenAmount,
    },
    DisputeCreated {
        dispute_id: DisputeId,
        task_id: TaskId,
        initiator: AccountAddress,
        bond: TokenAmount,
    },
    VoteCommitted {
        dispute_id: DisputeId,
        arbitrator: AccountAddress,
    },
    VoteRevealed {
        dispute_id: DisputeId,
        arbitrator: AccountAddress,
        vote: ArbitrationVote,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        task_id: TaskId,
        decision: DisputeDecision,
    },
}

/// Optional sink for [`ProtocolEvent`]s. Cloned into every component.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    tx: Option<mpsc::UnboundedSender<ProtocolEvent>>,
}

impl EventBus {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ProtocolEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_delivered() {
        let (bus, mut rx) = EventBus::channel();
        bus.emit(ProtocolEvent::SessionCompleted {
            task_id: TaskId::new(1),
            approved: true,
        });

        assert_eq!(
            rx.recv().await,
            Some(ProtocolEvent::SessionCompleted {
                task_id: TaskId::new(1),
                approved: true
            })
        );
    }

    #[test]
    fn test_disabled_bus_is_silent() {
        EventBus::disabled().emit(ProtocolEvent::WorkerAssigned {
            task_id: TaskId::new(1),
            worker: AccountAddress::from_label("w"),
        });
    }
}
