use crate::arbitration::DisputePhase;
use crate::types::{ParticipantRole, TaskState};
use thiserror::Error;
use vigil_beacon::BeaconError;
use vigil_ledger::LedgerError;
use vigil_types::{AccountAddress, DisputeId, TargetEntityId, TaskId, Timestamp, TokenAmount};

/// Every rejection names the precondition that failed. A rejected call leaves
/// no partial state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("No verification session for {0}")]
    SessionNotFound(TaskId),

    #[error("Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    #[error("Invalid task state for {task_id}: expected {expected}, got {actual:?}")]
    InvalidTaskState {
        task_id: TaskId,
        expected: String,
        actual: TaskState,
    },

    #[error("{caller} is not allowed to {action}")]
    Unauthorized {
        caller: AccountAddress,
        action: &'static str,
    },

    #[error("Deadline exceeded: deadline {deadline}, current {current}")]
    DeadlineExceeded { deadline: Timestamp, current: Timestamp },

    #[error("Deadline not reached: deadline {deadline}, current {current}")]
    DeadlineNotReached { deadline: Timestamp, current: Timestamp },

    #[error("{what} below minimum: required {minimum}, provided {provided}")]
    BelowMinimum {
        what: &'static str,
        minimum: TokenAmount,
        provided: TokenAmount,
    },

    #[error("Duration {duration}s outside [{min}s, {max}s]")]
    DurationOutOfBounds { duration: u64, min: u64, max: u64 },

    #[error("Target entity {0} is not active")]
    TargetInactive(TargetEntityId),

    #[error("Worker already assigned to {0}")]
    WorkerAlreadyAssigned(TaskId),

    #[error("No worker assigned to {0}")]
    NoWorkerAssigned(TaskId),

    #[error("Requester cannot work on their own task")]
    WorkerIsRequester,

    #[error("Task {0} has no evidence")]
    NoEvidence(TaskId),

    #[error("Task {task_id} already holds {limit} evidence entries")]
    EvidenceLimit { task_id: TaskId, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dispute window for {task_id} closed at {window_end} (now {current})")]
    DisputeWindowClosed {
        task_id: TaskId,
        window_end: Timestamp,
        current: Timestamp,
    },

    #[error("Dispute window for {task_id} open until {window_end} (now {current})")]
    DisputeWindowOpen {
        task_id: TaskId,
        window_end: Timestamp,
        current: Timestamp,
    },

    #[error("Task {0} has already been disputed")]
    DisputeAlreadyRaised(TaskId),

    #[error("Task {0} is already settled")]
    AlreadySettled(TaskId),

    #[error("{0} is busy with another operation")]
    ResourceBusy(String),

    #[error("{account} is not a registered {role}")]
    NotRegistered {
        role: ParticipantRole,
        account: AccountAddress,
    },

    #[error("{account} is already a registered {role}")]
    AlreadyRegistered {
        role: ParticipantRole,
        account: AccountAddress,
    },

    #[error("{account} is a slashed {role}")]
    ParticipantSlashed {
        role: ParticipantRole,
        account: AccountAddress,
    },

    #[error("{account} is not a slashed {role}")]
    NotSlashed {
        role: ParticipantRole,
        account: AccountAddress,
    },

    #[error("Not enough eligible {role}s: required {required}, available {available}")]
    InsufficientEligible {
        role: ParticipantRole,
        required: usize,
        available: usize,
    },

    #[error("{0} already has a verification session")]
    SessionExists(TaskId),

    #[error("Verification session for {0} is completed")]
    SessionCompleted(TaskId),

    #[error("Verification session for {0} is still open")]
    SessionOpen(TaskId),

    #[error("{account} is not on the panel")]
    NotPanelMember { account: AccountAddress },

    #[error("{account} has already voted")]
    AlreadyVoted { account: AccountAddress },

    #[error("Rewards for {0} were already distributed")]
    RewardsAlreadyDistributed(TaskId),

    #[error("Reward pool exhausted: needs {needed}, holds {available}")]
    RewardPoolExhausted {
        needed: TokenAmount,
        available: TokenAmount,
    },

    #[error("Dispute {dispute_id} is in {actual:?} phase, expected {expected:?}")]
    WrongPhase {
        dispute_id: DisputeId,
        expected: DisputePhase,
        actual: DisputePhase,
    },

    #[error("{account} has already committed")]
    AlreadyCommitted { account: AccountAddress },

    #[error("{account} has no commitment to reveal")]
    NotCommitted { account: AccountAddress },

    #[error("{account} has already revealed")]
    AlreadyRevealed { account: AccountAddress },

    #[error("Reveal by {account} does not match commitment on {dispute_id}")]
    CommitmentMismatch {
        dispute_id: DisputeId,
        account: AccountAddress,
    },

    #[error("Dispute {0} is already resolved")]
    DisputeResolved(DisputeId),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Beacon error: {0}")]
    Beacon(#[from] BeaconError),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
