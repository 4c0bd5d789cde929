//! Escrow, verification and appeal protocol for paid real-world tasks.
//!
//! A requester funds a task through the [`TaskFactory`], a staked worker
//! performs it and attaches evidence, a [`VerifierCommittee`] panel votes on
//! completion and a [`DisputeArbitration`] panel can overturn that vote through
//! a commit-reveal appeal. Funds held for a task are released exactly once.
//!
//! [`Protocol`] wires the components together and reads the injected clock
//! once per operation.

pub mod arbitration;
pub mod commitment;
pub mod committee;
pub mod config;
pub mod error;
pub mod escrow;
pub mod events;
pub mod factory;
pub mod gates;
pub mod protocol;
pub mod roster;
pub mod types;

pub use arbitration::{
    ArbitrationStats, Ballot, DisputeArbitration, DisputePhase, DisputeResolution, DisputeView,
    RevealReceipt,
};
pub use commitment::{vote_commitment, Salt, SealedVote};
pub use committee::{CommitteeStats, SessionStatus, SessionTally, SessionView, VerifierCommittee};
pub use config::{
    ArbitrationConfig, CommitteeConfig, EscrowConfig, FactoryConfig, ProtocolConfig,
    SelectionPolicy,
};
pub use error::{ProtocolError, Result};
pub use escrow::{EscrowBook, EscrowStats, NewTask, TaskEscrow};
pub use events::{EventBus, ProtocolEvent};
pub use factory::{CreateTask, FactoryStats, TaskFactory, WorkerRecord};
pub use gates::{
    CompletionGate, DisputeGate, PanelAccountability, TaskDirectory, WorkerAccountability,
};
pub use protocol::{Protocol, ProtocolAccounts, ProtocolStats};
pub use roster::{RosterMember, RosterStats, StakedRoster};
pub use types::{
    ArbitrationVote, BondSettlement, DisputeDecision, EvidenceEntry, ParticipantRole, Payout,
    PayoutKind, ProgressNote, SettlementReceipt, SlashRecord, TaskState, TaskView,
};
