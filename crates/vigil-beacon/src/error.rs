use thiserror::Error;
use vigil_types::AccountAddress;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    #[error("No finalized beacon round available")]
    NoFinalizedRound,

    #[error("Round {round} is already finalized")]
    RoundFinalized { round: u64 },

    #[error("Round {round} is not open for contributions")]
    RoundNotOpen { round: u64 },

    #[error("Contributor {contributor} already committed in round {round}")]
    DuplicateCommitment {
        round: u64,
        contributor: AccountAddress,
    },

    #[error("Contributor {contributor} has no commitment in round {round}")]
    MissingCommitment {
        round: u64,
        contributor: AccountAddress,
    },

    #[error("Reveal does not match commitment for {contributor}")]
    RevealMismatch { contributor: AccountAddress },

    #[error("Round {round} has no revealed contributions")]
    NoContributions { round: u64 },

    #[error("Panel of {requested} requested from {available} candidates")]
    NotEnoughCandidates { requested: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, BeaconError>;
