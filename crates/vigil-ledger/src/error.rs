use thiserror::Error;
use vigil_types::{AccountAddress, TargetEntityId, TokenAmount};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account}: has {available}, needs {needed}")]
    InsufficientBalance {
        account: AccountAddress,
        available: TokenAmount,
        needed: TokenAmount,
    },

    #[error("Insufficient allowance from {owner} to {spender}: approved {available}, needs {needed}")]
    InsufficientAllowance {
        owner: AccountAddress,
        spender: AccountAddress,
        available: TokenAmount,
        needed: TokenAmount,
    },

    #[error("Balance overflow for {0}")]
    Overflow(AccountAddress),

    #[error("Unknown target entity {0}")]
    UnknownTarget(TargetEntityId),

    #[error("Ledger backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
