pub mod error;
pub mod ledger;
pub mod memory;
pub mod registry;

pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use memory::{MemoryLedger, TransferKind, TransferRecord};
pub use registry::{MemoryRegistry, RemovalNotice, TargetRegistry, TargetStatus};
