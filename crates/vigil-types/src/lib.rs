pub mod address;
pub mod amount;
pub mod error;
pub mod id;
pub mod time;

pub use address::{AccountAddress, SubjectCommitment};
pub use amount::{TokenAmount, BPS_DENOMINATOR, TOKEN_BASE_UNIT, TOKEN_DECIMALS};
pub use error::{Result, TypesError};
pub use id::{DisputeId, IdAllocator, TargetEntityId, TaskId};
pub use time::{Clock, ManualClock, SystemClock, Timestamp, DAY, HOUR};
