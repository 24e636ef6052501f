// Effects module - THE OUTSIDE WORLD
// Collaborator contracts (ledger, clock, custody) and in-memory implementations

mod memory;
mod traits;

pub use memory::{ManualClock, MemoryCustody, MemoryLedger, SystemClock, TransferRecord};
pub use traits::{
    Amount, AssetCustody, Clock, CustodyError, Effect, EffectError, EffectRunner, Ledger,
    Timestamp, TransferError,
};
