// Storage module - PERSISTENCE
// Handles persistent key-value storage of engine snapshots using sled

mod store;

pub use store::{EscrowStore, StorageStats, StoreError};
