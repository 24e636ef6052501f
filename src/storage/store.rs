// EscrowStore - Persistent key-value storage using sled
//
// Provides typed access for storing:
// - Approval ledger snapshots
// - Auction engine snapshots, one per auction name

use crate::approval::{ApprovalError, ApprovalLedger, LedgerSnapshot};
use crate::auction::{AuctionEngine, AuctionError, AuctionSnapshot};
use std::path::Path;
use thiserror::Error;

/// Key prefixes for organizing data
mod keys {
    pub const LEDGER: &[u8] = b"approval:ledger";
    pub const AUCTION_PREFIX: &[u8] = b"auction:";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("Invalid auction name: {0:?}")]
    InvalidName(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Number of stored auctions
    pub auction_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Persistent store for engine snapshots
///
/// Snapshots are postcard-encoded. Writes are durable after `flush`.
pub struct EscrowStore {
    db: sled::Db,
}

impl EscrowStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            auction_count: self.db.scan_prefix(keys::AUCTION_PREFIX).count(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // RAW KEY-VALUE OPERATIONS
    // ========================================================================

    pub fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db.remove(key)?;
        Ok(())
    }

    // ========================================================================
    // APPROVAL LEDGER
    // ========================================================================

    /// Save the approval ledger's current state
    pub fn save_ledger(&self, ledger: &ApprovalLedger) -> Result<(), StoreError> {
        self.put_raw(keys::LEDGER, &ledger.snapshot().to_bytes())
    }

    /// Load the stored approval ledger snapshot
    pub fn load_ledger(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        match self.get_raw(keys::LEDGER)? {
            Some(bytes) => {
                let snapshot = LedgerSnapshot::from_bytes(&bytes)
                    .map_err(|e: ApprovalError| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // AUCTIONS
    // ========================================================================

    /// Save an auction engine's state under `name`
    pub fn save_auction(&self, name: &str, engine: &AuctionEngine) -> Result<(), StoreError> {
        let key = auction_key(name)?;
        self.put_raw(&key, &engine.snapshot().to_bytes())
    }

    /// Load the auction snapshot stored under `name`
    pub fn load_auction(&self, name: &str) -> Result<Option<AuctionSnapshot>, StoreError> {
        let key = auction_key(name)?;
        match self.get_raw(&key)? {
            Some(bytes) => {
                let snapshot = AuctionSnapshot::from_bytes(&bytes)
                    .map_err(|e: AuctionError| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Remove a stored auction
    pub fn delete_auction(&self, name: &str) -> Result<(), StoreError> {
        let key = auction_key(name)?;
        self.delete(&key)
    }

    /// Names of every stored auction, in key order
    pub fn list_auctions(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for result in self.db.scan_prefix(keys::AUCTION_PREFIX) {
            let (key, _) = result?;
            let name = String::from_utf8_lossy(&key[keys::AUCTION_PREFIX.len()..]).into_owned();
            names.push(name);
        }
        Ok(names)
    }
}

fn auction_key(name: &str) -> Result<Vec<u8>, StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok([keys::AUCTION_PREFIX, name.as_bytes()].concat())
}
