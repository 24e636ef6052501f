// In-memory collaborators - ledger, clocks and custody registry for tests and embedding
// Each mock can be told to fail so effect-failure paths stay testable

use super::traits::{Amount, AssetCustody, Clock, CustodyError, Ledger, Timestamp, TransferError};
use crate::identity::{Identity, ResourceRef};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MEMORY LEDGER
// ============================================================================

/// A completed transfer, as recorded by `MemoryLedger`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: Identity,
    pub to: Identity,
    pub amount: Amount,
}

/// Balance ledger kept in memory
pub struct MemoryLedger {
    balances: Mutex<HashMap<Identity, Amount>>,
    history: Mutex<Vec<TransferRecord>>,
    failure_message: Mutex<Option<String>>,
    failures_remaining: AtomicUsize,
    call_count: AtomicUsize,
}

impl MemoryLedger {
    /// Create an empty ledger where every account starts at zero
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            failure_message: Mutex::new(None),
            failures_remaining: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Seed an account balance
    pub fn with_balance(self, who: Identity, amount: Amount) -> Self {
        self.credit(&who, amount);
        self
    }

    /// Configure every transfer to fail with a message
    pub fn with_failure(self, message: &str) -> Self {
        self.set_failure(Some(message.to_string()));
        self
    }

    /// Add funds to an account outside of any transfer
    pub fn credit(&self, who: &Identity, amount: Amount) {
        let mut balances = lock(&self.balances);
        let entry = balances.entry(*who).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Current balance of an account
    pub fn balance_of(&self, who: &Identity) -> Amount {
        lock(&self.balances).get(who).copied().unwrap_or(0)
    }

    /// Fail the next `n` transfers, then behave normally
    pub fn fail_next_transfers(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Toggle permanent failure
    pub fn set_failure(&self, message: Option<String>) {
        *lock(&self.failure_message) = message;
    }

    /// Transfers that actually moved funds, oldest first
    pub fn transfers(&self) -> Vec<TransferRecord> {
        lock(&self.history).clone()
    }

    /// Number of transfer attempts, including failed ones
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    fn transfer(&self, from: &Identity, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.failure_message).clone() {
            return Err(TransferError::Rejected(message));
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TransferError::Rejected("injected failure".to_string()));
        }

        let mut balances = lock(&self.balances);
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                available,
                required: amount,
            });
        }

        if from != to {
            let credited = balances
                .get(to)
                .copied()
                .unwrap_or(0)
                .checked_add(amount)
                .ok_or(TransferError::Overflow)?;
            balances.insert(*from, available - amount);
            balances.insert(*to, credited);
        }

        lock(&self.history).push(TransferRecord {
            from: *from,
            to: *to,
            amount,
        });

        Ok(())
    }
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Clock advanced by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move time forward by `secs`
    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(secs)));
    }

    /// Jump to `ts`. Never moves backwards.
    pub fn set(&self, ts: Timestamp) {
        self.now.fetch_max(ts, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Wall-clock time in Unix seconds
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

// ============================================================================
// MEMORY CUSTODY
// ============================================================================

/// Custody registry kept in memory
#[derive(Debug, Default)]
pub struct MemoryCustody {
    holders: Mutex<HashMap<ResourceRef, Identity>>,
    failing: AtomicBool,
    failures_remaining: AtomicUsize,
}

impl MemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with its initial holder
    pub fn mint(&self, resource: ResourceRef, holder: Identity) {
        lock(&self.holders).insert(resource, holder);
    }

    /// Toggle permanent failure
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` custody transfers
    pub fn fail_next_transfers(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }
}

impl AssetCustody for MemoryCustody {
    fn transfer_custody(
        &self,
        resource: &ResourceRef,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), CustodyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CustodyError::Rejected("custody service unavailable".to_string()));
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(CustodyError::Rejected("injected failure".to_string()));
        }

        let mut holders = lock(&self.holders);
        let holder = holders
            .get_mut(resource)
            .ok_or_else(|| CustodyError::UnknownResource(resource.clone()))?;

        if holder != from {
            return Err(CustodyError::NotHolder {
                resource: resource.clone(),
                from: *from,
            });
        }

        *holder = *to;
        Ok(())
    }

    fn owner_of(&self, resource: &ResourceRef) -> Option<Identity> {
        lock(&self.holders).get(resource).copied()
    }
}
