// Collaborator contracts - the only way state leaves the engines
// Engines commit their own state first, then describe the outside-world change as an Effect

use crate::identity::{Identity, ResourceRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Amount in the ledger's smallest unit
pub type Amount = u128;

/// Seconds on the host's clock
pub type Timestamp = u64;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure reported by a `Ledger` transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    #[error("Recipient balance would overflow")]
    Overflow,

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Failure reported by an `AssetCustody` transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceRef),

    #[error("{from} does not hold custody of {resource}")]
    NotHolder { resource: ResourceRef, from: Identity },

    #[error("No custody service configured")]
    Unavailable,

    #[error("Custody transfer rejected: {0}")]
    Rejected(String),
}

/// Either kind of collaborator failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Custody transfer failed: {0}")]
    Custody(#[from] CustodyError),
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Balance ledger holding the funds the engines move
pub trait Ledger: Send + Sync {
    /// Move `amount` from `from` to `to`. Failure must be reported, never dropped.
    fn transfer(&self, from: &Identity, to: &Identity, amount: Amount) -> Result<(), TransferError>;
}

/// Monotonic, read-only time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Registry of who holds which resource
pub trait AssetCustody: Send + Sync {
    fn transfer_custody(
        &self,
        resource: &ResourceRef,
        from: &Identity,
        to: &Identity,
    ) -> Result<(), CustodyError>;

    fn owner_of(&self, resource: &ResourceRef) -> Option<Identity>;
}

// ============================================================================
// EFFECT DESCRIPTORS
// ============================================================================

/// An outside-world change requested by a committed state transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Transfer {
        from: Identity,
        to: Identity,
        amount: Amount,
    },
    Custody {
        resource: ResourceRef,
        from: Identity,
        to: Identity,
    },
}

/// Applies effects against the configured collaborators
#[derive(Clone)]
pub struct EffectRunner {
    ledger: Arc<dyn Ledger>,
    custody: Option<Arc<dyn AssetCustody>>,
}

impl EffectRunner {
    /// Runner with only a balance ledger
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            custody: None,
        }
    }

    /// Runner with both a balance ledger and a custody service
    pub fn with_custody(ledger: Arc<dyn Ledger>, custody: Arc<dyn AssetCustody>) -> Self {
        Self {
            ledger,
            custody: Some(custody),
        }
    }

    /// Apply a single effect. Never retries.
    pub fn run(&self, effect: &Effect) -> Result<(), EffectError> {
        match effect {
            Effect::Transfer { from, to, amount } => {
                self.ledger.transfer(from, to, *amount)?;
            }
            Effect::Custody { resource, from, to } => {
                let custody = self.custody.as_ref().ok_or(CustodyError::Unavailable)?;
                custody.transfer_custody(resource, from, to)?;
            }
        }
        Ok(())
    }

    /// Current holder of a resource, if a custody service is configured
    pub fn owner_of(&self, resource: &ResourceRef) -> Option<Identity> {
        self.custody.as_ref().and_then(|c| c.owner_of(resource))
    }
}

impl std::fmt::Debug for EffectRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRunner")
            .field("custody", &self.custody.is_some())
            .finish()
    }
}
