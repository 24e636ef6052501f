use super::phase::Phase;
use crate::effects::{Amount, CustodyError, EffectError, Timestamp, TransferError};
use crate::error::ErrorClass;
use crate::identity::Identity;
use thiserror::Error;

/// Errors that can occur during auction operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuctionError {
    #[error("Caller is not the seller")]
    NotSeller,

    #[error("Invalid phase: expected {expected}, auction is {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("Auction already exists")]
    AlreadyExists,

    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(u64),

    #[error("Auction expired at {end_time} (now {now})")]
    Expired { now: Timestamp, end_time: Timestamp },

    #[error("Auction runs until {end_time} (now {now})")]
    NotYetExpired { now: Timestamp, end_time: Timestamp },

    #[error("Bid too low: {amount}, minimum is {minimum}")]
    BidTooLow { amount: Amount, minimum: Amount },

    #[error("{0} cannot bid in this auction")]
    InvalidBidder(Identity),

    #[error("{0} cannot sell through this auction")]
    InvalidSeller(Identity),

    #[error("Bids exist; the auction can no longer be canceled")]
    BidsExist,

    #[error("No pending claim to withdraw")]
    NoPendingClaim,

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Custody transfer failed: {0}")]
    Custody(#[from] CustodyError),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Snapshot decoding failed: {0}")]
    SnapshotFailed(String),
}

impl From<EffectError> for AuctionError {
    fn from(err: EffectError) -> Self {
        match err {
            EffectError::Transfer(e) => AuctionError::Transfer(e),
            EffectError::Custody(e) => AuctionError::Custody(e),
        }
    }
}

impl AuctionError {
    /// Taxonomy bucket for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            AuctionError::NotSeller => ErrorClass::Authorization,
            AuctionError::BidTooLow { .. }
            | AuctionError::InvalidDuration(_)
            | AuctionError::InvalidBidder(_)
            | AuctionError::InvalidSeller(_)
            | AuctionError::NoPendingClaim => ErrorClass::Policy,
            AuctionError::Custody(_) | AuctionError::Transfer(_) => ErrorClass::Effect,
            _ => ErrorClass::State,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
