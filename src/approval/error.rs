use super::action::ActionId;
use crate::effects::EffectError;
use crate::error::ErrorClass;
use crate::identity::Identity;
use thiserror::Error;

/// Errors that can occur during approval ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Not authorized: {0} is not a participant")]
    NotAuthorized(Identity),

    #[error("Action {0} not found")]
    NotFound(ActionId),

    #[error("Action {0} already executed")]
    AlreadyExecuted(ActionId),

    #[error("{actor} already approved action {index}")]
    AlreadyApproved { index: ActionId, actor: Identity },

    #[error("{actor} has not approved action {index}")]
    NotYetApproved { index: ActionId, actor: Identity },

    #[error("Quorum not met: {approvals} of {threshold} approvals")]
    QuorumNotMet { approvals: usize, threshold: usize },

    #[error("Effect failed: {0}")]
    EffectFailed(#[from] EffectError),

    #[error("Participant set cannot be empty")]
    NoParticipants,

    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(Identity),

    #[error("Invalid threshold {threshold} for {participants} participants")]
    InvalidThreshold { threshold: usize, participants: usize },

    #[error("Too many participants: limit is {max}")]
    TooManyParticipants { max: usize },

    #[error("{0} is already a participant")]
    ParticipantExists(Identity),

    #[error("{0} is not a participant")]
    NotAParticipant(Identity),

    #[error("Cannot remove the last participant")]
    LastParticipant,

    #[error("Governance actions must target the ledger account {expected}")]
    InvalidTarget { expected: Identity },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Snapshot decoding failed: {0}")]
    SnapshotFailed(String),
}

impl ApprovalError {
    /// Taxonomy bucket for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            ApprovalError::NotAuthorized(_) => ErrorClass::Authorization,
            ApprovalError::QuorumNotMet { .. } => ErrorClass::Policy,
            ApprovalError::EffectFailed(_) => ErrorClass::Effect,
            _ => ErrorClass::State,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
