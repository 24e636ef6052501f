// Approval module - THE QUORUM
// Participants propose actions, approve or revoke them, and execute once a quorum is reached

mod action;
mod error;
mod ledger;
mod participants;

pub use action::{Action, ActionId, Payload};
pub use error::ApprovalError;
pub use ledger::{ApprovalConfig, ApprovalEvent, ApprovalLedger, EffectFailurePolicy, LedgerSnapshot};
pub use participants::ParticipantSet;
