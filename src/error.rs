// Error taxonomy shared by the approval ledger and the auction engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of every rejection an engine can return
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Wrong caller. Retry as the right identity.
    Authorization,
    /// Caller logic error against the current state.
    State,
    /// Expected-path rejection (quorum not met, bid too low, ...).
    Policy,
    /// An external collaborator failed. Never retried automatically.
    Effect,
}

impl ErrorClass {
    /// Whether the caller may re-attempt, as another identity or once the collaborator recovers
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Authorization | ErrorClass::Effect)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Authorization => "authorization",
            ErrorClass::State => "state",
            ErrorClass::Policy => "policy",
            ErrorClass::Effect => "effect",
        };
        f.write_str(name)
    }
}
