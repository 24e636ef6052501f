use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the auction lifecycle
///
/// `Uninitialized -> Created -> Started -> {Ended | Canceled}`.
/// Ended and Canceled are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Uninitialized,
    Created,
    Started,
    Ended,
    Canceled,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ended | Phase::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Created => "created",
            Phase::Started => "started",
            Phase::Ended => "ended",
            Phase::Canceled => "canceled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
