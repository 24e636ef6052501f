// Action - a proposed effect that needs a quorum before it runs exactly once

use crate::effects::{Amount, Timestamp};
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// ACTION ID
// ============================================================================

/// Stable index of an action. Assigned from 0 upwards, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(u64);

impl ActionId {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub(crate) fn slot(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl From<u64> for ActionId {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// What an action does once executed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Pay `amount` from the ledger account to the action's target
    Transfer { amount: Amount },
    /// Admit a new participant
    AddParticipant { participant: Identity },
    /// Drop a participant; the threshold is lowered if it would exceed the new size
    RemoveParticipant { participant: Identity },
    /// Change the quorum threshold
    SetThreshold { threshold: usize },
}

impl Payload {
    /// Governance payloads change the ledger itself instead of moving funds
    pub fn is_governance(&self) -> bool {
        !matches!(self, Payload::Transfer { .. })
    }
}

// ============================================================================
// ACTION
// ============================================================================

/// A proposed action and its approval state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    id: ActionId,
    proposer: Identity,
    target: Identity,
    payload: Payload,
    approvals: BTreeSet<Identity>,
    executed: bool,
    submitted_at: Timestamp,
    executed_at: Option<Timestamp>,
}

impl Action {
    /// A fresh action, already approved by its proposer
    pub(crate) fn new(
        id: ActionId,
        proposer: Identity,
        target: Identity,
        payload: Payload,
        submitted_at: Timestamp,
    ) -> Self {
        let mut approvals = BTreeSet::new();
        approvals.insert(proposer);
        Self {
            id,
            proposer,
            target,
            payload,
            approvals,
            executed: false,
            submitted_at,
            executed_at: None,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn proposer(&self) -> &Identity {
        &self.proposer
    }

    pub fn target(&self) -> &Identity {
        &self.target
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Every identity that approved, including ones no longer participating
    pub fn approvals(&self) -> &BTreeSet<Identity> {
        &self.approvals
    }

    pub fn is_approved_by(&self, who: &Identity) -> bool {
        self.approvals.contains(who)
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn submitted_at(&self) -> Timestamp {
        self.submitted_at
    }

    pub fn executed_at(&self) -> Option<Timestamp> {
        self.executed_at
    }

    pub(crate) fn approve(&mut self, who: Identity) -> bool {
        self.approvals.insert(who)
    }

    pub(crate) fn revoke(&mut self, who: &Identity) -> bool {
        self.approvals.remove(who)
    }

    pub(crate) fn mark_executed(&mut self, at: Timestamp) {
        self.executed = true;
        self.executed_at = Some(at);
    }

    pub(crate) fn clear_executed(&mut self) {
        self.executed = false;
        self.executed_at = None;
    }
}
