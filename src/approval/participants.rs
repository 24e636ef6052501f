// Participant set - who may propose, approve and execute, and how many approvals make a quorum

use super::error::ApprovalError;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Ordered set of participants plus the quorum threshold
///
/// Invariant: non-empty, no duplicates, `1 <= threshold <= len`.
/// Removal preserves the order of the remaining participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSet {
    members: Vec<Identity>,
    threshold: usize,
}

impl ParticipantSet {
    /// Build a validated participant set
    pub fn new(members: Vec<Identity>, threshold: usize, max: usize) -> Result<Self, ApprovalError> {
        if members.is_empty() {
            return Err(ApprovalError::NoParticipants);
        }
        if members.len() > max {
            return Err(ApprovalError::TooManyParticipants { max });
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(ApprovalError::DuplicateParticipant(*member));
            }
        }
        Self::check_threshold(threshold, members.len())?;

        Ok(Self { members, threshold })
    }

    /// Re-check the invariant on data that did not come through `new`
    pub fn validate(&self, max: usize) -> Result<(), ApprovalError> {
        Self::new(self.members.clone(), self.threshold, max).map(|_| ())
    }

    pub fn contains(&self, who: &Identity) -> bool {
        self.members.contains(who)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Participants in insertion order
    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.members.iter()
    }

    // ========================================================================
    // GOVERNANCE CHECKS (pure)
    // ========================================================================

    pub fn check_add(&self, who: &Identity, max: usize) -> Result<(), ApprovalError> {
        if self.contains(who) {
            return Err(ApprovalError::ParticipantExists(*who));
        }
        if self.members.len() >= max {
            return Err(ApprovalError::TooManyParticipants { max });
        }
        Ok(())
    }

    pub fn check_remove(&self, who: &Identity) -> Result<(), ApprovalError> {
        if !self.contains(who) {
            return Err(ApprovalError::NotAParticipant(*who));
        }
        if self.members.len() == 1 {
            return Err(ApprovalError::LastParticipant);
        }
        Ok(())
    }

    pub fn check_threshold(threshold: usize, participants: usize) -> Result<(), ApprovalError> {
        if threshold == 0 || threshold > participants {
            return Err(ApprovalError::InvalidThreshold {
                threshold,
                participants,
            });
        }
        Ok(())
    }

    // ========================================================================
    // GOVERNANCE MUTATIONS
    // ========================================================================

    pub(crate) fn add(&mut self, who: Identity, max: usize) -> Result<(), ApprovalError> {
        self.check_add(&who, max)?;
        self.members.push(who);
        Ok(())
    }

    /// Remove a participant. Returns the new threshold if it had to be lowered.
    pub(crate) fn remove(&mut self, who: &Identity) -> Result<Option<usize>, ApprovalError> {
        self.check_remove(who)?;
        self.members.retain(|m| m != who);

        if self.threshold > self.members.len() {
            self.threshold = self.members.len();
            return Ok(Some(self.threshold));
        }
        Ok(None)
    }

    pub(crate) fn set_threshold(&mut self, threshold: usize) -> Result<(), ApprovalError> {
        Self::check_threshold(threshold, self.members.len())?;
        self.threshold = threshold;
        Ok(())
    }
}
