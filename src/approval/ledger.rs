// Approval Ledger - quorum-gated actions with exactly-once execution
// Every action is proposed, approved by participants, and executed by an explicit call

use super::action::{Action, ActionId, Payload};
use super::error::ApprovalError;
use super::participants::ParticipantSet;
use crate::effects::{Clock, Effect, EffectRunner, Ledger, Timestamp};
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIG
// ============================================================================

/// What happens to `executed` when the ledger transfer of an action fails
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectFailurePolicy {
    /// Reset `executed` to false; the action may be executed again later
    Rollback,
    /// Leave `executed` true; the action is permanently spent
    Seal,
}

/// Configuration for the approval ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Upper bound on the participant set
    pub max_participants: usize,
    /// Handling of failed transfers during `execute`
    pub effect_failure: EffectFailurePolicy,
}

impl ApprovalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_participants(mut self, max: usize) -> Self {
        self.max_participants = max;
        self
    }

    pub fn with_effect_failure(mut self, policy: EffectFailurePolicy) -> Self {
        self.effect_failure = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ApprovalError> {
        if self.max_participants == 0 {
            return Err(ApprovalError::InvalidConfig(
                "max_participants must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_participants: 50,
            effect_failure: EffectFailurePolicy::Rollback,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Records emitted by the approval ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalEvent {
    Submitted {
        index: ActionId,
        proposer: Identity,
        target: Identity,
        payload: Payload,
    },
    Approved {
        index: ActionId,
        actor: Identity,
    },
    Revoked {
        index: ActionId,
        actor: Identity,
    },
    Executed {
        index: ActionId,
        caller: Identity,
    },
    ExecutionFailed {
        index: ActionId,
        error: String,
        sealed: bool,
    },
    ParticipantAdded {
        participant: Identity,
    },
    ParticipantRemoved {
        participant: Identity,
    },
    ThresholdChanged {
        threshold: usize,
    },
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Serializable state of an approval ledger, without its collaborators
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: ApprovalConfig,
    pub account: Identity,
    pub participants: ParticipantSet,
    pub actions: Vec<Action>,
}

impl LedgerSnapshot {
    pub fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ApprovalError> {
        postcard::from_bytes(bytes).map_err(|e| ApprovalError::SnapshotFailed(e.to_string()))
    }
}

// ============================================================================
// APPROVAL LEDGER
// ============================================================================

/// Self-governing multi-party approval ledger
///
/// Funds are held by `account` on the external `Ledger`. Actions live in an
/// append-only arena indexed by `ActionId`; nothing is ever deleted.
pub struct ApprovalLedger {
    config: ApprovalConfig,
    account: Identity,
    participants: ParticipantSet,
    actions: Vec<Action>,
    events: Vec<ApprovalEvent>,
    effects: EffectRunner,
    clock: Arc<dyn Clock>,
}

impl ApprovalLedger {
    /// Create a ledger with the default configuration
    pub fn new(
        account: Identity,
        participants: Vec<Identity>,
        threshold: usize,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApprovalError> {
        Self::with_config(ApprovalConfig::default(), account, participants, threshold, ledger, clock)
    }

    /// Create a ledger with a custom configuration
    pub fn with_config(
        config: ApprovalConfig,
        account: Identity,
        participants: Vec<Identity>,
        threshold: usize,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApprovalError> {
        config.validate()?;
        let participants = ParticipantSet::new(participants, threshold, config.max_participants)?;

        Ok(Self {
            config,
            account,
            participants,
            actions: Vec::new(),
            events: Vec::new(),
            effects: EffectRunner::new(ledger),
            clock,
        })
    }

    /// Rebuild a ledger from a snapshot, re-attaching collaborators
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApprovalError> {
        snapshot.config.validate()?;
        snapshot.participants.validate(snapshot.config.max_participants)?;

        let in_order = snapshot
            .actions
            .iter()
            .enumerate()
            .all(|(i, a)| a.id().slot() == Some(i));
        if !in_order {
            return Err(ApprovalError::SnapshotFailed(
                "action indices are not contiguous".to_string(),
            ));
        }

        Ok(Self {
            config: snapshot.config,
            account: snapshot.account,
            participants: snapshot.participants,
            actions: snapshot.actions,
            events: Vec::new(),
            effects: EffectRunner::new(ledger),
            clock,
        })
    }

    /// Capture the current state
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config.clone(),
            account: self.account,
            participants: self.participants.clone(),
            actions: self.actions.clone(),
        }
    }

    // ========================================================================
    // STATE TRANSITIONS
    // ========================================================================

    /// Propose a new action. The proposer's approval is recorded immediately.
    pub fn submit(
        &mut self,
        proposer: &Identity,
        target: Identity,
        payload: Payload,
    ) -> Result<ActionId, ApprovalError> {
        self.authorize(proposer)?;

        if payload.is_governance() && target != self.account {
            return Err(ApprovalError::InvalidTarget {
                expected: self.account,
            });
        }

        let id = ActionId::new(self.actions.len() as u64);
        let action = Action::new(id, *proposer, target, payload.clone(), self.now());
        self.actions.push(action);

        info!(index = %id, proposer = %proposer.short(), target = %target.short(), "action submitted");
        self.events.push(ApprovalEvent::Submitted {
            index: id,
            proposer: *proposer,
            target,
            payload,
        });

        Ok(id)
    }

    /// Add `actor`'s approval. Never executes.
    pub fn approve(&mut self, actor: &Identity, index: ActionId) -> Result<(), ApprovalError> {
        self.authorize(actor)?;
        let action = self.pending_action_mut(index)?;

        if !action.approve(*actor) {
            return Err(ApprovalError::AlreadyApproved {
                index,
                actor: *actor,
            });
        }

        debug!(index = %index, actor = %actor.short(), "action approved");
        self.events.push(ApprovalEvent::Approved {
            index,
            actor: *actor,
        });
        Ok(())
    }

    /// Withdraw `actor`'s approval from a pending action
    pub fn revoke(&mut self, actor: &Identity, index: ActionId) -> Result<(), ApprovalError> {
        self.authorize(actor)?;
        let action = self.pending_action_mut(index)?;

        if !action.revoke(actor) {
            return Err(ApprovalError::NotYetApproved {
                index,
                actor: *actor,
            });
        }

        debug!(index = %index, actor = %actor.short(), "approval revoked");
        self.events.push(ApprovalEvent::Revoked {
            index,
            actor: *actor,
        });
        Ok(())
    }

    /// Execute an action whose quorum is met
    ///
    /// `executed` is committed before the ledger transfer is attempted. On
    /// transfer failure the configured `EffectFailurePolicy` decides whether
    /// the flag is rolled back or stays sealed.
    pub fn execute(&mut self, caller: &Identity, index: ActionId) -> Result<(), ApprovalError> {
        self.authorize(caller)?;
        self.pending_action(index)?;

        let approvals = self.confirmation_count(index);
        let threshold = self.participants.threshold();
        if approvals < threshold {
            return Err(ApprovalError::QuorumNotMet {
                approvals,
                threshold,
            });
        }

        let now = self.now();
        let effect = match self.commit_execution(index, now)? {
            Some(effect) => effect,
            None => {
                self.record_executed(caller, index);
                return Ok(());
            }
        };

        if let Err(e) = self.effects.run(&effect) {
            let sealed = self.config.effect_failure == EffectFailurePolicy::Seal;
            if !sealed {
                if let Some(action) = self.slot_mut(index) {
                    action.clear_executed();
                }
            }

            warn!(index = %index, error = %e, sealed, "action effect failed");
            self.events.push(ApprovalEvent::ExecutionFailed {
                index,
                error: e.to_string(),
                sealed,
            });
            return Err(ApprovalError::EffectFailed(e));
        }

        self.record_executed(caller, index);
        Ok(())
    }

    /// Mark the action executed and apply governance payloads in place.
    /// Returns the external effect still to run, if any.
    fn commit_execution(&mut self, index: ActionId, now: Timestamp) -> Result<Option<Effect>, ApprovalError> {
        let (target, payload) = {
            let action = self.pending_action(index)?;
            (*action.target(), action.payload().clone())
        };

        let max = self.config.max_participants;
        match &payload {
            Payload::Transfer { .. } => {}
            Payload::AddParticipant { participant } => self.participants.check_add(participant, max)?,
            Payload::RemoveParticipant { participant } => self.participants.check_remove(participant)?,
            Payload::SetThreshold { threshold } => {
                ParticipantSet::check_threshold(*threshold, self.participants.len())?
            }
        }

        if let Some(action) = self.slot_mut(index) {
            action.mark_executed(now);
        }

        let effect = match payload {
            Payload::Transfer { amount } => Some(Effect::Transfer {
                from: self.account,
                to: target,
                amount,
            }),
            Payload::AddParticipant { participant } => {
                self.participants.add(participant, max)?;
                info!(participant = %participant.short(), "participant added");
                self.events.push(ApprovalEvent::ParticipantAdded { participant });
                None
            }
            Payload::RemoveParticipant { participant } => {
                let lowered = self.participants.remove(&participant)?;
                info!(participant = %participant.short(), "participant removed");
                self.events.push(ApprovalEvent::ParticipantRemoved { participant });
                if let Some(threshold) = lowered {
                    info!(threshold, "threshold lowered to participant count");
                    self.events.push(ApprovalEvent::ThresholdChanged { threshold });
                }
                None
            }
            Payload::SetThreshold { threshold } => {
                self.participants.set_threshold(threshold)?;
                info!(threshold, "threshold changed");
                self.events.push(ApprovalEvent::ThresholdChanged { threshold });
                None
            }
        };

        Ok(effect)
    }

    fn record_executed(&mut self, caller: &Identity, index: ActionId) {
        info!(index = %index, caller = %caller.short(), "action executed");
        self.events.push(ApprovalEvent::Executed {
            index,
            caller: *caller,
        });
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Approvals from current participants. 0 for an unknown index.
    pub fn confirmation_count(&self, index: ActionId) -> usize {
        self.slot(index)
            .map(|a| a.approvals().iter().filter(|who| self.participants.contains(who)).count())
            .unwrap_or(0)
    }

    /// Whether `actor` has approved. false for an unknown index.
    pub fn is_approved(&self, index: ActionId, actor: &Identity) -> bool {
        self.slot(index).map(|a| a.is_approved_by(actor)).unwrap_or(false)
    }

    pub fn get_action(&self, index: ActionId) -> Result<&Action, ApprovalError> {
        self.slot(index).ok_or(ApprovalError::NotFound(index))
    }

    /// Whether the action currently has enough approvals to execute
    pub fn is_quorum_met(&self, index: ActionId) -> bool {
        self.slot(index).is_some() && self.confirmation_count(index) >= self.participants.threshold()
    }

    /// Current participants that approved the action, in participant order
    pub fn approvers(&self, index: ActionId) -> Vec<Identity> {
        match self.slot(index) {
            Some(action) => self
                .participants
                .iter()
                .filter(|who| action.is_approved_by(who))
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of actions matching the filters
    pub fn action_count(&self, include_pending: bool, include_executed: bool) -> usize {
        self.actions
            .iter()
            .filter(|a| Self::matches(a, include_pending, include_executed))
            .count()
    }

    /// Indices in `[from, to)` matching the filters
    pub fn action_ids(
        &self,
        from: u64,
        to: u64,
        include_pending: bool,
        include_executed: bool,
    ) -> Vec<ActionId> {
        self.actions
            .iter()
            .filter(|a| (from..to).contains(&a.id().value()))
            .filter(|a| Self::matches(a, include_pending, include_executed))
            .map(|a| a.id())
            .collect()
    }

    pub fn participants(&self) -> &[Identity] {
        self.participants.members()
    }

    pub fn is_participant(&self, who: &Identity) -> bool {
        self.participants.contains(who)
    }

    pub fn threshold(&self) -> usize {
        self.participants.threshold()
    }

    /// Account on the external ledger that funds transfers
    pub fn account(&self) -> &Identity {
        &self.account
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    /// Drain buffered events
    pub fn poll_events(&mut self) -> Vec<ApprovalEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn authorize(&self, who: &Identity) -> Result<(), ApprovalError> {
        if !self.participants.contains(who) {
            return Err(ApprovalError::NotAuthorized(*who));
        }
        Ok(())
    }

    fn matches(action: &Action, include_pending: bool, include_executed: bool) -> bool {
        (include_pending && !action.is_executed()) || (include_executed && action.is_executed())
    }

    fn slot(&self, index: ActionId) -> Option<&Action> {
        index.slot().and_then(|i| self.actions.get(i))
    }

    fn slot_mut(&mut self, index: ActionId) -> Option<&mut Action> {
        index.slot().and_then(|i| self.actions.get_mut(i))
    }

    fn pending_action(&self, index: ActionId) -> Result<&Action, ApprovalError> {
        let action = self.slot(index).ok_or(ApprovalError::NotFound(index))?;
        if action.is_executed() {
            return Err(ApprovalError::AlreadyExecuted(index));
        }
        Ok(action)
    }

    fn pending_action_mut(&mut self, index: ActionId) -> Result<&mut Action, ApprovalError> {
        let action = self.slot_mut(index).ok_or(ApprovalError::NotFound(index))?;
        if action.is_executed() {
            return Err(ApprovalError::AlreadyExecuted(index));
        }
        Ok(action)
    }
}

impl std::fmt::Debug for ApprovalLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalLedger")
            .field("account", &self.account)
            .field("participants", &self.participants)
            .field("actions", &self.actions.len())
            .finish()
    }
}
