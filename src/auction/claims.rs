// Pending claims - refunds owed to outbid bidders
// Balances only grow through credit and only shrink through take

use crate::effects::Amount;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Refundable balances keyed by identity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClaims {
    claims: BTreeMap<Identity, Amount>,
}

impl PendingClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim owed to `who` (0 if none)
    pub fn get(&self, who: &Identity) -> Amount {
        self.claims.get(who).copied().unwrap_or(0)
    }

    /// Sum of every outstanding claim
    pub fn total(&self) -> Amount {
        self.claims.values().fold(0, |acc, v| acc.saturating_add(*v))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identity, &Amount)> {
        self.claims.iter()
    }

    /// Balance `who` would have after a credit, or None on overflow
    pub fn credited(&self, who: &Identity, amount: Amount) -> Option<Amount> {
        self.get(who).checked_add(amount)
    }

    /// Add to an existing claim. Returns the new balance, or None on overflow.
    pub(crate) fn credit(&mut self, who: &Identity, amount: Amount) -> Option<Amount> {
        let next = self.credited(who, amount)?;
        if next > 0 {
            self.claims.insert(*who, next);
        }
        Some(next)
    }

    /// Zero a claim, returning what it held
    pub(crate) fn take(&mut self, who: &Identity) -> Amount {
        self.claims.remove(who).unwrap_or(0)
    }

    /// Undo a credit made earlier in the same operation
    pub(crate) fn uncredit(&mut self, who: &Identity, amount: Amount) {
        let remaining = self.get(who).saturating_sub(amount);
        if remaining == 0 {
            self.claims.remove(who);
        } else {
            self.claims.insert(*who, remaining);
        }
    }
}
