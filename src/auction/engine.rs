// Auction Engine - English auction over a single resource held in escrow
// Bids are pulled into the escrow account; outbid amounts become withdrawable claims

use super::claims::PendingClaims;
use super::error::AuctionError;
use super::phase::Phase;
use crate::effects::{Amount, AssetCustody, Clock, Effect, EffectError, EffectRunner, Ledger, Timestamp};
use crate::identity::{Identity, ResourceRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for the auction engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// A new bid must exceed `high_bid + high_bid / increment_divisor`
    pub increment_divisor: Amount,
    /// Longest accepted auction duration in seconds
    pub max_duration_secs: u64,
}

impl AuctionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increment_divisor(mut self, divisor: Amount) -> Self {
        self.increment_divisor = divisor;
        self
    }

    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), AuctionError> {
        if self.increment_divisor == 0 {
            return Err(AuctionError::InvalidConfig(
                "increment_divisor must be > 0".to_string(),
            ));
        }
        if self.max_duration_secs == 0 {
            return Err(AuctionError::InvalidConfig(
                "max_duration_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            increment_divisor: 20,
            max_duration_secs: 30 * 24 * 60 * 60,
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Records emitted by the auction engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuctionEvent {
    Created {
        seller: Identity,
        resource: ResourceRef,
        floor_price: Amount,
    },
    Started {
        end_time: Timestamp,
    },
    BidPlaced {
        bidder: Identity,
        amount: Amount,
    },
    Outbid {
        bidder: Identity,
        refundable: Amount,
    },
    Ended {
        winner: Option<Identity>,
        amount: Amount,
    },
    ProceedsDeferred {
        seller: Identity,
        amount: Amount,
    },
    Canceled,
    Withdrawn {
        who: Identity,
        amount: Amount,
    },
    EffectFailed {
        operation: &'static str,
        error: String,
    },
}

// ============================================================================
// AUCTION RECORD
// ============================================================================

/// The single auction tracked by an engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    seller: Identity,
    resource: ResourceRef,
    floor_price: Amount,
    duration: u64,
    high_bid: Amount,
    high_bidder: Option<Identity>,
    end_time: Option<Timestamp>,
    phase: Phase,
}

impl Auction {
    pub fn seller(&self) -> &Identity {
        &self.seller
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    pub fn floor_price(&self) -> Amount {
        self.floor_price
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn high_bid(&self) -> Amount {
        self.high_bid
    }

    pub fn high_bidder(&self) -> Option<&Identity> {
        self.high_bidder.as_ref()
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Outcome of a successful `end`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Who received custody, or None if it went back to the seller
    pub winner: Option<Identity>,
    /// Winning bid (0 without bids)
    pub amount: Amount,
    /// True when paying the seller failed and the proceeds became a claim
    pub proceeds_deferred: bool,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Serializable state of an auction engine, without its collaborators
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub config: AuctionConfig,
    pub escrow: Identity,
    pub auction: Option<Auction>,
    pub claims: PendingClaims,
    pub total_bid: Amount,
    pub total_withdrawn: Amount,
}

impl AuctionSnapshot {
    pub fn to_bytes(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuctionError> {
        postcard::from_bytes(bytes).map_err(|e| AuctionError::SnapshotFailed(e.to_string()))
    }

    /// Check the invariants a live engine maintains
    ///
    /// Escrow must hold `total_bid - total_withdrawn`, which equals the
    /// pending claims plus the high bid. After `end` the high bid has either
    /// been paid to the seller or moved into the seller's claim.
    pub fn validate(&self) -> Result<(), AuctionError> {
        self.config.validate()?;

        let held = self
            .total_bid
            .checked_sub(self.total_withdrawn)
            .ok_or_else(|| snapshot_error("more withdrawn than bid"))?;
        let claims = self.claims.total();

        let auction = match &self.auction {
            Some(auction) => auction,
            None if held == 0 && self.claims.is_empty() => return Ok(()),
            None => return Err(snapshot_error("funds recorded without an auction")),
        };

        if auction.seller == self.escrow {
            return Err(snapshot_error("escrow is the seller"));
        }
        if auction.duration == 0 || auction.duration > self.config.max_duration_secs {
            return Err(snapshot_error("duration out of range"));
        }
        match auction.phase {
            Phase::Uninitialized => return Err(snapshot_error("auction record without a phase")),
            Phase::Created if auction.end_time.is_some() => {
                return Err(snapshot_error("end time set before start"))
            }
            Phase::Started | Phase::Ended if auction.end_time.is_none() => {
                return Err(snapshot_error("started auction has no end time"))
            }
            _ => {}
        }
        match auction.high_bidder {
            Some(bidder) if bidder == self.escrow => {
                return Err(snapshot_error("escrow is the high bidder"))
            }
            Some(_) if auction.high_bid < auction.floor_price => {
                return Err(snapshot_error("high bid below floor"))
            }
            None if auction.high_bid != 0 => return Err(snapshot_error("high bid without a bidder")),
            _ => {}
        }
        if auction.phase == Phase::Canceled && auction.high_bidder.is_some() {
            return Err(snapshot_error("canceled auction has bids"));
        }

        let with_high = claims
            .checked_add(auction.high_bid)
            .ok_or_else(|| snapshot_error("claims overflow"))?;
        let balanced = match auction.phase {
            Phase::Ended => held == with_high || held == claims,
            _ => held == with_high,
        };
        if !balanced {
            return Err(snapshot_error("escrow balance does not match claims and high bid"));
        }
        Ok(())
    }
}

fn snapshot_error(reason: &str) -> AuctionError {
    AuctionError::SnapshotFailed(reason.to_string())
}

// ============================================================================
// AUCTION ENGINE
// ============================================================================

/// Single-auction state machine
///
/// Every operation commits its state change first and then applies at most
/// one external effect at a time; a failed effect restores the prior state.
pub struct AuctionEngine {
    config: AuctionConfig,
    escrow: Identity,
    auction: Option<Auction>,
    claims: PendingClaims,
    total_bid: Amount,
    total_withdrawn: Amount,
    events: Vec<AuctionEvent>,
    effects: EffectRunner,
    clock: Arc<dyn Clock>,
}

impl AuctionEngine {
    /// Create an engine with the default configuration
    pub fn new(
        escrow: Identity,
        ledger: Arc<dyn Ledger>,
        custody: Arc<dyn AssetCustody>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: AuctionConfig::default(),
            escrow,
            auction: None,
            claims: PendingClaims::new(),
            total_bid: 0,
            total_withdrawn: 0,
            events: Vec::new(),
            effects: EffectRunner::with_custody(ledger, custody),
            clock,
        }
    }

    /// Create an engine with a custom configuration
    pub fn with_config(
        config: AuctionConfig,
        escrow: Identity,
        ledger: Arc<dyn Ledger>,
        custody: Arc<dyn AssetCustody>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuctionError> {
        config.validate()?;
        let mut engine = Self::new(escrow, ledger, custody, clock);
        engine.config = config;
        Ok(engine)
    }

    /// Rebuild an engine from a snapshot, re-attaching collaborators
    pub fn from_snapshot(
        snapshot: AuctionSnapshot,
        ledger: Arc<dyn Ledger>,
        custody: Arc<dyn AssetCustody>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuctionError> {
        snapshot.validate()?;
        Ok(Self {
            config: snapshot.config,
            escrow: snapshot.escrow,
            auction: snapshot.auction,
            claims: snapshot.claims,
            total_bid: snapshot.total_bid,
            total_withdrawn: snapshot.total_withdrawn,
            events: Vec::new(),
            effects: EffectRunner::with_custody(ledger, custody),
            clock,
        })
    }

    /// Capture the current state
    pub fn snapshot(&self) -> AuctionSnapshot {
        AuctionSnapshot {
            config: self.config.clone(),
            escrow: self.escrow,
            auction: self.auction.clone(),
            claims: self.claims.clone(),
            total_bid: self.total_bid,
            total_withdrawn: self.total_withdrawn,
        }
    }

    // ========================================================================
    // STATE TRANSITIONS
    // ========================================================================

    /// Set up the auction. Custody is not touched until `start`.
    pub fn create(
        &mut self,
        seller: Identity,
        resource: ResourceRef,
        floor_price: Amount,
        duration: u64,
    ) -> Result<(), AuctionError> {
        if self.auction.is_some() {
            return Err(AuctionError::AlreadyExists);
        }
        if duration == 0 || duration > self.config.max_duration_secs {
            return Err(AuctionError::InvalidDuration(duration));
        }
        if seller == self.escrow {
            return Err(AuctionError::InvalidSeller(seller));
        }

        info!(seller = %seller.short(), resource = %resource, floor_price, duration, "auction created");
        self.events.push(AuctionEvent::Created {
            seller,
            resource: resource.clone(),
            floor_price,
        });
        self.auction = Some(Auction {
            seller,
            resource,
            floor_price,
            duration,
            high_bid: 0,
            high_bidder: None,
            end_time: None,
            phase: Phase::Created,
        });
        Ok(())
    }

    /// Take custody of the resource and open bidding
    pub fn start(&mut self, caller: &Identity) -> Result<Timestamp, AuctionError> {
        let now = self.clock.now();
        let escrow = self.escrow;
        let auction = self.auction.as_mut().ok_or(AuctionError::InvalidPhase {
            expected: Phase::Created,
            actual: Phase::Uninitialized,
        })?;

        if caller != &auction.seller {
            return Err(AuctionError::NotSeller);
        }
        expect_phase(auction, Phase::Created)?;

        let end_time = now.saturating_add(auction.duration);
        auction.phase = Phase::Started;
        auction.end_time = Some(end_time);

        let effect = Effect::Custody {
            resource: auction.resource.clone(),
            from: auction.seller,
            to: escrow,
        };
        if let Err(e) = self.effects.run(&effect) {
            return Err(self.rollback("start", e, |engine| {
                if let Some(a) = engine.auction.as_mut() {
                    a.phase = Phase::Created;
                    a.end_time = None;
                }
            }));
        }

        info!(end_time, "auction started");
        self.events.push(AuctionEvent::Started { end_time });
        Ok(end_time)
    }

    /// Place a bid, pulling `amount` from the bidder into escrow
    pub fn bid(&mut self, bidder: &Identity, amount: Amount) -> Result<(), AuctionError> {
        let now = self.clock.now();
        let auction = self.open_auction(now)?;
        if bidder == &self.escrow {
            return Err(AuctionError::InvalidBidder(*bidder));
        }

        let minimum = minimum_bid(auction, self.config.increment_divisor)?;
        if amount < minimum {
            return Err(AuctionError::BidTooLow { amount, minimum });
        }

        let previous = auction.high_bidder.map(|who| (who, auction.high_bid));
        let prior_high = auction.high_bid;
        let total_bid = self
            .total_bid
            .checked_add(amount)
            .ok_or(AuctionError::AmountOverflow)?;

        let refundable = match previous {
            Some((who, prev)) => Some((who, self.claims.credit(&who, prev).ok_or(AuctionError::AmountOverflow)?)),
            None => None,
        };
        self.total_bid = total_bid;
        if let Some(a) = self.auction.as_mut() {
            a.high_bid = amount;
            a.high_bidder = Some(*bidder);
        }

        let effect = Effect::Transfer {
            from: *bidder,
            to: self.escrow,
            amount,
        };
        if let Err(e) = self.effects.run(&effect) {
            return Err(self.rollback("bid", e, |engine| {
                if let Some((who, prev)) = previous {
                    engine.claims.uncredit(&who, prev);
                }
                engine.total_bid -= amount;
                if let Some(a) = engine.auction.as_mut() {
                    a.high_bid = prior_high;
                    a.high_bidder = previous.map(|(who, _)| who);
                }
            }));
        }

        if let Some((who, refundable)) = refundable {
            debug!(bidder = %who.short(), refundable, "bidder outbid");
            self.events.push(AuctionEvent::Outbid {
                bidder: who,
                refundable,
            });
        }
        debug!(bidder = %bidder.short(), amount, "bid accepted");
        self.events.push(AuctionEvent::BidPlaced {
            bidder: *bidder,
            amount,
        });
        Ok(())
    }

    /// Close an expired auction. Anyone may call this.
    ///
    /// With a winner, custody moves to the winner and the winning bid to the
    /// seller; if that payment fails the proceeds become the seller's claim.
    /// Without bids, custody returns to the seller.
    ///
    /// A failed seller payment still returns `Ok`: callers must check
    /// `Settlement::proceeds_deferred`, and the seller collects through
    /// `withdraw`.
    pub fn end(&mut self, caller: &Identity) -> Result<Settlement, AuctionError> {
        let now = self.clock.now();
        let auction = self.current(Phase::Started)?;
        expect_phase(auction, Phase::Started)?;

        let end_time = auction.end_time.unwrap_or(now);
        if now < end_time {
            return Err(AuctionError::NotYetExpired { now, end_time });
        }

        let seller = auction.seller;
        let resource = auction.resource.clone();
        let winner = auction.high_bidder;
        let amount = if winner.is_some() { auction.high_bid } else { 0 };

        if winner.is_some() && self.claims.credited(&seller, amount).is_none() {
            return Err(AuctionError::AmountOverflow);
        }

        if let Some(a) = self.auction.as_mut() {
            a.phase = Phase::Ended;
        }

        let custody = Effect::Custody {
            resource,
            from: self.escrow,
            to: winner.unwrap_or(seller),
        };
        if let Err(e) = self.effects.run(&custody) {
            return Err(self.rollback("end", e, |engine| {
                if let Some(a) = engine.auction.as_mut() {
                    a.phase = Phase::Started;
                }
            }));
        }

        let mut proceeds_deferred = false;
        if winner.is_some() {
            let payment = Effect::Transfer {
                from: self.escrow,
                to: seller,
                amount,
            };
            if let Err(e) = self.effects.run(&payment) {
                self.claims.credit(&seller, amount);
                proceeds_deferred = true;

                warn!(seller = %seller.short(), amount, error = %e, "seller payment failed, proceeds deferred");
                self.events.push(AuctionEvent::EffectFailed {
                    operation: "end",
                    error: e.to_string(),
                });
                self.events.push(AuctionEvent::ProceedsDeferred { seller, amount });
            }
        }

        info!(caller = %caller.short(), winner = ?winner.map(|w| w.short()), amount, "auction ended");
        self.events.push(AuctionEvent::Ended { winner, amount });
        Ok(Settlement {
            winner,
            amount,
            proceeds_deferred,
        })
    }

    /// Cancel a running auction that has no bids and has not expired
    pub fn cancel(&mut self, caller: &Identity) -> Result<(), AuctionError> {
        let now = self.clock.now();
        let auction = self.current(Phase::Started)?;

        if caller != &auction.seller {
            return Err(AuctionError::NotSeller);
        }
        expect_phase(auction, Phase::Started)?;
        if auction.high_bidder.is_some() {
            return Err(AuctionError::BidsExist);
        }
        let end_time = auction.end_time.unwrap_or(now);
        if now >= end_time {
            return Err(AuctionError::Expired { now, end_time });
        }

        let effect = Effect::Custody {
            resource: auction.resource.clone(),
            from: self.escrow,
            to: auction.seller,
        };
        if let Some(a) = self.auction.as_mut() {
            a.phase = Phase::Canceled;
        }

        if let Err(e) = self.effects.run(&effect) {
            return Err(self.rollback("cancel", e, |engine| {
                if let Some(a) = engine.auction.as_mut() {
                    a.phase = Phase::Started;
                }
            }));
        }

        info!("auction canceled");
        self.events.push(AuctionEvent::Canceled);
        Ok(())
    }

    /// Pay out the caller's pending claim. Returns the amount paid.
    pub fn withdraw(&mut self, caller: &Identity) -> Result<Amount, AuctionError> {
        let owed = self.claims.get(caller);
        if owed == 0 {
            return Err(AuctionError::NoPendingClaim);
        }
        let total_withdrawn = self
            .total_withdrawn
            .checked_add(owed)
            .ok_or(AuctionError::AmountOverflow)?;

        let amount = self.claims.take(caller);
        self.total_withdrawn = total_withdrawn;

        let effect = Effect::Transfer {
            from: self.escrow,
            to: *caller,
            amount,
        };
        if let Err(e) = self.effects.run(&effect) {
            let who = *caller;
            return Err(self.rollback("withdraw", e, |engine| {
                engine.claims.credit(&who, amount);
                engine.total_withdrawn -= amount;
            }));
        }

        debug!(who = %caller.short(), amount, "claim withdrawn");
        self.events.push(AuctionEvent::Withdrawn {
            who: *caller,
            amount,
        });
        Ok(amount)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn phase(&self) -> Phase {
        self.auction.as_ref().map_or(Phase::Uninitialized, |a| a.phase)
    }

    pub fn auction(&self) -> Option<&Auction> {
        self.auction.as_ref()
    }

    pub fn high_bid(&self) -> Amount {
        self.auction.as_ref().map_or(0, |a| a.high_bid)
    }

    pub fn high_bidder(&self) -> Option<&Identity> {
        self.auction.as_ref().and_then(|a| a.high_bidder.as_ref())
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.auction.as_ref().and_then(|a| a.end_time)
    }

    /// Smallest bid that would currently be accepted, if bidding is open
    pub fn min_next_bid(&self) -> Option<Amount> {
        let auction = self.auction.as_ref().filter(|a| a.phase == Phase::Started)?;
        minimum_bid(auction, self.config.increment_divisor).ok()
    }

    /// Seconds until bidding closes (0 once expired), if started
    pub fn time_remaining(&self) -> Option<u64> {
        let end_time = self.end_time()?;
        Some(end_time.saturating_sub(self.clock.now()))
    }

    pub fn pending_claim(&self, who: &Identity) -> Amount {
        self.claims.get(who)
    }

    pub fn total_pending_claims(&self) -> Amount {
        self.claims.total()
    }

    pub fn claims(&self) -> &PendingClaims {
        &self.claims
    }

    /// Sum of every accepted bid
    pub fn total_bid(&self) -> Amount {
        self.total_bid
    }

    /// Sum of every successful withdrawal
    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    /// Escrow account on the external ledger and custody service
    pub fn escrow(&self) -> &Identity {
        &self.escrow
    }

    /// Current holder of the auctioned resource
    pub fn resource_holder(&self) -> Option<Identity> {
        let auction = self.auction.as_ref()?;
        self.effects.owner_of(&auction.resource)
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// Drain buffered events
    pub fn poll_events(&mut self) -> Vec<AuctionEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn current(&self, expected: Phase) -> Result<&Auction, AuctionError> {
        self.auction.as_ref().ok_or(AuctionError::InvalidPhase {
            expected,
            actual: Phase::Uninitialized,
        })
    }

    /// The auction, if it is accepting bids at `now`
    fn open_auction(&self, now: Timestamp) -> Result<&Auction, AuctionError> {
        let auction = self.current(Phase::Started)?;
        expect_phase(auction, Phase::Started)?;

        let end_time = auction.end_time.unwrap_or(now);
        if now >= end_time {
            return Err(AuctionError::Expired { now, end_time });
        }
        Ok(auction)
    }

    /// Restore state after a failed effect and report it
    fn rollback<F>(&mut self, operation: &'static str, err: EffectError, undo: F) -> AuctionError
    where
        F: FnOnce(&mut Self),
    {
        undo(self);
        warn!(operation, error = %err, "effect failed, state restored");
        self.events.push(AuctionEvent::EffectFailed {
            operation,
            error: err.to_string(),
        });
        err.into()
    }
}

impl std::fmt::Debug for AuctionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionEngine")
            .field("escrow", &self.escrow)
            .field("auction", &self.auction)
            .field("claims", &self.claims.len())
            .finish()
    }
}

fn expect_phase(auction: &Auction, expected: Phase) -> Result<(), AuctionError> {
    if auction.phase != expected {
        return Err(AuctionError::InvalidPhase {
            expected,
            actual: auction.phase,
        });
    }
    Ok(())
}

/// Smallest acceptable bid: the floor for the first bid, otherwise strictly
/// more than `high_bid + high_bid / divisor` (integer division).
fn minimum_bid(auction: &Auction, divisor: Amount) -> Result<Amount, AuctionError> {
    if auction.high_bidder.is_none() {
        return Ok(auction.floor_price);
    }
    auction
        .high_bid
        .checked_add(auction.high_bid / divisor)
        .and_then(|v| v.checked_add(1))
        .ok_or(AuctionError::AmountOverflow)
}
