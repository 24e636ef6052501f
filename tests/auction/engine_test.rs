// Auction Engine Tests
// Tests for the create -> start -> bid -> end/cancel lifecycle and refundable claims

use quorumvault::auction::{
    AuctionConfig, AuctionEngine, AuctionError, AuctionEvent, Phase, Settlement,
};
use quorumvault::effects::{AssetCustody, ManualClock, MemoryCustody, MemoryLedger};
use quorumvault::identity::{Identity, ResourceRef};
use quorumvault::ErrorClass;
use std::sync::Arc;

const ONE: u128 = 1_000_000_000_000_000_000;
const START: u64 = 1_700_000_000;
const DURATION: u64 = 7 * 24 * 60 * 60;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Fixture {
    engine: AuctionEngine,
    funds: Arc<MemoryLedger>,
    custody: Arc<MemoryCustody>,
    clock: Arc<ManualClock>,
    escrow: Identity,
    seller: Identity,
    nft: ResourceRef,
}

fn bidder(n: u32) -> Identity {
    Identity::from_label(&format!("bidder{}", n))
}

fn fixture() -> Fixture {
    let escrow = Identity::from_label("escrow");
    let seller = Identity::from_label("seller");
    let nft = ResourceRef::new("artworks", 1);

    let funds = MemoryLedger::new();
    for n in 1..=5 {
        funds.credit(&bidder(n), 100 * ONE);
    }
    let funds = Arc::new(funds);
    let custody = Arc::new(MemoryCustody::new());
    custody.mint(nft.clone(), seller);
    let clock = Arc::new(ManualClock::new(START));

    let engine = AuctionEngine::new(escrow, funds.clone(), custody.clone(), clock.clone());

    Fixture {
        engine,
        funds,
        custody,
        clock,
        escrow,
        seller,
        nft,
    }
}

/// Fixture with an auction created and started at floor `floor`
fn started(floor: u128) -> Fixture {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), floor, DURATION).unwrap();
    f.engine.start(&f.seller).unwrap();
    f
}

// ============================================================================
// CREATE
// ============================================================================

#[test]
fn test_new_engine_is_uninitialized() {
    let f = fixture();

    assert_eq!(f.engine.phase(), Phase::Uninitialized);
    assert!(f.engine.auction().is_none());
    assert_eq!(f.engine.high_bid(), 0);
    assert_eq!(f.engine.min_next_bid(), None);
}

#[test]
fn test_create() {
    let mut f = fixture();

    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    assert_eq!(f.engine.phase(), Phase::Created);
    let auction = f.engine.auction().unwrap();
    assert_eq!(auction.seller(), &f.seller);
    assert_eq!(auction.floor_price(), ONE);
    assert_eq!(auction.end_time(), None);
    // Custody is only taken on start
    assert_eq!(f.custody.owner_of(&f.nft), Some(f.seller));
}

#[test]
fn test_create_twice_fails() {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    let result = f.engine.create(f.seller, f.nft.clone(), ONE, DURATION);

    assert_eq!(result, Err(AuctionError::AlreadyExists));
}

#[test]
fn test_create_zero_duration_fails() {
    let mut f = fixture();

    let result = f.engine.create(f.seller, f.nft.clone(), ONE, 0);

    assert_eq!(result, Err(AuctionError::InvalidDuration(0)));
    assert_eq!(result.unwrap_err().class(), ErrorClass::Policy);
    assert_eq!(f.engine.phase(), Phase::Uninitialized);
}

#[test]
fn test_create_over_max_duration_fails() {
    let mut f = fixture();
    let too_long = AuctionConfig::default().max_duration_secs + 1;

    let result = f.engine.create(f.seller, f.nft.clone(), ONE, too_long);

    assert_eq!(result, Err(AuctionError::InvalidDuration(too_long)));
}

// ============================================================================
// START
// ============================================================================

#[test]
fn test_start_takes_custody() {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    let end_time = f.engine.start(&f.seller).unwrap();

    assert_eq!(end_time, START + DURATION);
    assert_eq!(f.engine.phase(), Phase::Started);
    assert_eq!(f.engine.end_time(), Some(START + DURATION));
    assert_eq!(f.engine.resource_holder(), Some(f.escrow));
    assert_eq!(f.engine.time_remaining(), Some(DURATION));
}

#[test]
fn test_start_by_non_seller_fails() {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    let result = f.engine.start(&bidder(1));

    assert_eq!(result, Err(AuctionError::NotSeller));
    assert_eq!(result.unwrap_err().class(), ErrorClass::Authorization);
    assert_eq!(f.engine.phase(), Phase::Created);
}

#[test]
fn test_start_before_create_fails() {
    let mut f = fixture();

    let result = f.engine.start(&f.seller);

    assert_eq!(
        result,
        Err(AuctionError::InvalidPhase {
            expected: Phase::Created,
            actual: Phase::Uninitialized
        })
    );
}

#[test]
fn test_start_twice_fails() {
    let mut f = started(ONE);

    let result = f.engine.start(&f.seller);

    assert_eq!(
        result,
        Err(AuctionError::InvalidPhase {
            expected: Phase::Created,
            actual: Phase::Started
        })
    );
}

// ============================================================================
// BID
// ============================================================================

#[test]
fn test_first_bid_at_floor_accepted() {
    let mut f = started(ONE);

    f.engine.bid(&bidder(1), ONE).unwrap();

    assert_eq!(f.engine.high_bid(), ONE);
    assert_eq!(f.engine.high_bidder(), Some(&bidder(1)));
    assert_eq!(f.funds.balance_of(&f.escrow), ONE);
    assert_eq!(f.funds.balance_of(&bidder(1)), 99 * ONE);
}

#[test]
fn test_first_bid_below_floor_rejected() {
    let mut f = started(ONE);

    let result = f.engine.bid(&bidder(1), ONE - 1);

    assert_eq!(
        result,
        Err(AuctionError::BidTooLow {
            amount: ONE - 1,
            minimum: ONE
        })
    );
    assert!(f.funds.transfers().is_empty());
}

#[test]
fn test_scenario_five_percent_increment() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    let exactly_five_percent = ONE + ONE / 20;

    let rejected = f.engine.bid(&bidder(2), exactly_five_percent);
    assert_eq!(
        rejected,
        Err(AuctionError::BidTooLow {
            amount: exactly_five_percent,
            minimum: exactly_five_percent + 1
        })
    );

    f.engine.bid(&bidder(2), exactly_five_percent + 1).unwrap();
    assert_eq!(f.engine.high_bidder(), Some(&bidder(2)));
    assert_eq!(f.engine.high_bid(), 1_050_000_000_000_000_001);
}

#[test]
fn test_increment_truncates_for_small_bids() {
    let mut f = started(1);
    f.engine.bid(&bidder(1), 19).unwrap();

    // 19 / 20 == 0, so any strictly higher bid is enough
    assert_eq!(f.engine.min_next_bid(), Some(20));
    f.engine.bid(&bidder(2), 20).unwrap();

    // 20 / 20 == 1, so the next bid must exceed 21
    assert!(matches!(
        f.engine.bid(&bidder(3), 21),
        Err(AuctionError::BidTooLow { minimum: 22, .. })
    ));
    f.engine.bid(&bidder(3), 22).unwrap();
}

#[test]
fn test_equal_bid_rejected_even_without_increment() {
    let mut f = started(1);
    f.engine.bid(&bidder(1), 5).unwrap();

    assert!(matches!(
        f.engine.bid(&bidder(2), 5),
        Err(AuctionError::BidTooLow { .. })
    ));
}

#[test]
fn test_bid_before_start_fails() {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    let result = f.engine.bid(&bidder(1), ONE);

    assert_eq!(
        result,
        Err(AuctionError::InvalidPhase {
            expected: Phase::Started,
            actual: Phase::Created
        })
    );
}

#[test]
fn test_bid_at_end_time_expired() {
    let mut f = started(ONE);
    f.clock.set(START + DURATION);

    let result = f.engine.bid(&bidder(1), ONE);

    assert_eq!(
        result,
        Err(AuctionError::Expired {
            now: START + DURATION,
            end_time: START + DURATION
        })
    );
}

#[test]
fn test_bid_just_before_end_accepted() {
    let mut f = started(ONE);
    f.clock.set(START + DURATION - 1);

    f.engine.bid(&bidder(1), ONE).unwrap();

    assert_eq!(f.engine.time_remaining(), Some(1));
}

#[test]
fn test_outbid_bidder_gets_claim() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();

    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    assert_eq!(f.engine.pending_claim(&bidder(1)), ONE);
    assert_eq!(f.engine.pending_claim(&bidder(2)), 0);
    assert_eq!(f.funds.balance_of(&f.escrow), 3 * ONE);
}

#[test]
fn test_scenario_claim_not_double_counted() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    f.engine.bid(&bidder(3), 3 * ONE).unwrap();

    assert_eq!(f.engine.pending_claim(&bidder(1)), ONE);
    assert_eq!(f.engine.pending_claim(&bidder(2)), 2 * ONE);
    assert_eq!(f.engine.total_pending_claims(), 3 * ONE);
}

#[test]
fn test_claims_accumulate_across_outbids() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();
    f.engine.bid(&bidder(1), 3 * ONE).unwrap();

    f.engine.bid(&bidder(2), 4 * ONE).unwrap();

    assert_eq!(f.engine.pending_claim(&bidder(1)), 4 * ONE);
    assert_eq!(f.engine.pending_claim(&bidder(2)), 2 * ONE);
}

#[test]
fn test_bid_events() {
    let mut f = started(ONE);
    f.engine.poll_events();
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    assert_eq!(
        f.engine.poll_events(),
        vec![
            AuctionEvent::BidPlaced {
                bidder: bidder(1),
                amount: ONE
            },
            AuctionEvent::Outbid {
                bidder: bidder(1),
                refundable: ONE
            },
            AuctionEvent::BidPlaced {
                bidder: bidder(2),
                amount: 2 * ONE
            },
        ]
    );
}

// ============================================================================
// END
// ============================================================================

#[test]
fn test_end_before_expiry_fails() {
    let mut f = started(ONE);
    f.clock.set(START + DURATION - 1);

    let result = f.engine.end(&bidder(1));

    assert!(matches!(result, Err(AuctionError::NotYetExpired { .. })));
    assert_eq!(f.engine.phase(), Phase::Started);
}

#[test]
fn test_end_with_winner() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();
    f.clock.advance(DURATION);

    let settlement = f.engine.end(&bidder(3)).unwrap();

    assert_eq!(
        settlement,
        Settlement {
            winner: Some(bidder(2)),
            amount: 2 * ONE,
            proceeds_deferred: false
        }
    );
    assert_eq!(f.engine.phase(), Phase::Ended);
    assert_eq!(f.custody.owner_of(&f.nft), Some(bidder(2)));
    assert_eq!(f.funds.balance_of(&f.seller), 2 * ONE);
    // The outbid bid stays in escrow until withdrawn
    assert_eq!(f.funds.balance_of(&f.escrow), ONE);
}

#[test]
fn test_end_without_bids_returns_custody() {
    let mut f = started(ONE);
    f.clock.advance(DURATION);

    let settlement = f.engine.end(&f.seller).unwrap();

    assert_eq!(settlement.winner, None);
    assert_eq!(settlement.amount, 0);
    assert_eq!(f.custody.owner_of(&f.nft), Some(f.seller));
    assert_eq!(f.funds.balance_of(&f.seller), 0);
}

#[test]
fn test_end_only_once() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.clock.advance(DURATION);
    f.engine.end(&f.seller).unwrap();

    let result = f.engine.end(&f.seller);

    assert_eq!(
        result,
        Err(AuctionError::InvalidPhase {
            expected: Phase::Started,
            actual: Phase::Ended
        })
    );
    assert_eq!(f.funds.balance_of(&f.seller), ONE);
}

#[test]
fn test_terminal_phase_is_absorbing() {
    let mut f = started(ONE);
    f.clock.advance(DURATION);
    f.engine.end(&f.seller).unwrap();

    assert!(matches!(f.engine.start(&f.seller), Err(AuctionError::InvalidPhase { .. })));
    assert!(matches!(f.engine.bid(&bidder(1), ONE), Err(AuctionError::InvalidPhase { .. })));
    assert!(matches!(f.engine.cancel(&f.seller), Err(AuctionError::InvalidPhase { .. })));
    assert!(f.engine.phase().is_terminal());
}

// ============================================================================
// CANCEL
// ============================================================================

#[test]
fn test_cancel_without_bids() {
    let mut f = started(ONE);

    f.engine.cancel(&f.seller).unwrap();

    assert_eq!(f.engine.phase(), Phase::Canceled);
    assert_eq!(f.custody.owner_of(&f.nft), Some(f.seller));
}

#[test]
fn test_cancel_by_non_seller_fails() {
    let mut f = started(ONE);

    assert_eq!(f.engine.cancel(&bidder(1)), Err(AuctionError::NotSeller));
}

#[test]
fn test_scenario_cancel_with_bids_fails() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();

    let result = f.engine.cancel(&f.seller);

    assert_eq!(result, Err(AuctionError::BidsExist));
    assert_eq!(f.engine.phase(), Phase::Started);
}

#[test]
fn test_scenario_cancel_after_expiry_fails() {
    let mut f = started(ONE);
    f.clock.advance(DURATION);

    let result = f.engine.cancel(&f.seller);

    assert!(matches!(result, Err(AuctionError::Expired { .. })));
    assert_eq!(f.engine.phase(), Phase::Started);
}

#[test]
fn test_cancel_before_start_fails() {
    let mut f = fixture();
    f.engine.create(f.seller, f.nft.clone(), ONE, DURATION).unwrap();

    let result = f.engine.cancel(&f.seller);

    assert_eq!(
        result,
        Err(AuctionError::InvalidPhase {
            expected: Phase::Started,
            actual: Phase::Created
        })
    );
}

#[test]
fn test_canceled_auction_cannot_end() {
    let mut f = started(ONE);
    f.engine.cancel(&f.seller).unwrap();
    f.clock.advance(DURATION);

    assert!(matches!(f.engine.end(&f.seller), Err(AuctionError::InvalidPhase { .. })));
}

// ============================================================================
// WITHDRAW
// ============================================================================

#[test]
fn test_withdraw_pays_claim_once() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    let paid = f.engine.withdraw(&bidder(1)).unwrap();
    let second = f.engine.withdraw(&bidder(1));

    assert_eq!(paid, ONE);
    assert_eq!(second, Err(AuctionError::NoPendingClaim));
    assert_eq!(f.funds.balance_of(&bidder(1)), 100 * ONE);
    assert_eq!(f.engine.pending_claim(&bidder(1)), 0);
    assert_eq!(f.engine.total_withdrawn(), ONE);
}

#[test]
fn test_withdraw_without_claim_fails() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();

    // The current high bidder has nothing to withdraw
    assert_eq!(f.engine.withdraw(&bidder(1)), Err(AuctionError::NoPendingClaim));
    assert_eq!(f.engine.withdraw(&bidder(4)), Err(AuctionError::NoPendingClaim));
}

#[test]
fn test_withdraw_after_end() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();
    f.clock.advance(DURATION);
    f.engine.end(&f.seller).unwrap();

    f.engine.withdraw(&bidder(1)).unwrap();

    assert_eq!(f.funds.balance_of(&f.escrow), 0);
    assert_eq!(f.funds.balance_of(&bidder(1)), 100 * ONE);
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn test_custom_increment_divisor() {
    let f = fixture();
    let mut engine = AuctionEngine::with_config(
        AuctionConfig::new().with_increment_divisor(10),
        f.escrow,
        f.funds.clone(),
        f.custody.clone(),
        f.clock.clone(),
    )
    .unwrap();
    engine.create(f.seller, f.nft.clone(), 100, DURATION).unwrap();
    engine.start(&f.seller).unwrap();
    engine.bid(&bidder(1), 100).unwrap();

    assert_eq!(engine.min_next_bid(), Some(111));
}

#[test]
fn test_invalid_config_rejected() {
    let f = fixture();

    let result = AuctionEngine::with_config(
        AuctionConfig::new().with_increment_divisor(0),
        f.escrow,
        f.funds.clone(),
        f.custody.clone(),
        f.clock.clone(),
    );

    assert!(matches!(result, Err(AuctionError::InvalidConfig(_))));
}

// ============================================================================
// ESCROW ACCOUNT
// ============================================================================

#[test]
fn test_escrow_cannot_bid() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    let result = f.engine.bid(&f.escrow, 3 * ONE);

    assert_eq!(result, Err(AuctionError::InvalidBidder(f.escrow)));
    assert_eq!(result.unwrap_err().class(), ErrorClass::Policy);
    assert_eq!(f.engine.high_bidder(), Some(&bidder(2)));
    assert_eq!(f.engine.high_bid(), 2 * ONE);
    assert_eq!(f.engine.total_bid(), 3 * ONE);
    assert_eq!(f.engine.pending_claim(&bidder(2)), 0);
    assert_eq!(
        f.funds.balance_of(&f.escrow),
        f.engine.total_pending_claims() + f.engine.high_bid()
    );
}

#[test]
fn test_outbid_bidders_can_withdraw_after_escrow_bid_rejected() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), 5 * ONE).unwrap();
    f.engine.bid(&bidder(2), 6 * ONE).unwrap();
    assert!(f.engine.bid(&f.escrow, 7 * ONE).is_err());
    f.clock.advance(DURATION);

    let settlement = f.engine.end(&bidder(3)).unwrap();
    f.engine.withdraw(&bidder(1)).unwrap();

    assert_eq!(settlement.winner, Some(bidder(2)));
    assert_eq!(f.funds.balance_of(&f.seller), 6 * ONE);
    assert_eq!(f.funds.balance_of(&bidder(1)), 100 * ONE);
    assert_eq!(f.funds.balance_of(&f.escrow), 0);
    assert_eq!(f.engine.withdraw(&bidder(2)), Err(AuctionError::NoPendingClaim));
}

#[test]
fn test_escrow_cannot_sell() {
    let mut f = fixture();

    let result = f.engine.create(f.escrow, f.nft.clone(), ONE, DURATION);

    assert_eq!(result, Err(AuctionError::InvalidSeller(f.escrow)));
    assert_eq!(f.engine.phase(), Phase::Uninitialized);
}

// ============================================================================
// SNAPSHOT RESTORE
// ============================================================================

#[test]
fn test_restore_from_valid_snapshot() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();

    let restored = AuctionEngine::from_snapshot(
        f.engine.snapshot(),
        f.funds.clone(),
        f.custody.clone(),
        f.clock.clone(),
    )
    .unwrap();

    assert_eq!(restored.snapshot(), f.engine.snapshot());
}

#[test]
fn test_restore_rejects_unbalanced_totals() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();
    let mut snapshot = f.engine.snapshot();
    snapshot.total_bid += ONE;

    let result = AuctionEngine::from_snapshot(snapshot, f.funds.clone(), f.custody.clone(), f.clock.clone());

    assert!(matches!(result, Err(AuctionError::SnapshotFailed(_))));
}

#[test]
fn test_restore_rejects_more_withdrawn_than_bid() {
    let f = started(ONE);
    let mut snapshot = f.engine.snapshot();
    snapshot.total_withdrawn = 1;

    let result = AuctionEngine::from_snapshot(snapshot, f.funds.clone(), f.custody.clone(), f.clock.clone());

    assert!(matches!(result, Err(AuctionError::SnapshotFailed(_))));
}

#[test]
fn test_restore_accepts_settled_auction() {
    let mut f = started(ONE);
    f.engine.bid(&bidder(1), ONE).unwrap();
    f.engine.bid(&bidder(2), 2 * ONE).unwrap();
    f.clock.advance(DURATION);
    f.funds.fail_next_transfers(1);
    let settlement = f.engine.end(&f.seller).unwrap();
    assert!(settlement.proceeds_deferred);

    let restored = AuctionEngine::from_snapshot(
        f.engine.snapshot(),
        f.funds.clone(),
        f.custody.clone(),
        f.clock.clone(),
    )
    .unwrap();

    assert_eq!(restored.phase(), Phase::Ended);
    assert_eq!(restored.pending_claim(&f.seller), 2 * ONE);
}
