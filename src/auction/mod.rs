// Auction module - THE BIDDING
// English auction with a 5% minimum raise and pull-based refunds for outbid bidders

mod claims;
mod engine;
mod error;
mod phase;

pub use claims::PendingClaims;
pub use engine::{Auction, AuctionConfig, AuctionEngine, AuctionEvent, AuctionSnapshot, Settlement};
pub use error::AuctionError;
pub use phase::Phase;
