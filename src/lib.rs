//! Quorum-approved escrow ledger and English auction engine.
//!
//! Two state machines share one execution model: every public operation is
//! a single atomic step that commits its own state first and only then asks
//! an external collaborator (`effects::Ledger`, `effects::AssetCustody`) to
//! move funds or resources. A failed collaborator call is reported as a
//! typed error and never retried automatically.

pub mod approval;
pub mod auction;
pub mod effects;
pub mod error;
pub mod identity;
pub mod shared;
pub mod storage;
pub mod telemetry;

pub use error::ErrorClass;
