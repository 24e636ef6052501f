// Identity module - who is calling, and what is being held
// Identities are opaque tokens; authentication happens before a call reaches this crate

mod id;

pub use id::{Identity, IdentityError, ResourceRef};
