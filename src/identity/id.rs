use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const ID_PREFIX: &str = "id:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid identity format: {0}")]
    InvalidFormat(String),

    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid identity length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Opaque, comparable identity of a caller in the format: id:<base58_bytes>
///
/// Authentication happens outside this crate; an `Identity` is only ever
/// compared, ordered and hashed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Identity {
    /// Generate a random identity
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a stable identity from a human-readable label
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"identity:");
        hasher.update(label.as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex form used in log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse an identity from its display form
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let encoded = s
            .strip_prefix(ID_PREFIX)
            .ok_or_else(|| IdentityError::InvalidFormat(format!("missing '{}' prefix", ID_PREFIX)))?;

        if encoded.is_empty() {
            return Err(IdentityError::InvalidFormat("key part cannot be empty".into()));
        }

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| IdentityError::InvalidBase58(e.to_string()))?;

        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ID_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short())
    }
}

/// Reference to a transferable resource held in custody
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    collection: String,
    token_id: u64,
}

impl ResourceRef {
    pub fn new(collection: impl Into<String>, token_id: u64) -> Self {
        Self {
            collection: collection.into(),
            token_id,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn token_id(&self) -> u64 {
        self.token_id
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collection, self.token_id)
    }
}
