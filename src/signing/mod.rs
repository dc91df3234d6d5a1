//! Content integrity: per-identity keypairs and detached signatures over canonical payloads.
//! One static keypair per identity; there is no rotation or revocation.

mod canonical;
mod keypair;
mod signer;

pub use canonical::canonicalize;
pub use keypair::{parse_public_key, Keypair};
pub use signer::{verify, ContentSignature, ContentSigner, SignOutcome, SignatureStatus, UnsignedReason};

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("random source unavailable: {0}")]
    Entropy(String),
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("private key could not be sealed")]
    Seal,
    #[error("private key could not be unlocked")]
    Unlock,
    #[error("malformed armor: {0}")]
    Armor(String),
}
