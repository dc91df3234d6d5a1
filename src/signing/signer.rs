use std::time::Duration;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::canonical::canonicalize;
use super::keypair::{self, Keypair, PRIVATE_KEY_LABEL, SIGNATURE_LABEL};
use super::SigningError;
use crate::config::{HasherConfig, Secret};

/// Detached signature stored next to the payload version it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSignature {
    pub signer_id: Uuid,
    pub armored: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsignedReason {
    NoKeypair,
    KeyUnavailable,
    TimedOut,
    Internal,
}

impl From<&SigningError> for UnsignedReason {
    fn from(e: &SigningError) -> Self {
        match e {
            SigningError::Unlock | SigningError::Armor(_) | SigningError::Kdf(_) => UnsignedReason::KeyUnavailable,
            SigningError::Entropy(_) | SigningError::Seal => UnsignedReason::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(ContentSignature),
    Unsigned(UnsignedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    Signed,
    Unsigned,
}

impl SignOutcome {
    pub fn status(&self) -> SignatureStatus {
        match self {
            SignOutcome::Signed(_) => SignatureStatus::Signed,
            SignOutcome::Unsigned(_) => SignatureStatus::Unsigned,
        }
    }

    pub fn into_signature(self) -> Option<ContentSignature> {
        match self {
            SignOutcome::Signed(sig) => Some(sig),
            SignOutcome::Unsigned(_) => None,
        }
    }
}

/// Provisions keypairs and signs payloads under the server-wide passphrase.
#[derive(Debug, Clone)]
pub struct ContentSigner {
    passphrase: Secret,
    kdf: HasherConfig,
    timeout: Duration,
}

impl ContentSigner {
    pub fn new(passphrase: Secret, kdf: HasherConfig, timeout: Duration) -> Self {
        Self { passphrase, kdf, timeout }
    }

    pub fn provision(&self, display_name: &str, contact: &str) -> Result<Keypair, SigningError> {
        keypair::provision(display_name, contact, self.passphrase.as_bytes(), self.kdf)
    }

    /// canonicalize → unlock → detached signature → armor. CPU bound; callers on the runtime use [`sign`](Self::sign).
    pub fn sign_blocking(&self, payload: &Value, keypair: &Keypair) -> Result<String, SigningError> {
        let message = canonicalize(payload);
        let sealed = keypair::dearmor(PRIVATE_KEY_LABEL, &keypair.sealed_private_key)?;
        let signing_key = keypair::unseal(&sealed, self.passphrase.as_bytes(), self.kdf)?;
        let signature = signing_key.sign(&message);
        Ok(keypair::armor(SIGNATURE_LABEL, &signature.to_bytes()))
    }

    /// Sign on the blocking pool, bounded by the configured timeout. Never fails; the caller persists either way.
    pub async fn sign(&self, signer_id: Uuid, keypair: Option<&Keypair>, payload: &Value) -> SignOutcome {
        let Some(keypair) = keypair.cloned() else {
            tracing::debug!(target: "signing", %signer_id, "no keypair; storing unsigned");
            return SignOutcome::Unsigned(UnsignedReason::NoKeypair);
        };
        let signer = self.clone();
        let payload = payload.clone();
        let task = tokio::task::spawn_blocking(move || signer.sign_blocking(&payload, &keypair));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(armored))) => SignOutcome::Signed(ContentSignature { signer_id, armored, signed_at: Utc::now() }),
            Ok(Ok(Err(e))) => {
                tracing::warn!(target: "signing", %signer_id, error = %e, "signing failed; storing unsigned");
                SignOutcome::Unsigned(UnsignedReason::from(&e))
            }
            Ok(Err(join)) => {
                tracing::error!(target: "signing", %signer_id, error = %join, "signing task aborted");
                SignOutcome::Unsigned(UnsignedReason::Internal)
            }
            Err(_) => {
                tracing::warn!(target: "signing", %signer_id, timeout_ms = self.timeout.as_millis() as u64, "signing timed out");
                SignOutcome::Unsigned(UnsignedReason::TimedOut)
            }
        }
    }
}

/// True iff `armored_signature` is a valid signature over exactly the canonical bytes of `payload`.
pub fn verify(payload: &Value, armored_signature: &str, armored_public_key: &str) -> bool {
    let Ok(public) = keypair::parse_public_key(armored_public_key) else { return false };
    let Ok(sig_bytes) = keypair::dearmor(SIGNATURE_LABEL, armored_signature) else { return false };
    let Ok(sig_arr) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else { return false };
    let signature = Signature::from_bytes(&sig_arr);
    public.verify(&canonicalize(payload), &signature).is_ok()
}
