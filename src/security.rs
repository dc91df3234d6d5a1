use anyhow::{Result, anyhow};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{SaltString, PasswordHash};

use crate::config::HasherConfig;

/// Salted, slow, one-way hashing of login secrets (Argon2id, PHC string output).
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    pub fn new(cfg: HasherConfig) -> Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {}", e))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, secret: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let phc = self.argon2().hash_password(secret.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
        Ok(phc)
    }

    /// Constant-time check of `secret` against a stored PHC digest. Malformed digests never verify.
    /// Parameters are taken from the digest itself, so older hashes keep verifying after a cost change.
    pub fn verify(&self, secret: &str, digest: &str) -> bool {
        if let Ok(parsed) = PasswordHash::new(digest) {
            self.argon2().verify_password(secret.as_bytes(), &parsed).is_ok()
        } else { false }
    }
}
