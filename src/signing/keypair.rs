//! Per-identity Ed25519 keys.
//!
//! The 32-byte private seed is sealed at rest as
//! `magic || version || salt(16) || nonce(24) || ciphertext+tag`, where the key is Argon2id(passphrase, salt)
//! and the cipher is XChaCha20-Poly1305. Both halves are stored as ASCII armor.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::XChaCha20Poly1305;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::SigningError;
use crate::config::HasherConfig;

const MAGIC: &[u8; 4] = b"WRDK";
const VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 4 + 1 + SALT_LEN + NONCE_LEN;
const TAG_LEN: usize = 16;

pub const PUBLIC_KEY_LABEL: &str = "WARDEN PUBLIC KEY";
pub const PRIVATE_KEY_LABEL: &str = "WARDEN SEALED PRIVATE KEY";
pub const SIGNATURE_LABEL: &str = "WARDEN SIGNATURE";

/// Stored keypair. The private half is only ever present sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// `Display Name <contact>`
    pub user_id: String,
    pub fingerprint: String,
    pub public_key: String,
    pub sealed_private_key: String,
}

fn random_bytes<const N: usize>() -> Result<[u8; N], SigningError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|e| SigningError::Entropy(e.to_string()))?;
    Ok(buf)
}

fn derive_key(passphrase: &[u8], salt: &[u8], kdf: HasherConfig) -> Result<[u8; 32], SigningError> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| SigningError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| SigningError::Kdf(e.to_string()))?;
    Ok(key)
}

pub(crate) fn seal(seed: &[u8; 32], passphrase: &[u8], kdf: HasherConfig) -> Result<Vec<u8>, SigningError> {
    let salt: [u8; SALT_LEN] = random_bytes()?;
    let nonce: [u8; NONCE_LEN] = random_bytes()?;
    let key = derive_key(passphrase, &salt, kdf)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| SigningError::Seal)?;
    let ciphertext = cipher.encrypt(&nonce.into(), seed.as_slice()).map_err(|_| SigningError::Seal)?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn unseal(sealed: &[u8], passphrase: &[u8], kdf: HasherConfig) -> Result<SigningKey, SigningError> {
    if sealed.len() < HEADER_LEN + TAG_LEN || &sealed[0..4] != MAGIC {
        return Err(SigningError::Armor("not a sealed key".into()));
    }
    if sealed[4] != VERSION {
        return Err(SigningError::Armor(format!("unsupported sealed key version {}", sealed[4])));
    }
    let salt = &sealed[5..5 + SALT_LEN];
    let nonce: [u8; NONCE_LEN] = sealed[5 + SALT_LEN..HEADER_LEN]
        .try_into()
        .map_err(|_| SigningError::Armor("bad nonce".into()))?;
    let key = derive_key(passphrase, salt, kdf)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&key).map_err(|_| SigningError::Unlock)?;
    let plain = cipher.decrypt(&nonce.into(), &sealed[HEADER_LEN..]).map_err(|_| SigningError::Unlock)?;
    let seed: [u8; 32] = plain.as_slice().try_into().map_err(|_| SigningError::Unlock)?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn fingerprint(public: &VerifyingKey) -> String {
    Sha256::digest(public.as_bytes())[..20].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate a fresh keypair for `display_name <contact>` and seal the private half under `passphrase`.
pub fn provision(display_name: &str, contact: &str, passphrase: &[u8], kdf: HasherConfig) -> Result<Keypair, SigningError> {
    if passphrase.is_empty() {
        return Err(SigningError::Kdf("empty passphrase".into()));
    }
    let seed: [u8; 32] = random_bytes()?;
    let signing_key = SigningKey::from_bytes(&seed);
    let public = signing_key.verifying_key();
    let sealed = seal(&seed, passphrase, kdf)?;
    let name = display_name.trim();
    let user_id = if name.is_empty() { format!("<{}>", contact) } else { format!("{} <{}>", name, contact) };
    Ok(Keypair {
        user_id,
        fingerprint: fingerprint(&public),
        public_key: armor(PUBLIC_KEY_LABEL, public.as_bytes()),
        sealed_private_key: armor(PRIVATE_KEY_LABEL, &sealed),
    })
}

pub fn parse_public_key(armored: &str) -> Result<VerifyingKey, SigningError> {
    let bytes = dearmor(PUBLIC_KEY_LABEL, armored)?;
    let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| SigningError::Armor("public key length".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| SigningError::Armor(e.to_string()))
}

/// ASCII armor: BEGIN/END lines around base64 wrapped at 64 columns.
pub fn armor(label: &str, bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in b64.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

pub fn dearmor(label: &str, text: &str) -> Result<Vec<u8>, SigningError> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some(begin.as_str()) {
        return Err(SigningError::Armor(format!("expected {}", begin)));
    }
    let mut body = String::new();
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(SigningError::Armor(format!("missing {}", end)));
    }
    STANDARD.decode(body.as_bytes()).map_err(|e| SigningError::Armor(e.to_string()))
}
