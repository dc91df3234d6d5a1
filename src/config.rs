//! Process-wide configuration.
//!
//! Built once in `main` (normally from `WARDEN_*` environment variables) and handed to every
//! component behind an `Arc`. Components never read the environment themselves.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// A configuration secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self { Self(value.into()) }
    pub fn expose(&self) -> &str { &self.0 }
    pub fn as_bytes(&self) -> &[u8] { self.0.as_bytes() }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Secret(<redacted>)") }
}

/// Argon2 cost parameters shared by the secret hasher and the private-key sealing KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self { memory_kib: 19_456, iterations: 2, parallelism: 1 }
    }
}

impl HasherConfig {
    /// Cheap parameters for tests; never use in production.
    pub fn light() -> Self { Self { memory_kib: 1024, iterations: 1, parallelism: 1 } }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// HMAC key for bearer tokens.
    pub token_secret: Secret,
    pub token_ttl: Duration,
    /// Server-wide passphrase sealing every identity's private key.
    pub key_passphrase: Secret,
    pub policy_path: PathBuf,
    pub signing_timeout: Duration,
    pub min_secret_len: usize,
    /// Used to render `@domain:handle`.
    pub domain: String,
    pub hasher: HasherConfig,
    /// Upper bound on the time spent searching for a free handle at signup.
    pub handle_search_budget: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 7878,
            token_secret: Secret::new(""),
            token_ttl: Duration::from_secs(72 * 3600),
            key_passphrase: Secret::new(""),
            policy_path: PathBuf::from("policy/policy.csv"),
            signing_timeout: Duration::from_millis(2000),
            min_secret_len: 1,
            domain: "localhost".to_string(),
            hasher: HasherConfig::default(),
            handle_search_budget: Duration::from_millis(250),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid value for {}: {}", name, e)),
        _ => Ok(None),
    }
}

fn env_required(name: &str) -> Result<Secret> {
    let v = std::env::var(name).with_context(|| format!("Missing required config: {}", name))?;
    if v.is_empty() {
        return Err(anyhow!("Missing required config: {}", name));
    }
    Ok(Secret::new(v))
}

impl Config {
    /// Read configuration from `WARDEN_*` variables. The token secret and key passphrase are required.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Config::default();
        cfg.token_secret = env_required("WARDEN_TOKEN_SECRET")?;
        cfg.key_passphrase = env_required("WARDEN_KEY_PASSPHRASE")?;
        if let Some(p) = env_parse::<u16>("WARDEN_HTTP_PORT")? { cfg.http_port = p; }
        if let Some(p) = env_parse::<String>("WARDEN_POLICY_PATH")? { cfg.policy_path = PathBuf::from(p); }
        if let Some(s) = env_parse::<u64>("WARDEN_TOKEN_TTL_SECS")? { cfg.token_ttl = Duration::from_secs(s); }
        if let Some(ms) = env_parse::<u64>("WARDEN_SIGNING_TIMEOUT_MS")? { cfg.signing_timeout = Duration::from_millis(ms); }
        if let Some(n) = env_parse::<usize>("WARDEN_MIN_SECRET_LEN")? { cfg.min_secret_len = n.max(1); }
        if let Some(d) = env_parse::<String>("WARDEN_DOMAIN")? { cfg.domain = d; }
        if let Some(m) = env_parse::<u32>("WARDEN_ARGON2_MEMORY_KIB")? { cfg.hasher.memory_kib = m; }
        if let Some(t) = env_parse::<u32>("WARDEN_ARGON2_ITERATIONS")? { cfg.hasher.iterations = t; }
        if let Some(p) = env_parse::<u32>("WARDEN_ARGON2_PARALLELISM")? { cfg.hasher.parallelism = p; }
        Ok(cfg)
    }

    /// Configuration with fixed secrets and light hashing, for tests and local experiments.
    pub fn for_tests() -> Self {
        Self {
            token_secret: Secret::new("test-token-secret-0123456789abcdef"),
            key_passphrase: Secret::new("test-key-passphrase"),
            hasher: HasherConfig::light(),
            ..Config::default()
        }
    }
}
