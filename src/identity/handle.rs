//! Bounded search for a free handle at signup.

use std::time::{Duration, Instant};

use uuid::Uuid;

use super::validate::{handle_from_name, USERNAME_MAX};

pub const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleChoice {
    pub handle: String,
    pub attempts: usize,
    /// True when every candidate was taken (or the budget ran out) and the id-derived handle was used.
    pub fell_back: bool,
}

fn random_below_100() -> u8 {
    let mut b = [0u8; 1];
    match getrandom::getrandom(&mut b) {
        Ok(()) => b[0] % 100,
        Err(_) => (chrono::Utc::now().timestamp_subsec_nanos() % 100) as u8,
    }
}

/// Base candidate when the caller gave no handle: from the display name, else `user` plus random digits.
pub fn base_candidate(display_name: Option<&str>) -> String {
    display_name
        .and_then(handle_from_name)
        .unwrap_or_else(|| format!("user{:02}{:02}", random_below_100(), random_below_100()))
}

/// Handle derived from an identity id. The id is fresh for every signup, so this does not collide with
/// other fallbacks; the unique insert still has the final word.
pub fn fallback_handle(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("u{}", &hex[..USERNAME_MAX - 1])
}

fn with_suffix(base: &str, n: u8) -> String {
    let mut stem = base.to_string();
    stem.truncate(USERNAME_MAX - 2);
    format!("{}{:02}", stem, n)
}

/// Try `base` and then up to `MAX_ATTEMPTS - 1` suffixed variants, stopping early when `budget` runs out.
/// Never loops unbounded: on exhaustion the handle comes from `fallback_id`.
pub fn choose_handle(base: &str, is_taken: impl Fn(&str) -> bool, fallback_id: Uuid, budget: Duration) -> HandleChoice {
    let started = Instant::now();
    let mut attempts = 0;
    while attempts < MAX_ATTEMPTS {
        if attempts > 0 && started.elapsed() >= budget {
            break;
        }
        let candidate = if attempts == 0 { base.to_string() } else { with_suffix(base, random_below_100()) };
        attempts += 1;
        if !is_taken(&candidate) {
            return HandleChoice { handle: candidate, attempts, fell_back: false };
        }
        tracing::debug!(target: "auth", attempt = attempts, "handle candidate taken");
    }
    HandleChoice { handle: fallback_handle(fallback_id), attempts, fell_back: true }
}
