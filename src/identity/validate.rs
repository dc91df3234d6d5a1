//! Normalization and format checks for signup/login identifiers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-.~]+$").expect("username regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone regex"));

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 20;

pub fn strip_username(raw: &str) -> String {
    raw.replace(' ', "").to_lowercase()
}

pub fn strip_email(raw: &str) -> String {
    raw.replace(' ', "").to_lowercase()
}

pub fn strip_phone(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '-' | ' ' | '(' | ')')).collect::<String>().to_lowercase()
}

pub fn is_valid_username(s: &str) -> bool {
    (USERNAME_MIN..=USERNAME_MAX).contains(&s.len()) && USERNAME_RE.is_match(s)
}

pub fn is_valid_email(s: &str) -> bool { EMAIL_RE.is_match(s) }

pub fn is_valid_phone(s: &str) -> bool { PHONE_RE.is_match(s) }

pub fn check_username(s: &str) -> AppResult<()> {
    if is_valid_username(s) { Ok(()) } else {
        Err(AppError::user(
            "invalid_username",
            "Username must be 3-20 characters of letters, numbers, and other url-safe characters.",
        ))
    }
}

pub fn check_email(s: &str) -> AppResult<()> {
    if is_valid_email(s) { Ok(()) } else { Err(AppError::user("invalid_email", "Improperly formatted email address.")) }
}

pub fn check_phone(s: &str) -> AppResult<()> {
    if is_valid_phone(s) { Ok(()) } else { Err(AppError::user("invalid_phone", "Improperly formatted phone number.")) }
}

/// Derive a handle candidate from a display name: lowercase, spaces to dots, anything else outside the
/// handle alphabet dropped, clipped to the maximum length. `None` when nothing usable is left.
pub fn handle_from_name(name: &str) -> Option<String> {
    let mut out: String = name
        .trim()
        .to_lowercase()
        .replace(' ', ".")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~'))
        .collect();
    out.truncate(USERNAME_MAX);
    if out.len() < USERNAME_MIN { None } else { Some(out) }
}
