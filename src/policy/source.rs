//! CSV policy source.
//!
//! One grant per line: `p, <role>, <route-pattern>, <METHOD>` (the leading `p` is optional).
//! Blank lines and lines starting with `#` are ignored. Any other malformed line rejects the whole source.

use std::path::Path;

use super::evaluator::PolicyTable;
use super::model::{Method, PolicyRule};
use super::pattern::RoutePattern;
use crate::error::{AppError, AppResult};
use crate::identity::Role;

fn malformed(line_no: usize, why: impl std::fmt::Display) -> AppError {
    AppError::internal("policy_malformed", format!("policy line {}: {}", line_no, why))
}

pub fn parse_rules(text: &str) -> AppResult<Vec<PolicyRule>> {
    let mut rules = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut cols: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if cols.first().is_some_and(|c| c.eq_ignore_ascii_case("p")) {
            cols.remove(0);
        }
        let [role, pattern, method] = cols.as_slice() else {
            return Err(malformed(line_no, format!("expected 'role, pattern, METHOD', got {} column(s)", cols.len())));
        };
        if role.is_empty() {
            return Err(malformed(line_no, "empty role"));
        }
        let pattern = RoutePattern::parse(pattern).map_err(|e| malformed(line_no, e))?;
        let method: Method = method.parse().map_err(|e| malformed(line_no, e))?;
        rules.push(PolicyRule { role: Role::parse(role), pattern, method });
    }
    Ok(rules)
}

/// Read and compile the policy file. Unreadable or malformed sources are fatal at startup.
pub fn load_policy(path: &Path) -> AppResult<PolicyTable> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::internal("policy_unreadable", format!("cannot read policy source {}: {}", path.display(), e))
    })?;
    let rules = parse_rules(&text)?;
    if rules.is_empty() {
        tracing::warn!(target: "policy", path = %path.display(), "policy source has no rules; every protected route will be denied");
    }
    tracing::info!(target: "policy", path = %path.display(), rules = rules.len(), "policy loaded");
    Ok(PolicyTable::new(rules))
}
