//! Route-level authorization (default deny, union across roles).
//! The table is built once at startup and shared read-only behind an `Arc`.

use std::collections::HashMap;

use super::model::{Decision, Method, PolicyRule};
use super::pattern::RoutePattern;
use crate::identity::{Principal, Role};

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    by_role: HashMap<Role, Vec<(RoutePattern, Method)>>,
    len: usize,
}

impl PolicyTable {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        let len = rules.len();
        let mut by_role: HashMap<Role, Vec<(RoutePattern, Method)>> = HashMap::new();
        for r in rules {
            by_role.entry(r.role).or_default().push((r.pattern, r.method));
        }
        Self { by_role, len }
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    fn role_allows(&self, role: &Role, route: &str, method: Method) -> bool {
        self.by_role
            .get(role)
            .is_some_and(|grants| grants.iter().any(|(p, m)| m.covers(method) && p.matches(route)))
    }

    pub fn decide(&self, principal: &Principal, route: &str, method: Method) -> Decision {
        match principal.roles.iter().find(|role| self.role_allows(role, route, method)) {
            Some(role) => Decision { allow: true, reason: Some(format!("role_{}", role)) },
            None => Decision { allow: false, reason: Some("no_matching_rule".into()) },
        }
    }

    /// True iff at least one of the principal's roles has a rule covering `(route, method)`.
    pub fn authorize(&self, principal: &Principal, route: &str, method: Method) -> bool {
        self.decide(principal, route, method).allow
    }
}
