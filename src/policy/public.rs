use super::model::Method;
use super::pattern::RoutePattern;

/// Routes that never require a token. Compared against the matched route template, so a supplied
/// token on one of these is simply ignored.
pub const PUBLIC_ROUTES: &[(&str, Method)] = &[
    ("/login", Method::Post),
    ("/signup", Method::Post),
    ("/entries", Method::Get),
    ("/entries/:id", Method::Get),
    ("/files/:id/download", Method::Get),
    ("/health", Method::Get),
];

pub fn is_public(route: &str, method: Method) -> bool {
    let route = RoutePattern::normalize(route);
    PUBLIC_ROUTES.iter().any(|(p, m)| *p == route && *m == method)
}
