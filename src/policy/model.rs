use std::fmt;
use std::str::FromStr;

use super::pattern::RoutePattern;
use crate::identity::Role;

/// HTTP method as it appears in policy rows. `Any` is written `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Any => "*",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Rule-side match: `*` covers every request method.
    pub fn covers(&self, request: Method) -> bool {
        *self == Method::Any || *self == request
    }

    pub fn from_http(m: &axum::http::Method) -> Option<Method> {
        m.as_str().parse().ok().filter(|m| *m != Method::Any)
    }
}

impl FromStr for Method {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "*" => Ok(Method::Any),
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unknown method '{}'", other)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// One `(role, route-pattern, method)` grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub role: Role,
    pub pattern: RoutePattern,
    pub method: Method,
}

/// Outcome with a short reason for tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allow: bool,
    pub reason: Option<String>,
}
