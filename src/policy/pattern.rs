use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Route pattern such as `/entries/:id`. Router-style `{id}` segments are accepted and normalized to `:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

fn param_name(seg: &str) -> Option<&str> {
    if let Some(name) = seg.strip_prefix(':') {
        return Some(name);
    }
    seg.strip_prefix('{').and_then(|s| s.strip_suffix('}'))
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.trim().trim_matches('/').split('/').filter(|s| !s.is_empty())
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(format!("route pattern must start with '/': {}", raw));
        }
        let mut segments = Vec::new();
        for seg in split(raw) {
            match param_name(seg) {
                Some("") => return Err(format!("unnamed parameter in {}", raw)),
                Some(name) => segments.push(Segment::Param(name.to_string())),
                None => segments.push(Segment::Literal(seg.to_string())),
            }
        }
        Ok(Self { segments })
    }

    /// Segment-wise match: literals compare equal, parameters take any single non-empty segment,
    /// and segment counts must agree.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() != self.segments.len() {
            return false;
        }
        self.segments.iter().zip(parts).all(|(seg, part)| match seg {
            Segment::Literal(lit) => lit == part,
            Segment::Param(_) => !part.is_empty(),
        })
    }

    /// Canonical `:param` form of a router template, e.g. `/entries/{id}` → `/entries/:id`.
    pub fn normalize(path: &str) -> String {
        let parts: Vec<String> = split(path)
            .map(|seg| match param_name(seg) {
                Some(name) => format!(":{}", name),
                None => seg.to_string(),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => write!(f, "/{}", s)?,
                Segment::Param(p) => write!(f, "/:{}", p)?,
            }
        }
        Ok(())
    }
}
