//! # Origin Policy
//!
//! Allow-list check for the browser `Origin` header.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "origin_tests.rs"]
mod tests;

/// Front-end origins allowed by default: production and local development
///
/// The bare `https://growfin.ai` host is not included; deployments serving
/// the front-end from it list it in `cors.allowed_origins`.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["https://www.growfin.ai", "http://localhost:5173"];

/// Outcome of checking a request origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginDecision {
    /// No `Origin` header: server-to-server or same-origin call
    NoOrigin,

    /// Origin is on the allow-list; carries the value to echo back
    Allowed(String),

    /// Origin is not on the allow-list
    Denied(String),
}

impl OriginDecision {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }

    /// Origin value to send in `Access-Control-Allow-Origin`, if any
    pub fn allow_origin(&self) -> Option<&str> {
        match self {
            Self::Allowed(origin) => Some(origin.as_str()),
            Self::NoOrigin | Self::Denied(_) => None,
        }
    }
}

/// Fixed allow-list of front-end origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|origin| normalize(origin.as_ref()))
                .filter(|origin| !origin.is_empty())
                .collect(),
        }
    }

    /// Allowed origins after normalization
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Decide whether a request carrying `origin` may proceed
    pub fn check(&self, origin: Option<&str>) -> OriginDecision {
        let Some(origin) = origin else {
            return OriginDecision::NoOrigin;
        };

        let candidate = normalize(origin);
        if self.allowed.iter().any(|allowed| *allowed == candidate) {
            OriginDecision::Allowed(origin.to_string())
        } else {
            OriginDecision::Denied(origin.to_string())
        }
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ORIGINS)
    }
}

// Scheme and host are case-insensitive; a trailing slash is not part of an origin.
fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
