use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity used to bucket rate-limit counters.
///
/// Derived from the caller's network address as reported by the fronting
/// proxy. There are no accounts, so two users behind one NAT share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    /// Fallback identity when no address header is present.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Resolve the client key from proxy headers.
    ///
    /// Precedence: first non-empty entry of `X-Forwarded-For`, then
    /// `X-Real-IP`, then [`ClientKey::UNKNOWN`].
    pub fn from_forwarded(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Self {
        let forwarded = forwarded_for.and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|entry| !entry.is_empty())
        });

        let real_ip = real_ip.map(str::trim).filter(|value| !value.is_empty());

        forwarded
            .or(real_ip)
            .map(Self::new)
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
