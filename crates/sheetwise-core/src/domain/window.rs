//! Fixed-window counting rules.
//!
//! [`WindowPolicy::evaluate`] is the single source of truth for the
//! algorithm. Limiters and atomic store adapters call it and then persist the
//! returned [`WindowWrite`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::RateRecord;
use crate::error::DomainError;

/// Limit and window length applied to every `(client, endpoint)` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    limit: u32,
    window: Duration,
    window_delta: TimeDelta,
}

impl WindowPolicy {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

    pub fn new(limit: u32, window: Duration) -> Result<Self, DomainError> {
        if limit == 0 {
            return Err(DomainError::InvalidPolicy(
                "limit must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(DomainError::InvalidPolicy(
                "window must be longer than zero".to_string(),
            ));
        }
        let window_delta = TimeDelta::from_std(window)
            .map_err(|e| DomainError::InvalidPolicy(format!("window out of range: {}", e)))?;

        Ok(Self {
            limit,
            window,
            window_delta,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// A window is expired once `window_start < now - window`.
    /// A request landing exactly on the boundary still counts against the old window.
    pub fn is_expired(&self, window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.checked_sub_signed(self.window_delta)
            .is_some_and(|threshold| window_start < threshold)
    }

    /// Decide one request against the stored record.
    pub fn evaluate(&self, record: Option<&RateRecord>, now: DateTime<Utc>) -> Evaluation {
        match record {
            None => Evaluation {
                decision: self.allowed(1),
                write: WindowWrite::Create {
                    count: 1,
                    window_start: now,
                },
            },
            Some(record) if self.is_expired(record.window_start, now) => Evaluation {
                decision: self.allowed(1),
                write: WindowWrite::Update {
                    count: 1,
                    window_start: now,
                },
            },
            // Denied requests do not consume quota.
            Some(record) if record.count >= self.limit => Evaluation {
                decision: self.denied(),
                write: WindowWrite::None,
            },
            Some(record) => {
                let count = record.count + 1;
                Evaluation {
                    decision: self.allowed(count),
                    write: WindowWrite::Update {
                        count,
                        window_start: record.window_start,
                    },
                }
            }
        }
    }

    fn allowed(&self, count: u32) -> Decision {
        Decision {
            allowed: true,
            remaining: self.limit.saturating_sub(count),
            limit: self.limit,
            retry_after: self.window,
        }
    }

    fn denied(&self) -> Decision {
        Decision {
            allowed: false,
            remaining: 0,
            limit: self.limit,
            retry_after: self.window,
        }
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            window: Self::DEFAULT_WINDOW,
            window_delta: TimeDelta::hours(1),
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    /// Hint for clients that were denied; always the full window length.
    pub retry_after: Duration,
}

/// Write required to persist an [`Evaluation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowWrite {
    None,
    Create {
        count: u32,
        window_start: DateTime<Utc>,
    },
    Update {
        count: u32,
        window_start: DateTime<Utc>,
    },
}

/// Outcome of [`WindowPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    pub write: WindowWrite,
}
