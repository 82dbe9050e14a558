//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod counter_store;
mod rate_limit;
mod tool;

pub use counter_store::{AtomicCounterStore, CounterStore, CounterSweep, StoreError};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use tool::{ProviderError, ToolInvocation, ToolProvider};
