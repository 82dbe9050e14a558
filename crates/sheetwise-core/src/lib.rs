//! # Sheetwise Core
//!
//! The domain layer of the Sheetwise tool gateway.
//! This crate holds the rate-limiting rules and the ports that storage and
//! provider adapters implement. It has no infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use domain::{ClientKey, Decision, Endpoint, RateKey, RateRecord, WindowPolicy};
pub use error::DomainError;
pub use limiter::{AtomicFixedWindowLimiter, FixedWindowLimiter};
