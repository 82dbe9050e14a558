//! Background jobs.

#[cfg(feature = "scheduler")]
mod scheduler;
pub mod sweeper;

#[cfg(feature = "scheduler")]
pub use scheduler::Scheduler;
