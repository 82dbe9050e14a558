//! Domain entities - the core business objects.

mod client;
mod endpoint;
mod record;
mod window;

pub use client::ClientKey;
pub use endpoint::Endpoint;
pub use record::{RateKey, RateRecord};
pub use window::{Decision, Evaluation, WindowPolicy, WindowWrite};
