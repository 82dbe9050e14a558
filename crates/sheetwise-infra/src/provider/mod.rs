//! Tool provider implementations.

mod http;

pub use http::{HttpToolProvider, ToolProviderConfig, UnconfiguredToolProvider};
