//! # Sheetwise Shared
//!
//! Request and response bodies shared between the tool pages and the API.
//! Field names follow the camelCase JSON the browser code already sends.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
