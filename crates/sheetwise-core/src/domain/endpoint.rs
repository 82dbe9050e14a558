use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// AI-backed operations that are protected by the rate limiter.
///
/// Each endpoint has its own quota, so exhausting the formula generator
/// leaves the SQL generator untouched for the same caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    AiSearch,
    FormulaGenerator,
    VbaGenerator,
    SqlGenerator,
    SentimentAnalysis,
    DocumentConvert,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::AiSearch,
        Endpoint::FormulaGenerator,
        Endpoint::VbaGenerator,
        Endpoint::SqlGenerator,
        Endpoint::SentimentAnalysis,
        Endpoint::DocumentConvert,
    ];

    /// Wire name, used in routes and as the stored counter key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::AiSearch => "ai-search",
            Endpoint::FormulaGenerator => "formula-generator",
            Endpoint::VbaGenerator => "vba-generator",
            Endpoint::SqlGenerator => "sql-generator",
            Endpoint::SentimentAnalysis => "sentiment-analysis",
            Endpoint::DocumentConvert => "document-convert",
        }
    }

    /// Accepted input length in characters, after trimming.
    pub fn input_bounds(&self) -> RangeInclusive<usize> {
        match self {
            Endpoint::AiSearch => 2..=500,
            Endpoint::FormulaGenerator | Endpoint::VbaGenerator | Endpoint::SqlGenerator => {
                5..=2_000
            }
            Endpoint::SentimentAnalysis => 10..=5_000,
            Endpoint::DocumentConvert => 1..=10_000,
        }
    }

    /// Validate a tool input and return it trimmed.
    pub fn validate_input<'a>(&self, input: &'a str) -> Result<&'a str, DomainError> {
        let trimmed = input.trim();
        let length = trimmed.chars().count();
        let bounds = self.input_bounds();

        if trimmed.is_empty() {
            return Err(DomainError::Validation("Input is required.".to_string()));
        }
        if length < *bounds.start() {
            return Err(DomainError::Validation(format!(
                "Input is too short. Please provide at least {} characters.",
                bounds.start()
            )));
        }
        if length > *bounds.end() {
            return Err(DomainError::Validation(format!(
                "Input is too long. Please keep it under {} characters.",
                bounds.end()
            )));
        }

        Ok(trimmed)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEndpoint(s.to_string()))
    }
}
