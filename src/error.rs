// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the receipt pipeline.
///
/// Field extraction never produces one of these: it degrades to sentinel
/// values instead. Aggregation and I/O do.
#[derive(Error, Debug)]
pub enum TallyError {
    /// A source directory or file does not exist.
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// A record's amount is not a valid decimal number.
    #[error("invalid amount for {company}: {value:?}")]
    Parse { company: String, value: String },

    /// A company's running total no longer fits in a `Decimal`.
    #[error("total for {company} overflowed")]
    Overflow { company: String },

    /// The text-generation backend failed or answered with garbage.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TallyError>;
