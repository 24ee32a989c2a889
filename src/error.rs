// src/error.rs

//! Error types for srcmirror
//!
//! Library code returns [`Result`]; the binary wraps these in `anyhow`
//! at command boundaries.

use thiserror::Error;

/// Errors raised by the update pipeline and its storage adapters
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Mirror error: {0}")]
    MirrorError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Extraction failed: {0}")]
    ExtractionError(String),

    #[error("Hook failed: {0}")]
    HookError(String),

    #[error("Observer failed: {0}")]
    ObserverError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
