use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup errors. Reported before any page is scraped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("FIRECRAWL_API_KEY environment variable must be set")]
    MissingApiKey,
}

/// An input line that is neither blank, a comment, nor a `Name,URL` pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: expected `Name,URL`, got {raw:?}")]
pub struct MalformedLineError {
    pub line: usize,
    pub raw: String,
}

/// Why a single scrape call did not produce markdown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeFailure {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit or quota exceeded: {0}")]
    RateLimit(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("scrape failed: {0}")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode JSON for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}
