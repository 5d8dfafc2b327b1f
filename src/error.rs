//! Error types for the bulk filing acquisition engine.
//!
//! Every fallible operation returns `Result<T, FetchError>`. Variants are grouped
//! loosely by the taxonomy the rest of the crate reasons about: configuration
//! errors (fail before any network activity), transient network errors (already
//! exhausted their retry budget by the time they reach a caller), permanent
//! network errors, parse errors, and filesystem errors. `FilingResult::error`
//! stores the `Display` text of one of these, not the variant itself, so results
//! stay plain data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("missing or malformed contact user-agent (must contain '@')")]
    MissingUserAgent,

    #[error("unknown form types: {}{}", unknown.join(", "), if *truncated { ", ..." } else { "" })]
    UnknownFormTypes { unknown: Vec<String>, truncated: bool },

    #[error("rate must be greater than zero, got {0}")]
    InvalidRate(f64),

    #[error("file-extension list must not be empty")]
    EmptyExtensionList,

    #[error("unsupported tar provider: {0}")]
    InvalidTarProvider(String),

    #[error("year/quarter/forms and an entity filter cannot both be set")]
    ConflictingAcquisitionInput,

    #[error("rate limited after exhausting retries")]
    RateLimited,

    #[error("server error {status} after exhausting retries")]
    ServerError { status: u16 },

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("request to {url} timed out after exhausting retries")]
    TimedOut { url: String },

    #[error("unexpected content type for {url}: expected {expected}, got {got}")]
    UnexpectedContentType {
        url: String,
        expected: String,
        got: String,
    },

    #[error("master index parse error: {0}")]
    MasterIndexParse(String),

    #[error("folder listing malformed: {0}")]
    FolderListingMalformed(String),

    #[error("no files matched the configured extensions for accession {accession}")]
    NoMatchingFiles { accession: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;
