//! Crate-wide error type, partitioned along the three categories the
//! pipeline distinguishes: programming errors (abort immediately),
//! resource failures (abort only in shutdown-on-error mode), and the
//! distinguished sentinels backends use to signal `SkipDir` / an
//! unclassifiable file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// An invariant was violated (escaped SafePath, duplicate divergent
    /// result, missing backend weight, ...). Always fatal.
    #[error("invariant violated: {0}")]
    Programming(String),

    /// A resource could not be fetched or materialized (clone refused,
    /// non-200 HTTP response, unreadable archive, missing subprocess).
    #[error("resource failure: {0}")]
    Resource(String),

    /// Sentinel returned by a backend to opt out of an entire subtree.
    /// Matched explicitly by the Scanner rather than treated as a normal
    /// failure.
    #[error("skip directory")]
    SkipDir,

    /// Sentinel returned by a whole-file identifier backend when it is
    /// sure it cannot classify the file.
    #[error("unknown license")]
    UnknownLicense,

    /// The run was cancelled. Reported exactly once at the run level.
    #[error("scan cancelled")]
    Cancelled,

    /// A structured-source extractor (DESCRIPTION, bitbake) found a
    /// `License` field it could not parse into any tokens.
    #[error("invalid license format")]
    InvalidLicenseFormat,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    pub fn is_skip_dir(&self) -> bool {
        matches!(self, ScanError::SkipDir)
    }

    pub fn is_unknown_license(&self) -> bool {
        matches!(self, ScanError::UnknownLicense)
    }

    /// Programming errors are invariant violations; they always abort the
    /// scan regardless of the shutdown-on-error switch.
    pub fn is_programming(&self) -> bool {
        matches!(self, ScanError::Programming(_))
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
