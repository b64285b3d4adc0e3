//! Ambient configuration: cache location, the shutdown-on-error switch,
//! and the file-backed inputs a renderer would otherwise load (profile,
//! regexp rules, backend weights), parsed with `toml` for TOML config
//! and `serde_json` elsewhere.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::backend::BackendWeights;
use crate::cache::CachePrefix;
use crate::error::{ScanError, ScanResult};
use crate::profile::Profile;

/// Knobs that govern one `Core::run` invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub cache: CachePrefix,
    pub allow_http: bool,
    pub debug: bool,
    pub shutdown_on_error: bool,
}

impl ScanOptions {
    pub fn new(program: &str) -> Self {
        ScanOptions {
            cache: CachePrefix::for_program(program),
            allow_http: false,
            debug: false,
            shutdown_on_error: false,
        }
    }
}

/// Loads `{licenses: [string], exclude: bool, comment: string}`.
/// Identifiers that aren't valid SPDX are parsed via `License::parse` as
/// `Name(Origin)`/custom.
pub fn load_profile(path: &Path) -> ScanResult<Profile> {
    #[derive(Deserialize)]
    struct RawProfile {
        licenses: Vec<String>,
        #[serde(default)]
        exclude: bool,
        #[serde(default)]
        comment: String,
    }

    let text = std::fs::read_to_string(path).map_err(ScanError::Io)?;
    let raw: RawProfile = serde_json::from_str(&text)?;
    let licenses = raw.licenses.iter().map(|s| crate::license::License::parse(s)).collect();
    Ok(Profile { licenses, exclude: raw.exclude, comment: raw.comment })
}

/// Loads the regexp backend's rule file: `{rules: [...], origin, comment}`.
pub fn load_regexp_rules(path: &Path) -> ScanResult<crate::backend::regexp::RegexpBackend> {
    let bytes = std::fs::read(path).map_err(ScanError::Io)?;
    crate::backend::regexp::RegexpBackend::from_json(&bytes)
}

/// Loads an optional backend-weights table from a TOML file shaped
/// `[weights]\nspdx = 1.0\nregexp = 0.8`.
pub fn load_weights(path: &Path) -> ScanResult<BackendWeights> {
    #[derive(Deserialize)]
    struct RawWeights {
        #[serde(default)]
        weights: HashMap<String, f64>,
    }

    let text = std::fs::read_to_string(path).map_err(ScanError::Io)?;
    let raw: RawWeights =
        toml::from_str(&text).map_err(|e| ScanError::Resource(format!("invalid weights file: {e}")))?;
    Ok(BackendWeights::new(raw.weights))
}
