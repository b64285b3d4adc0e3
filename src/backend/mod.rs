//! Backend contracts: the polymorphic variant over
//! {ValidateBackend, DataBackend, PathBackend}, expressed as capability
//! interfaces with runtime feature detection rather than a closed enum,
//! so new backends can be added without touching the Scanner.

pub mod bitbake;
pub mod description;
pub mod identifier;
pub mod regexp;
pub mod spdx;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ScanResult;
use crate::iterator::{Info, ScanContext};
use crate::result::BackendResult;
use crate::safepath::SafePath;

/// A license-detection strategy that examines one file at a time. All
/// three capabilities are optional; a backend advertises what it supports
/// via `has_validate`/`has_data`/`has_path` and the Scanner dispatches
/// accordingly. Must be safe to invoke concurrently.
pub trait Backend: Send + Sync {
    /// Stable identifier used as the ResultSet's backend key and in
    /// per-backend weight lookups.
    fn id(&self) -> &str;

    fn has_validate(&self) -> bool {
        false
    }

    /// Optional one-time validation, run during Core.Init. Any failure
    /// aborts the scan.
    fn validate(&self, _ctx: &ScanContext) -> ScanResult<()> {
        Ok(())
    }

    fn has_data(&self) -> bool {
        false
    }

    /// Receives the file's bytes directly (Core reads once, shared across
    /// every DataBackend). Returns `Ok(None)` when the backend found
    /// nothing to report for this file.
    fn scan_data(
        &self,
        _ctx: &ScanContext,
        _data: &[u8],
        _info: &Info,
    ) -> ScanResult<Option<BackendResult>> {
        Ok(None)
    }

    fn has_path(&self) -> bool {
        false
    }

    /// Reads the file itself (useful for spawning external tools, or for
    /// backends that want to see an `Info` for a directory and decide to
    /// `SkipDir`).
    fn scan_path(
        &self,
        _ctx: &ScanContext,
        _path: &SafePath,
        _info: &Info,
    ) -> ScanResult<Option<BackendResult>> {
        Ok(None)
    }
}

/// Keyed table of per-backend weights, read under a shared mutex. Default
/// weight for a backend with no explicit entry is 1.0.
pub struct BackendWeights(Mutex<HashMap<String, f64>>);

impl BackendWeights {
    pub fn new(initial: HashMap<String, f64>) -> Self {
        BackendWeights(Mutex::new(initial))
    }

    pub fn weight(&self, backend_id: &str) -> f64 {
        self.0.lock().unwrap().get(backend_id).copied().unwrap_or(1.0)
    }

    pub fn set(&self, backend_id: &str, weight: f64) {
        self.0.lock().unwrap().insert(backend_id.to_string(), weight);
    }
}

impl Default for BackendWeights {
    fn default() -> Self {
        BackendWeights::new(HashMap::new())
    }
}

/// Parse `NAME=VALUE` CLI weight overrides.
pub fn parse_weight_arg(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got {s}"))?;
    let value: f64 = value.parse().map_err(|_| format!("not a number: {value}"))?;
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_defaults_to_weight_one() {
        let weights = BackendWeights::default();
        assert_eq!(weights.weight("spdx"), 1.0);
    }

    #[test]
    fn explicit_weight_overrides_default() {
        let weights = BackendWeights::default();
        weights.set("spdx", 2.5);
        assert_eq!(weights.weight("spdx"), 2.5);
    }

    #[test]
    fn weight_arg_parses_name_and_value() {
        assert_eq!(parse_weight_arg("spdx=2.5"), Ok(("spdx".to_string(), 2.5)));
        assert!(parse_weight_arg("no-equals").is_err());
    }
}
