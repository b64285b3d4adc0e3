//! The BitBake `.bb` structured-source extractor: reads a
//! `LICENSE = "..."` assignment and splits it on `&`, e.g.
//! `LICENSE = "MIT & GPL-2.0-only"` -> `[GPL-2.0-only, MIT]`, sorted.

use crate::error::ScanResult;
use crate::iterator::{Info, ScanContext};
use crate::license::License;
use crate::result::BackendResult;

use super::Backend;

pub struct BitbakeBackend;

impl BitbakeBackend {
    pub fn new() -> Self {
        BitbakeBackend
    }
}

impl Default for BitbakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for BitbakeBackend {
    fn id(&self) -> &str {
        "bitbake"
    }

    fn has_data(&self) -> bool {
        true
    }

    fn scan_data(&self, _ctx: &ScanContext, data: &[u8], info: &Info) -> ScanResult<Option<BackendResult>> {
        if !info.uid.to_lowercase().ends_with(".bb") {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(data);
        let field = match find_license_assignment(&text) {
            Some(f) => f,
            None => return Ok(None),
        };

        let mut licenses = split_license_expression(&field);
        if licenses.is_empty() {
            return Ok(Some(BackendResult::skipped("malformed LICENSE assignment")));
        }
        licenses.sort_by_key(|l| l.render());
        licenses.dedup();
        Ok(Some(BackendResult::new(licenses, 1.0)))
    }
}

fn find_license_assignment(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("LICENSE") {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix('=')?.trim();
            let rest = rest.strip_prefix('"').unwrap_or(rest);
            let rest = rest.strip_suffix('"').unwrap_or(rest);
            return Some(rest.to_string());
        }
    }
    None
}

fn split_license_expression(expr: &str) -> Vec<License> {
    expr.split(['&', '|'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| {
            if crate::license::is_known_spdx(token) {
                License::spdx(token)
            } else {
                License::custom("", token)
            }
        })
        .collect()
}
