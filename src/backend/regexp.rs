//! The JSON regexp scanner: compiled once from `{rules: [{pattern, id}],
//! origin}`. On match, `id` is split on ` AND ` and each piece yields a
//! license. By default the same rule fires at most once per file.

use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ScanError, ScanResult};
use crate::iterator::{Info, ScanContext};
use crate::license::{is_known_spdx, License};
use crate::result::BackendResult;

use super::Backend;

/// A match is worth reporting but isn't a structural marker-extraction
/// like the SPDX scanner, so a middling confidence reflects the weaker
/// evidential strength of a free-form regex hit.
const REGEXP_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Deserialize)]
struct RawRule {
    pattern: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    rules: Vec<RawRule>,
    #[serde(default)]
    origin: String,
    #[serde(default)]
    #[allow(dead_code)]
    comment: String,
}

struct Rule {
    regex: Regex,
    id: String,
}

pub struct RegexpBackend {
    rules: Vec<Rule>,
    origin: String,
}

impl RegexpBackend {
    pub fn from_json(bytes: &[u8]) -> ScanResult<Self> {
        let raw: RawConfig = serde_json::from_slice(bytes)?;
        let mut rules = Vec::with_capacity(raw.rules.len());
        for r in raw.rules {
            let regex = Regex::new(&r.pattern)
                .map_err(|e| ScanError::Resource(format!("invalid regexp rule {:?}: {e}", r.pattern)))?;
            rules.push(Rule { regex, id: r.id });
        }
        Ok(RegexpBackend { rules, origin: raw.origin })
    }

    fn licenses_for_rule_id(&self, id: &str) -> Vec<License> {
        id.split(" AND ")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|piece| {
                if is_known_spdx(piece) {
                    License::spdx(piece)
                } else {
                    License::custom(self.origin.clone(), piece)
                }
            })
            .collect()
    }
}

impl Backend for RegexpBackend {
    fn id(&self) -> &str {
        "regexp"
    }

    fn has_data(&self) -> bool {
        true
    }

    fn scan_data(&self, _ctx: &ScanContext, data: &[u8], _info: &Info) -> ScanResult<Option<BackendResult>> {
        let text = String::from_utf8_lossy(data);
        let mut fired = HashSet::new();
        let mut licenses = Vec::new();

        for (idx, rule) in self.rules.iter().enumerate() {
            if fired.contains(&idx) {
                continue;
            }
            if rule.regex.is_match(&text) {
                fired.insert(idx);
                for license in self.licenses_for_rule_id(&rule.id) {
                    if !licenses.contains(&license) {
                        licenses.push(license);
                    }
                }
            }
        }

        if licenses.is_empty() {
            return Ok(None);
        }
        Ok(Some(BackendResult::new(licenses, REGEXP_CONFIDENCE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePrefix;
    use crate::iterator::CancelToken;

    fn ctx() -> ScanContext {
        ScanContext {
            cancel: CancelToken::new(),
            cache: CachePrefix::for_program("licensescope-test"),
            debug: false,
            allow_http: false,
        }
    }

    fn info() -> Info {
        Info { is_dir: false, size: 0, uid: "test".into() }
    }

    fn config() -> Vec<u8> {
        br#"{
            "origin": "test-rules",
            "rules": [
                {"pattern": "Permission is hereby granted, free of charge", "id": "MIT"},
                {"pattern": "Licensed under the Apache License", "id": "Apache-2.0"},
                {"pattern": "dual licensed under", "id": "MIT AND Apache-2.0"}
            ]
        }"#
        .to_vec()
    }

    #[test]
    fn matches_a_single_rule() {
        let backend = RegexpBackend::from_json(&config()).unwrap();
        let data = b"Permission is hereby granted, free of charge, to any person...";
        let result = backend.scan_data(&ctx(), data, &info()).unwrap().unwrap();
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
        assert_eq!(result.confidence, REGEXP_CONFIDENCE);
    }

    #[test]
    fn and_rule_splits_into_multiple_licenses() {
        let backend = RegexpBackend::from_json(&config()).unwrap();
        let data = b"this package is dual licensed under two terms";
        let result = backend.scan_data(&ctx(), data, &info()).unwrap().unwrap();
        assert_eq!(result.licenses.len(), 2);
    }

    #[test]
    fn no_match_yields_no_result() {
        let backend = RegexpBackend::from_json(&config()).unwrap();
        let result = backend.scan_data(&ctx(), b"nothing interesting here", &info()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn same_rule_fires_at_most_once() {
        let backend = RegexpBackend::from_json(&config()).unwrap();
        let data = b"Permission is hereby granted, free of charge, twice: Permission is hereby granted, free of charge, again.";
        let result = backend.scan_data(&ctx(), data, &info()).unwrap().unwrap();
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
    }
}
