//! The `DESCRIPTION` structured-source extractor: reads an R package
//! `DESCRIPTION` file's `License:` field verbatim.
//!
//! Triggered only when the file name is exactly `DESCRIPTION`. Confidence
//! is 1.0 when any license is extracted; a malformed line produces a
//! `Skip`-annotated result rather than an error escaping the backend.

use crate::error::{ScanError, ScanResult};
use crate::iterator::{Info, ScanContext};
use crate::license::License;
use crate::result::BackendResult;

use super::Backend;

pub struct DescriptionBackend;

impl DescriptionBackend {
    pub fn new() -> Self {
        DescriptionBackend
    }
}

impl Default for DescriptionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DescriptionBackend {
    fn id(&self) -> &str {
        "description"
    }

    fn has_data(&self) -> bool {
        true
    }

    fn scan_data(&self, _ctx: &ScanContext, data: &[u8], info: &Info) -> ScanResult<Option<BackendResult>> {
        if !is_description_file(&info.uid) {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(data);
        let field = match find_license_field(&text) {
            Some(f) => f,
            None => return Ok(None),
        };

        match parse_description_license(&field) {
            Ok(licenses) => Ok(Some(BackendResult::new(licenses, 1.0))),
            Err(_) => Ok(Some(BackendResult::skipped("malformed License field"))),
        }
    }
}

fn is_description_file(uid: &str) -> bool {
    uid.rsplit('/').next() == Some("DESCRIPTION")
}

/// `License:` is a single-line field in DESCRIPTION's DCF format; a
/// continuation line is indented, which this simplified reader ignores.
fn find_license_field(text: &str) -> Option<String> {
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("License:") {
            return Some(rest.trim().to_string());
        }
    }
    None
}

/// Splits on `|`, strips `file <name>` clauses, trims. Any surviving token
/// with no alphabetic characters is invalid.
pub fn parse_description_license(s: &str) -> ScanResult<Vec<License>> {
    let mut out = Vec::new();

    for raw in s.split('|') {
        let mut token = raw.to_string();
        if let Some(idx) = token.to_lowercase().find("file ") {
            token.truncate(idx);
        }
        let token = token.trim().trim_end_matches('+').trim().to_string();
        if token.is_empty() {
            continue;
        }
        if !token.chars().any(|c| c.is_alphabetic()) {
            return Err(ScanError::InvalidLicenseFormat);
        }
        out.push(to_license(&token));
    }

    if out.is_empty() {
        return Err(ScanError::InvalidLicenseFormat);
    }
    Ok(out)
}

fn to_license(token: &str) -> License {
    if crate::license::is_known_spdx(token) {
        License::spdx(token)
    } else {
        License::custom("", token)
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

    #[test]
    fn description_parser_splits_pipe_and_strips_file_clause() {
        let licenses = parse_description_license("Artistic-2.0 | AGPL-3 + file LICENSE").unwrap();
        assert_eq!(licenses.len(), 2);
        assert_eq!(licenses[0], License::spdx("Artistic-2.0"));
        assert_eq!(licenses[1], License::custom("", "AGPL-3"));
    }

    #[test]
    fn malformed_description_is_invalid_format() {
        let err = parse_description_license("||||||").unwrap_err();
        assert!(matches!(err, ScanError::InvalidLicenseFormat));
    }

    #[test]
    fn backend_ignores_non_description_files() {
        let backend = DescriptionBackend::new();
        let info = Info { is_dir: false, size: 0, uid: "/repo/README".into() };
        let result = backend.scan_data(&ctx(), b"License: MIT\n", &info).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn backend_extracts_license_field_from_description_file() {
        let backend = DescriptionBackend::new();
        let info = Info { is_dir: false, size: 0, uid: "/repo/DESCRIPTION".into() };
        let data = b"Package: foo\nLicense: MIT\nVersion: 1.0\n";
        let result = backend.scan_data(&ctx(), data, &info).unwrap().unwrap();
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn backend_flags_malformed_license_field_as_skip() {
        let backend = DescriptionBackend::new();
        let info = Info { is_dir: false, size: 0, uid: "/repo/DESCRIPTION".into() };
        let data = b"Package: foo\nLicense: ||||||\n";
        let result = backend.scan_data(&ctx(), data, &info).unwrap().unwrap();
        assert!(result.skip.is_some());
    }
}
