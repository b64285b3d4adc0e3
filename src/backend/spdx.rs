//! The SPDX-identifier pattern scanner: a `DataBackend` that looks for an
//! `SPDX-License-Identifier:` marker line by line.
//!
//! A line qualifies if `SPDX-License-Identifier:` appears and the
//! preceding text, after removing any character outside
//! `[A-Za-z0-9.\-+() ]`, is five characters or fewer; the identifier is
//! everything after the marker, stripped of trailing `*/` and
//! non-identifier characters.

use crate::error::ScanResult;
use crate::iterator::{Info, ScanContext};
use crate::license::License;
use crate::result::BackendResult;

use super::Backend;

/// Hard maximum line length before a line is treated as too long to scan.
const MAX_LINE_LEN: usize = 8 * 1024 * 1024;

const MARKER: &str = "SPDX-License-Identifier:";

pub struct SpdxBackend;

impl SpdxBackend {
    pub fn new() -> Self {
        SpdxBackend
    }
}

impl Default for SpdxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SpdxBackend {
    fn id(&self) -> &str {
        "spdx"
    }

    fn has_data(&self) -> bool {
        true
    }

    fn scan_data(&self, _ctx: &ScanContext, data: &[u8], _info: &Info) -> ScanResult<Option<BackendResult>> {
        let text = String::from_utf8_lossy(data);
        let mut licenses = Vec::new();
        let mut skip = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.len() > MAX_LINE_LEN {
                skip = Some("line exceeds maximum scan length".to_string());
                break;
            }
            if let Some(license) = extract_spdx_line(line) {
                if !licenses.contains(&license) {
                    licenses.push(license);
                }
            }
        }

        if licenses.is_empty() && skip.is_none() {
            return Ok(None);
        }

        let mut result = BackendResult::new(licenses.clone(), if licenses.is_empty() { 0.0 } else { 1.0 });
        result.skip = skip;
        Ok(Some(result))
    }
}

/// `None` if the line doesn't qualify (marker absent, or too much text
/// precedes it on the same line).
fn extract_spdx_line(line: &str) -> Option<License> {
    let idx = line.find(MARKER)?;
    let preceding = &line[..idx];
    let cleaned: String = preceding
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '(' | ')' | ' '))
        .collect();
    if cleaned.chars().count() > 5 {
        return None;
    }

    let mut ident = line[idx + MARKER.len()..].trim().to_string();
    if let Some(stripped) = ident.strip_suffix("*/") {
        ident = stripped.trim_end().to_string();
    }
    while let Some(last) = ident.chars().last() {
        if last.is_ascii_alphanumeric() || matches!(last, '.' | '-' | '+' | '(' | ')') {
            break;
        }
        ident.pop();
    }
    if ident.is_empty() {
        return None;
    }
    Some(License::parse(&ident))
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

    #[test]
    fn finds_identifier_in_c_style_comment() {
        let backend = SpdxBackend::new();
        let data = b"/* SPDX-License-Identifier: Apache-2.0 */\nfn main() {}\n";
        let result = backend.scan_data(&ctx(), data, &info()).unwrap().unwrap();
        assert_eq!(result.licenses, vec![License::spdx("Apache-2.0")]);
        assert_eq!(result.confidence, 1.0);
        assert!(result.skip.is_none());
    }

    #[test]
    fn rejects_marker_with_too_much_preceding_text() {
        let backend = SpdxBackend::new();
        let data = b"this comment has way too much text before SPDX-License-Identifier: MIT\n";
        let result = backend.scan_data(&ctx(), data, &info()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn line_at_exactly_max_length_is_not_skipped() {
        let backend = SpdxBackend::new();
        let mut data = vec![b'x'; MAX_LINE_LEN];
        data.extend_from_slice(b"\n// SPDX-License-Identifier: MIT\n");
        let result = backend.scan_data(&ctx(), &data, &info()).unwrap().unwrap();
        assert!(result.skip.is_none());
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
    }

    #[test]
    fn line_one_byte_beyond_max_is_skipped_but_partial_results_kept() {
        let backend = SpdxBackend::new();
        let mut data = b"// SPDX-License-Identifier: MIT\n".to_vec();
        data.extend(vec![b'x'; MAX_LINE_LEN + 1]);
        let result = backend.scan_data(&ctx(), &data, &info()).unwrap().unwrap();
        assert!(result.skip.is_some());
        assert_eq!(result.licenses, vec![License::spdx("MIT")]);
    }

    #[test]
    fn no_marker_yields_no_result() {
        let backend = SpdxBackend::new();
        let result = backend.scan_data(&ctx(), b"just some text\n", &info()).unwrap();
        assert!(result.is_none());
    }
}
