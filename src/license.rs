//! The `License` value type and the global SPDX identifier registry.
//!
//! The registry is a representative subset of the real SPDX license list —
//! embedded at compile time and loaded once into a `HashSet`, never mutated
//! after that.

use std::collections::HashSet;
use std::sync::OnceLock;

/// A handful of the most commonly encountered SPDX identifiers. Real
/// deployments would embed the full SPDX `licenses.json`; this crate's
/// concern is the detection pipeline, not the registry data itself.
const KNOWN_SPDX_IDS: &[&str] = &[
    "MIT",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "MPL-2.0",
    "ISC",
    "Unlicense",
    "CC0-1.0",
    "Artistic-2.0",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    "0BSD",
    "Zlib",
    "BSL-1.0",
    "EPL-2.0",
];

fn registry() -> &'static HashSet<&'static str> {
    static REGISTRY: OnceLock<HashSet<&'static str>> = OnceLock::new();
    REGISTRY.get_or_init(|| KNOWN_SPDX_IDS.iter().copied().collect())
}

/// `true` iff `id` is a known SPDX identifier. A couple of historical
/// aliases used by the `+` suffix convention (e.g. `GPL-2.0+`) are not
/// normalized here; callers that need that are expected to normalize
/// before calling.
pub fn is_known_spdx(id: &str) -> bool {
    registry().contains(id)
}

/// {SPDX, Origin, Custom} triple. If `spdx` is non-empty it must name a
/// known SPDX identifier; otherwise `(origin, custom)` names an identifier
/// outside SPDX. Equality is triple-equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct License {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spdx: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom: String,
}

impl License {
    pub fn spdx(id: impl Into<String>) -> Self {
        License { spdx: id.into(), origin: String::new(), custom: String::new() }
    }

    pub fn custom(origin: impl Into<String>, custom: impl Into<String>) -> Self {
        License { spdx: String::new(), origin: origin.into(), custom: custom.into() }
    }

    pub fn is_valid(&self) -> bool {
        if !self.spdx.is_empty() {
            is_known_spdx(&self.spdx)
        } else {
            !self.origin.is_empty() || !self.custom.is_empty()
        }
    }

    /// Render preference order: `SPDX` if present, else
    /// `Custom(Origin)`, else `Custom(unknown)`.
    pub fn render(&self) -> String {
        if !self.spdx.is_empty() {
            self.spdx.clone()
        } else if !self.origin.is_empty() {
            format!("Custom({})", self.origin)
        } else {
            "Custom(unknown)".to_string()
        }
    }

    /// Parse a rendered identifier back into a License. Unknown bare
    /// tokens are stored as a known-SPDX guess if they match the
    /// registry, otherwise as `Custom(origin)` parsed from the
    /// `Name(Origin)` shape used by profile files.
    pub fn parse(s: &str) -> License {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("Custom(").and_then(|r| r.strip_suffix(')')) {
            if inner == "unknown" {
                return License::custom("", "");
            }
            return License::custom(inner, "");
        }
        if is_known_spdx(s) {
            return License::spdx(s);
        }
        License::custom(s, "")
    }
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_known_spdx() {
        let l = License::spdx("Apache-2.0");
        assert_eq!(License::parse(&l.render()), l);
    }

    #[test]
    fn render_unknown_custom_falls_back() {
        let l = License::custom("", "");
        assert_eq!(l.render(), "Custom(unknown)");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(License::spdx("MIT"), License::spdx("MIT"));
        assert_ne!(License::spdx("MIT"), License::custom("MIT", ""));
    }
}
