//! The `Result` produced by one (file, backend) pair, and the `ResultSet`
//! that aggregates them across a whole run.
//!
//! `More` traversal (for tagging) is bounded to depth 1: secondary
//! results are not themselves expected to carry further alternatives.

use std::collections::BTreeMap;

use crate::error::{ScanError, ScanResult};
use crate::license::License;

/// Back-references filled in post-hoc by the Scanner (`backend`) and the
/// Core's collector (`iterator`), never set by the backend itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator: Option<String>,
}

/// One backend's finding for one file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BackendResult {
    pub licenses: Vec<License>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub more: Vec<BackendResult>,
    #[serde(default)]
    pub meta: Meta,
}

impl BackendResult {
    pub fn new(licenses: Vec<License>, confidence: f64) -> Self {
        BackendResult { licenses, confidence, skip: None, more: Vec::new(), meta: Meta::default() }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        BackendResult {
            licenses: Vec::new(),
            confidence: 0.0,
            skip: Some(reason.into()),
            more: Vec::new(),
            meta: Meta::default(),
        }
    }

    /// Tag this result, and any direct (depth-1) `more` alternatives, with
    /// the originating backend.
    pub fn tag_backend(&mut self, backend_id: &str) {
        self.meta.backend = Some(backend_id.to_string());
        for alt in &mut self.more {
            alt.meta.backend = Some(backend_id.to_string());
        }
    }

    /// Tag this result, and any direct `more` alternatives, with the
    /// originating iterator.
    pub fn tag_iterator(&mut self, iterator_label: &str) {
        self.meta.iterator = Some(iterator_label.to_string());
        for alt in &mut self.more {
            alt.meta.iterator = Some(iterator_label.to_string());
        }
    }

    /// Structural comparison ignoring `Meta` (back-references filled by the
    /// framework, not part of the backend's finding).
    pub fn cmp_eq(&self, other: &BackendResult) -> bool {
        self.licenses == other.licenses
            && self.confidence == other.confidence
            && self.skip == other.skip
            && self.more == other.more
    }
}

/// UID -> (backend id -> Result). Invariant: for a given (UID, backend) at
/// most one Result exists; a second write that differs from the stored one
/// is a programming error.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResultSet(pub BTreeMap<String, BTreeMap<String, BackendResult>>);

impl ResultSet {
    pub fn new() -> Self {
        ResultSet(BTreeMap::new())
    }

    /// Insert one backend's result for one UID. Identical duplicates are
    /// silently ignored; a divergent duplicate is a programming error.
    pub fn insert(&mut self, uid: &str, backend_id: &str, result: BackendResult) -> ScanResult<()> {
        let per_uid = self.0.entry(uid.to_string()).or_default();
        match per_uid.get(backend_id) {
            None => {
                per_uid.insert(backend_id.to_string(), result);
                Ok(())
            }
            Some(existing) if existing.cmp_eq(&result) => Ok(()),
            Some(existing) => Err(ScanError::Programming(format!(
                "duplicate divergent result for uid={uid} backend={backend_id}: {existing:?} != {result:?}"
            ))),
        }
    }

    /// Structural union with another ResultSet produced by a different
    /// Scanner. Every (UID, backend) slot in `other` must be new.
    pub fn merge(&mut self, other: ResultSet) -> ScanResult<()> {
        for (uid, backends) in other.0 {
            for (backend_id, result) in backends {
                self.insert(&uid, &backend_id, result)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, uid: &str, backend_id: &str) -> Option<&BackendResult> {
        self.0.get(uid).and_then(|b| b.get(backend_id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, BackendResult>)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_duplicate_is_ignored() {
        let mut rs = ResultSet::new();
        let r = BackendResult::new(vec![License::spdx("MIT")], 1.0);
        rs.insert("u1", "spdx", r.clone()).unwrap();
        assert!(rs.insert("u1", "spdx", r).is_ok());
    }

    #[test]
    fn divergent_duplicate_is_an_error() {
        let mut rs = ResultSet::new();
        rs.insert("u1", "spdx", BackendResult::new(vec![License::spdx("MIT")], 1.0)).unwrap();
        let err = rs.insert("u1", "spdx", BackendResult::new(vec![License::spdx("Apache-2.0")], 1.0));
        assert!(err.is_err());
    }

    #[test]
    fn merge_unions_disjoint_sets() {
        let mut a = ResultSet::new();
        a.insert("u1", "spdx", BackendResult::new(vec![License::spdx("MIT")], 1.0)).unwrap();
        let mut b = ResultSet::new();
        b.insert("u2", "spdx", BackendResult::new(vec![License::spdx("Apache-2.0")], 1.0)).unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.len(), 2);
    }
}
