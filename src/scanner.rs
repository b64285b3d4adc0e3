//! The Scanner: for a single iterator, fans every surfaced file out across
//! all applicable backends in parallel and aggregates their results.
//!
//! One Scanner is constructed per iterator; its `ResultSet` and error list
//! are each guarded by their own mutex, acquired only for short critical
//! sections.

use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::backend::{Backend, BackendWeights};
use crate::error::{ScanError, ScanResult};
use crate::iterator::{Info, ScanContext, SkipDirs};
use crate::result::{BackendResult, ResultSet};
use crate::safepath::SafePath;

pub struct Scanner {
    backends: Vec<Arc<dyn Backend>>,
    weights: Arc<BackendWeights>,
    skip_dirs: Arc<SkipDirs>,
    result_set: Mutex<ResultSet>,
    errors: Mutex<Vec<ScanError>>,
}

impl Scanner {
    pub fn new(backends: Vec<Arc<dyn Backend>>, weights: Arc<BackendWeights>, skip_dirs: Arc<SkipDirs>) -> Self {
        Scanner { backends, weights, skip_dirs, result_set: Mutex::new(ResultSet::new()), errors: Mutex::new(Vec::new()) }
    }

    /// The callback an iterator's `recurse` invokes once per surfaced
    /// `(SafePath, Info)` pair — files and, for backends that want to
    /// `SkipDir` a subtree, directories too.
    pub fn scan(&self, ctx: &ScanContext, path: SafePath, info: Info) -> ScanResult<()> {
        if info.is_dir {
            self.scan_dir(ctx, &path, &info);
            return Ok(());
        }

        // Core-level optimization: read the file once, shared across every
        // DataBackend, rather than once per backend.
        let data = if self.backends.iter().any(|b| b.has_data() && !self.skip_dirs.is_skipped(b.id(), &info.uid)) {
            std::fs::read(path.as_path()).ok()
        } else {
            None
        };

        let outcomes: Vec<(String, ScanResult<Option<BackendResult>>)> = self
            .backends
            .par_iter()
            .filter(|b| !self.skip_dirs.is_skipped(b.id(), &info.uid))
            .map(|backend| {
                let outcome = if backend.has_data() {
                    match &data {
                        Some(bytes) => backend.scan_data(ctx, bytes, &info),
                        None => Ok(None),
                    }
                } else if backend.has_path() {
                    backend.scan_path(ctx, &path, &info)
                } else {
                    Ok(None)
                };
                (backend.id().to_string(), outcome)
            })
            .collect();

        for (backend_id, outcome) in outcomes {
            match outcome {
                Ok(None) => {}
                Ok(Some(mut result)) => {
                    result.tag_backend(&backend_id);
                    let mut rs = self.result_set.lock().unwrap();
                    if let Err(e) = rs.insert(&info.uid, &backend_id, result) {
                        drop(rs);
                        self.errors.lock().unwrap().push(e);
                    }
                }
                Err(e) if e.is_unknown_license() => {
                    // Sentinel: the backend is sure it cannot classify.
                    // Not an error, just silence for this (file, backend).
                }
                Err(e) if e.is_skip_dir() => {
                    // A file-typed SkipDir is a backend bug; tolerate it
                    // without crashing the scan rather than recording a
                    // spurious skip for a subtree that doesn't exist below
                    // a file.
                    tracing::warn!(backend = %backend_id, uid = %info.uid, "SkipDir returned for a file");
                }
                Err(e) => {
                    self.errors.lock().unwrap().push(e);
                }
            }
        }

        Ok(())
    }

    fn scan_dir(&self, ctx: &ScanContext, path: &SafePath, info: &Info) {
        for backend in &self.backends {
            if !backend.has_path() || self.skip_dirs.is_skipped(backend.id(), &info.uid) {
                continue;
            }
            match backend.scan_path(ctx, path, info) {
                Ok(_) => {}
                Err(e) if e.is_skip_dir() => {
                    let prefix = format!("{}/", info.uid.trim_end_matches('/'));
                    self.skip_dirs.record(backend.id(), &prefix);
                }
                Err(e) if e.is_unknown_license() => {}
                Err(e) => {
                    self.errors.lock().unwrap().push(e);
                }
            }
        }
    }

    pub fn weight(&self, backend_id: &str) -> f64 {
        self.weights.weight(backend_id)
    }

    /// Drain the Scanner's accumulated ResultSet and errors. Consumes the
    /// Scanner, matching the collector's "hand off, then finish" use.
    pub fn into_parts(self) -> (ResultSet, Vec<ScanError>) {
        (self.result_set.into_inner().unwrap(), self.errors.into_inner().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePrefix;
    use crate::iterator::CancelToken;
    use crate::license::License;
    use crate::result::BackendResult;

    fn ctx() -> ScanContext {
        ScanContext {
            cancel: CancelToken::new(),
            cache: CachePrefix::for_program("licensescope-test"),
            debug: false,
            allow_http: false,
        }
    }

    struct FixedBackend(&'static str, License);

    impl Backend for FixedBackend {
        fn id(&self) -> &str {
            self.0
        }
        fn has_data(&self) -> bool {
            true
        }
        fn scan_data(&self, _ctx: &ScanContext, _data: &[u8], _info: &Info) -> ScanResult<Option<BackendResult>> {
            Ok(Some(BackendResult::new(vec![self.1.clone()], 1.0)))
        }
    }

    #[test]
    fn fans_out_across_backends_and_tags_them() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"hello").unwrap();
        let backends: Vec<Arc<dyn Backend>> = vec![
            Arc::new(FixedBackend("a", License::spdx("MIT"))),
            Arc::new(FixedBackend("b", License::spdx("Apache-2.0"))),
        ];
        let scanner = Scanner::new(backends, Arc::new(BackendWeights::default()), Arc::new(SkipDirs::default()));
        let path = SafePath::abs_file(tmp.path().to_path_buf()).unwrap();
        let info = Info { is_dir: false, size: 5, uid: "file:///x".into() };
        scanner.scan(&ctx(), path, info).unwrap();

        let (rs, errors) = scanner.into_parts();
        assert!(errors.is_empty());
        let backend_a = rs.get("file:///x", "a").unwrap();
        assert_eq!(backend_a.meta.backend.as_deref(), Some("a"));
        assert_eq!(rs.get("file:///x", "b").unwrap().licenses, vec![License::spdx("Apache-2.0")]);
    }
}
