//! The Core: drives the iterator tree, constructs one Scanner per
//! iterator, and aggregates results.
//!
//! The producer (this thread) and the collector (a spawned thread)
//! communicate over an unbuffered channel: the producer blocks on send
//! until the collector is ready to take the next Scanner, while the
//! collector's merge/tag/close work for one iterator can still be running
//! while the producer drives the next iterator's recurse step.

use std::sync::mpsc;
use std::sync::Arc;

use crate::backend::{Backend, BackendWeights};
use crate::config::ScanOptions;
use crate::error::ScanError;
use crate::iterator::{CancelToken, IteratorImpl, ScanContext, SkipDirs};
use crate::result::ResultSet;
use crate::scanner::Scanner;

pub struct RunOutcome {
    pub results: ResultSet,
    pub errors: Vec<ScanError>,
}

pub struct Core {
    backends: Vec<Arc<dyn Backend>>,
    weights: Arc<BackendWeights>,
    options: ScanOptions,
}

struct CollectorJob {
    iter: Box<dyn IteratorImpl>,
    label: String,
    scanner: Scanner,
}

impl Core {
    pub fn new(backends: Vec<Arc<dyn Backend>>, weights: BackendWeights, options: ScanOptions) -> Self {
        Core { backends, weights: Arc::new(weights), options }
    }

    pub fn weights(&self) -> &Arc<BackendWeights> {
        &self.weights
    }

    /// Drive every descriptor's iterator tree to completion and return the
    /// merged ResultSet plus any errors recorded along the way. A
    /// Programming error always aborts immediately; a Resource error
    /// aborts only when `shutdown_on_error` is set — otherwise it is
    /// recorded and the remaining work continues.
    pub fn run(&self, descriptors: &[String]) -> RunOutcome {
        let mut errors = Vec::new();
        let cancel = CancelToken::new();
        let ctx = ScanContext {
            cancel: cancel.clone(),
            cache: self.options.cache.clone(),
            debug: self.options.debug,
            allow_http: self.options.allow_http,
        };

        // Init: every backend advertising Validate must pass, or the scan
        // never starts.
        for backend in &self.backends {
            if backend.has_validate() {
                if let Err(e) = backend.validate(&ctx) {
                    tracing::error!(backend = backend.id(), error = %e, "backend validation failed");
                    errors.push(e);
                    return RunOutcome { results: ResultSet::new(), errors };
                }
            }
        }

        let mut arena: Vec<Option<Box<dyn IteratorImpl>>> = Vec::new();
        for descriptor in descriptors {
            match crate::descriptor::parse(descriptor) {
                Ok(iter) => arena.push(Some(iter)),
                Err(e) => self.record(&mut errors, &cancel, e),
            }
        }

        let skip_dirs = Arc::new(SkipDirs::default());
        let (tx, rx) = mpsc::sync_channel::<CollectorJob>(0);
        let cancel_for_collector = cancel.clone();

        std::thread::scope(|scope| {
            let collector = scope.spawn(move || Self::collect(rx, cancel_for_collector));

            let mut idx = 0;
            while idx < arena.len() {
                if cancel.is_cancelled() {
                    break;
                }

                let mut iter = match arena[idx].take() {
                    Some(iter) => iter,
                    None => {
                        idx += 1;
                        continue;
                    }
                };
                let label = iter.label();

                if let Err(e) = iter.validate() {
                    iter.close().ok();
                    self.record(&mut errors, &cancel, e);
                    idx += 1;
                    continue;
                }

                let scanner = Scanner::new(self.backends.clone(), self.weights.clone(), skip_dirs.clone());
                let recurse_result = {
                    let mut scan_fn = |path, info| scanner.scan(&ctx, path, info);
                    iter.recurse(&ctx, &mut scan_fn)
                };

                let children = match recurse_result {
                    Ok(children) => children,
                    Err(e) => {
                        self.record(&mut errors, &cancel, e);
                        Vec::new()
                    }
                };
                for child in children {
                    arena.push(Some(child));
                }

                if tx.send(CollectorJob { iter, label, scanner }).is_err() {
                    break;
                }
                idx += 1;
            }

            drop(tx);
            let (merged, mut collector_errors) =
                collector.join().unwrap_or_else(|_| (ResultSet::new(), vec![ScanError::Programming("collector thread panicked".into())]));
            errors.append(&mut collector_errors);
            RunOutcome { results: merged, errors }
        })
    }

    /// Programming errors always abort; Resource errors abort only in
    /// shutdown-on-error mode.
    fn record(&self, errors: &mut Vec<ScanError>, cancel: &CancelToken, e: ScanError) {
        let fatal = e.is_programming() || self.options.shutdown_on_error;
        if matches!(e, ScanError::Resource(_)) || e.is_programming() {
            tracing::warn!(error = %e, fatal, "scan error");
        }
        errors.push(e);
        if fatal {
            cancel.cancel();
        }
    }

    fn collect(rx: mpsc::Receiver<CollectorJob>, cancel: CancelToken) -> (ResultSet, Vec<ScanError>) {
        let mut merged = ResultSet::new();
        let mut errors = Vec::new();

        for job in rx {
            let CollectorJob { mut iter, label, scanner } = job;
            let (mut result_set, mut scan_errors) = scanner.into_parts();

            for (_, per_backend) in result_set.0.iter_mut() {
                for (_, result) in per_backend.iter_mut() {
                    result.tag_iterator(&label);
                }
            }

            if let Err(e) = merged.merge(result_set) {
                let fatal = e.is_programming();
                errors.push(e);
                if fatal {
                    cancel.cancel();
                }
            }
            errors.append(&mut scan_errors);

            if let Err(e) = iter.close() {
                errors.push(e);
            }
        }

        (merged, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::spdx::SpdxBackend;
    use crate::cache::CachePrefix;

    #[test]
    fn scans_a_directory_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("LICENSE"), "/* SPDX-License-Identifier: MIT */\n").unwrap();

        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(SpdxBackend::new())];
        let mut options = ScanOptions::new("licensescope-test");
        options.cache = CachePrefix::for_program("licensescope-test-core");
        let core = Core::new(backends, BackendWeights::default(), options);

        let descriptor = format!("{}/", tmp.path().display());
        let outcome = core.run(&[descriptor]);

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.results.len(), 1);
        let (_, per_backend) = outcome.results.iter().next().unwrap();
        let result = per_backend.get("spdx").unwrap();
        assert_eq!(result.licenses, vec![crate::license::License::spdx("MIT")]);
        assert_eq!(result.meta.backend.as_deref(), Some("spdx"));
        assert!(result.meta.iterator.is_some());
    }

    #[test]
    fn unsupported_descriptor_is_recorded_not_fatal_by_default() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(SpdxBackend::new())];
        let options = ScanOptions::new("licensescope-test");
        let core = Core::new(backends, BackendWeights::default(), options);

        let outcome = core.run(&["not-a-valid-descriptor://".to_string()]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.results.is_empty());
    }
}
