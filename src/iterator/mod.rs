//! The iterator tree: a polymorphic producer of
//! `(SafePath, Info)` pairs that may first materialize its input into the
//! cache directory.
//!
//! Implemented as an arena of boxed `IteratorImpl` trait objects rather
//! than an owning tree of `Box<dyn IteratorImpl>` children, so the Core can
//! hold a back-reference (parent index) for trace tagging without the
//! `Rc<RefCell<..>>` cycles — parent back-references are array indices,
//! never ownership.

pub mod fs;
pub mod git;
pub mod gzip;
pub mod http;
pub mod tar;
pub mod zip;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::CachePrefix;
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;

/// Per-file metadata surfaced during a walk.
#[derive(Debug, Clone)]
pub struct Info {
    pub is_dir: bool,
    pub size: u64,
    pub uid: String,
}

/// Cooperative cancellation token threaded through Core.Run, every
/// iterator's Recurse, and every backend call.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context threaded through every iterator operation: cancellation,
/// shared cache prefix, debug flag, and an HTTP allow-list switch (the
/// Parser's "blocked by policy" decision lives here too, since Http's
/// Validate needs it).
#[derive(Clone)]
pub struct ScanContext {
    pub cancel: CancelToken,
    pub cache: CachePrefix,
    pub debug: bool,
    pub allow_http: bool,
}

/// Callback an iterator invokes once per surfaced file. Implemented by the
/// Scanner, once per surfaced file.
pub type ScanFn<'a> = dyn FnMut(SafePath, Info) -> ScanResult<()> + Send + 'a;

/// The capability set {Validate, Recurse, Close} shared by every
/// variant (Fs, Git, Http, Zip, Tar, Gzip), expressed as a single trait.
pub trait IteratorImpl: Send {
    /// Pure validation — no mutation, no I/O beyond read-only checks.
    fn validate(&self) -> ScanResult<()>;

    /// Materialize (if needed) and/or walk, invoking `scan` once per file.
    /// Returns freshly constructed child iterators (not yet wired into any
    /// arena) for the Core to adopt.
    fn recurse(
        &mut self,
        ctx: &ScanContext,
        scan: &mut ScanFn<'_>,
    ) -> ScanResult<Vec<Box<dyn IteratorImpl>>>;

    /// Release locks and any other held resources. Idempotent.
    fn close(&mut self) -> ScanResult<()>;

    /// Human-readable label used for trace tagging (Meta.Iterator).
    fn label(&self) -> String;
}

/// One node in the Core's iterator arena.
pub struct IteratorNode {
    pub iter: Box<dyn IteratorImpl>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Shared skip filter
// ---------------------------------------------------------------------------

const SKIP_DIRS: &[&str] = &[".git", ".github", ".svn", ".hg", "node_modules", "__pycache__"];

const SKIP_FILE_EXTS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "pdf",
];

/// Ignore files are dotfiles (`Path::extension()` returns `None` for
/// them), so they're skipped by exact name rather than by extension.
const SKIP_FILE_NAMES: &[&str] = &[".gitignore", ".dockerignore"];

/// `(SafePath, is_dir) -> (skip, is_skip_dir)`. Pure: no I/O beyond what
/// the caller already did to determine `is_dir`.
pub fn skip_filter(path: &SafePath, is_dir: bool) -> ScanResult<(bool, bool)> {
    if !path.is_absolute() {
        return Err(ScanError::Programming(format!(
            "skip_filter requires an absolute path, got {path}"
        )));
    }

    if is_dir {
        let name = path
            .as_path()
            .file_name()
            .or_else(|| path.as_path().parent().and_then(|p| p.file_name()))
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if SKIP_DIRS.contains(&name.as_str()) {
            return Ok((true, true));
        }
        return Ok((false, false));
    }

    let file_name = match path.as_path().file_name().map(|n| n.to_string_lossy().to_string()) {
        Some(n) => n,
        None => return Ok((false, false)),
    };
    if SKIP_FILE_NAMES.contains(&file_name.as_str()) {
        return Ok((true, false));
    }
    let ext = match path.as_path().extension().map(|e| e.to_string_lossy().to_lowercase()) {
        Some(e) => e,
        None => return Ok((false, false)),
    };
    // Extension match requires the file name be longer than the extension
    // alone (so ".png" itself is not treated as a skip).
    if file_name.len() > ext.len() + 1 && SKIP_FILE_EXTS.contains(&ext.as_str()) {
        return Ok((true, false));
    }
    Ok((false, false))
}

/// Tracks which (backend-id) have returned `SkipDir` for an ancestor UID,
/// so descendants auto-skip.
#[derive(Default)]
pub struct SkipDirs {
    prefixes: std::sync::Mutex<Vec<(String, String)>>, // (backend_id, uid_prefix)
}

impl SkipDirs {
    pub fn record(&self, backend_id: &str, uid_prefix: &str) {
        self.prefixes.lock().unwrap().push((backend_id.to_string(), uid_prefix.to_string()));
    }

    pub fn is_skipped(&self, backend_id: &str, uid: &str) -> bool {
        self.prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|(b, prefix)| b == backend_id && uid.starts_with(prefix.as_str()))
    }
}

pub fn skip_dir_suffixes() -> HashSet<&'static str> {
    SKIP_DIRS.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_filter_requires_absolute_path() {
        let rel = SafePath::rel_file("a/b").unwrap();
        assert!(skip_filter(&rel, false).is_err());
    }

    #[test]
    fn skip_filter_flags_git_dir() {
        let p = SafePath::abs_dir("/repo/.git").unwrap();
        let (skip, is_skip_dir) = skip_filter(&p, true).unwrap();
        assert!(skip && is_skip_dir);
    }

    #[test]
    fn skip_filter_flags_binary_extension() {
        let p = SafePath::abs_file("/repo/logo.png").unwrap();
        let (skip, _) = skip_filter(&p, false).unwrap();
        assert!(skip);
    }

    #[test]
    fn skip_filter_requires_name_longer_than_extension() {
        // A bare ".png" file has no name beyond the extension and so is
        // not itself skipped by the extension rule.
        let p = SafePath::abs_file("/repo/.png").unwrap();
        let (skip, _) = skip_filter(&p, false).unwrap();
        assert!(!skip);
    }

    #[test]
    fn skip_filter_flags_ignore_files_by_name() {
        let gitignore = SafePath::abs_file("/repo/.gitignore").unwrap();
        let (skip, _) = skip_filter(&gitignore, false).unwrap();
        assert!(skip);

        let dockerignore = SafePath::abs_file("/repo/.dockerignore").unwrap();
        let (skip, _) = skip_filter(&dockerignore, false).unwrap();
        assert!(skip);
    }

    #[test]
    fn skip_dirs_propagate_to_descendants() {
        let skips = SkipDirs::default();
        skips.record("spdx", "file:///repo/vendor/");
        assert!(skips.is_skipped("spdx", "file:///repo/vendor/sub/x.rs"));
        assert!(!skips.is_skipped("spdx", "file:///repo/other/x.rs"));
    }
}
