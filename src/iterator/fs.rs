//! The `Fs` iterator: depth-first directory walk, terminal producer of
//! `(SafePath, Info)` pairs. Never materializes anything.

use ignore::WalkBuilder;

use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::GenUid;

use super::{skip_filter, Info, IteratorImpl, ScanContext, ScanFn};

pub struct FsIterator {
    root: SafePath,
    gen_uid: GenUid,
    label: String,
}

impl FsIterator {
    pub fn new(root: SafePath, gen_uid: GenUid, label: impl Into<String>) -> ScanResult<Self> {
        if !matches!(root, SafePath::AbsDir(_)) {
            return Err(ScanError::Programming(format!(
                "Fs iterator root must be an absolute directory, got {root:?}"
            )));
        }
        Ok(FsIterator { root, gen_uid, label: label.into() })
    }
}

impl IteratorImpl for FsIterator {
    fn validate(&self) -> ScanResult<()> {
        if !self.root.as_path().is_dir() {
            return Err(ScanError::Resource(format!(
                "{} is not a directory",
                self.root
            )));
        }
        Ok(())
    }

    fn recurse(
        &mut self,
        ctx: &ScanContext,
        scan: &mut ScanFn<'_>,
    ) -> ScanResult<Vec<Box<dyn IteratorImpl>>> {
        let root_for_filter = self.root.as_path().to_path_buf();
        let walker = WalkBuilder::new(self.root.as_path())
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .standard_filters(false)
            .filter_entry(move |entry| {
                if entry.path() == root_for_filter {
                    return true;
                }
                if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                match SafePath::abs_dir(entry.path().to_path_buf())
                    .ok()
                    .and_then(|p| skip_filter(&p, true).ok())
                {
                    Some((true, true)) => false, // prune the subtree
                    _ => true,
                }
            })
            .build();

        for entry in walker {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "walk entry error");
                    continue;
                }
            };

            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            let abs = if is_dir {
                SafePath::abs_dir(entry.path().to_path_buf())?
            } else if entry.file_type().is_some_and(|ft| ft.is_file()) {
                SafePath::abs_file(entry.path().to_path_buf())?
            } else {
                continue; // symlinks etc. are not surfaced
            };

            // The walk root itself is never surfaced as a file/skip target.
            if abs.as_path() == self.root.as_path() {
                continue;
            }

            if is_dir {
                // Directories that survive the hard-coded skip list are
                // still surfaced (is_dir=true) so a PathBackend can opt
                // out of the subtree by returning SkipDir on content it
                // inspected (e.g. a vendoring marker) — a decision the
                // shared skip filter above doesn't make.
                let uid = (self.gen_uid)(&abs);
                let info = Info { is_dir: true, size: 0, uid };
                scan(abs, info)?;
                continue;
            }

            let (skip, _) = skip_filter(&abs, false)?;
            if skip {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let uid = (self.gen_uid)(&abs);
            let info = Info { is_dir: false, size, uid };
            scan(abs, info)?;
        }

        Ok(Vec::new())
    }

    fn close(&mut self) -> ScanResult<()> {
        Ok(())
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::filesystem_uid;
    use std::sync::{Arc, Mutex};

    fn ctx() -> ScanContext {
        ScanContext {
            cancel: super::super::CancelToken::new(),
            cache: crate::cache::CachePrefix::for_program("licensescope-test"),
            debug: false,
            allow_http: false,
        }
    }

    #[test]
    fn walks_files_and_skips_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join(".git").join("HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::write(tmp.path().join("LICENSE"), "MIT").unwrap();
        std::fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("a.rs"), "fn main() {}").unwrap();

        let root = SafePath::abs_dir(tmp.path().to_path_buf()).unwrap();
        let mut iter = FsIterator::new(root, filesystem_uid(), "fs:test").unwrap();
        iter.validate().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let mut scan = move |path: SafePath, _info: super::Info| {
            seen2.lock().unwrap().push(path.to_string());
            Ok(())
        };
        iter.recurse(&ctx(), &mut scan).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|p| p.ends_with("LICENSE")));
        assert!(seen.iter().any(|p| p.ends_with("a.rs")));
        assert!(!seen.iter().any(|p| p.contains(".git")));
    }
}
