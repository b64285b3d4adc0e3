//! The `Zip` iterator: extract a `.zip`/`.jar`/`.whl`
//! archive into the cache directory, refusing any entry that would
//! escape it, then yield a child `Fs`.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::{CacheKind, ResourceGuard};
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::filesystem_uid;

use super::fs::FsIterator;
use super::{IteratorImpl, ScanContext, ScanFn};

pub struct ZipIterator {
    source: SafePath,
    guard: Option<ResourceGuard>,
}

impl ZipIterator {
    pub fn new(source: SafePath) -> ScanResult<Self> {
        if !matches!(source, SafePath::AbsFile(_)) {
            return Err(ScanError::Programming("Zip iterator source must be an absolute file".into()));
        }
        Ok(ZipIterator { source, guard: None })
    }
}

impl IteratorImpl for ZipIterator {
    fn validate(&self) -> ScanResult<()> {
        if !self.source.as_path().is_file() {
            return Err(ScanError::Resource(format!("{} is not a file", self.source)));
        }
        Ok(())
    }

    fn recurse(
        &mut self,
        ctx: &ScanContext,
        _scan: &mut ScanFn<'_>,
    ) -> ScanResult<Vec<Box<dyn IteratorImpl>>> {
        let source_str = self.source.to_string();
        let guard = ResourceGuard::acquire(CacheKind::Zip, &source_str);

        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let dest_dir = ctx.cache.fresh_dir(CacheKind::Zip, &source_str, now_ms);
        std::fs::create_dir_all(&dest_dir)?;
        let dest_root = SafePath::abs_dir(dest_dir.clone())?;

        let file = std::fs::File::open(self.source.as_path())?;
        let mut archive = ::zip::ZipArchive::new(file).map_err(ScanError::Zip)?;

        // Directories first, then files, so every file's parent exists.
        for i in 0..archive.len() {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let entry = archive.by_index(i).map_err(ScanError::Zip)?;
            if !entry.is_dir() {
                continue;
            }
            let dest = safe_join(&dest_root, entry.name())?;
            std::fs::create_dir_all(dest.as_path())?;
        }

        for i in 0..archive.len() {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let mut entry = archive.by_index(i).map_err(ScanError::Zip)?;
            if entry.is_dir() {
                continue;
            }
            let dest = safe_join(&dest_root, entry.name())?;
            if let Some(parent) = dest.as_path().parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(dest.as_path())?;
            std::io::copy(&mut entry, &mut out)?;
            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(dest.as_path(), std::fs::Permissions::from_mode(mode)).ok();
            }
        }

        self.guard = Some(guard);
        let gen_uid = filesystem_uid();
        let child = FsIterator::new(dest_root, gen_uid, format!("fs:{source_str}"))?;
        Ok(vec![Box::new(child)])
    }

    fn close(&mut self) -> ScanResult<()> {
        if let Some(guard) = &self.guard {
            guard.unlock();
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("zip:{}", self.source)
    }
}

/// Join an archive entry's internal path onto the destination directory,
/// refusing traversal outright rather than clipping it to the root.
fn safe_join(dest_root: &SafePath, entry_name: &str) -> ScanResult<SafePath> {
    let is_dir = entry_name.ends_with('/');
    let normalized = entry_name.trim_end_matches('/');
    if normalized.split('/').any(|c| c == "..") {
        return Err(ScanError::Resource(format!("zip entry escapes archive root: {entry_name}")));
    }
    dest_root.join_str(normalized, is_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal_entries() {
        let root = SafePath::abs_dir("/cache/zip/xyz").unwrap();
        assert!(safe_join(&root, "../../etc/passwd").is_err());
    }

    #[test]
    fn accepts_nested_entry() {
        let root = SafePath::abs_dir("/cache/zip/xyz").unwrap();
        let joined = safe_join(&root, "a/b/LICENSE").unwrap();
        assert!(joined.has_prefix(&root));
    }
}
