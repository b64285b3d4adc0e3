//! The `Tar` iterator: advances a tar archive entry-by-entry, extracting
//! only regular files and directories (symlinks/devices/fifos skipped),
//! then yields a child `Fs`.

use std::time::{SystemTime, UNIX_EPOCH};

use ::tar::Archive;

use crate::cache::{CacheKind, ResourceGuard};
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::filesystem_uid;

use super::fs::FsIterator;
use super::{IteratorImpl, ScanContext, ScanFn};
#[cfg(test)]
use super::Info;

pub struct TarIterator {
    source: SafePath,
    guard: Option<ResourceGuard>,
}

impl TarIterator {
    pub fn new(source: SafePath) -> ScanResult<Self> {
        if !matches!(source, SafePath::AbsFile(_)) {
            return Err(ScanError::Programming("Tar iterator source must be an absolute file".into()));
        }
        Ok(TarIterator { source, guard: None })
    }
}

impl IteratorImpl for TarIterator {
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
        let guard = ResourceGuard::acquire(CacheKind::Tar, &source_str);

        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let dest_dir = ctx.cache.fresh_dir(CacheKind::Tar, &source_str, now_ms);
        std::fs::create_dir_all(&dest_dir)?;
        let dest_root = SafePath::abs_dir(dest_dir.clone())?;

        let file = std::fs::File::open(self.source.as_path())?;
        let mut archive = Archive::new(file);

        for entry in archive.entries()? {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let mut entry = entry?;
            let kind = entry.header().entry_type();
            if !kind.is_file() && !kind.is_dir() {
                continue; // symlinks, devices, fifos are not surfaced
            }

            let path = entry.path()?.into_owned();
            if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
                return Err(ScanError::Resource(format!("tar entry escapes archive root: {}", path.display())));
            }

            if kind.is_dir() {
                let dest = dest_root.join_str(&path, true)?;
                std::fs::create_dir_all(dest.as_path())?;
                continue;
            }

            let dest = dest_root.join_str(&path, false)?;
            if let Some(parent) = dest.as_path().parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(dest.as_path())?;
            std::io::copy(&mut entry, &mut out)?;
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
        format!("tar:{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ScanContext {
        ScanContext {
            cancel: super::super::CancelToken::new(),
            cache: crate::cache::CachePrefix::for_program("licensescope-test"),
            debug: false,
            allow_http: false,
        }
    }

    #[test]
    fn extracts_regular_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let tar_path = tmp.path().join("archive.tar");
        {
            let file = std::fs::File::create(&tar_path).unwrap();
            let mut builder = ::tar::Builder::new(file);
            let data = b"MIT License text".as_slice();
            let mut header = ::tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "LICENSE", data).unwrap();
            builder.finish().unwrap();
        }

        let source = SafePath::abs_file(tar_path).unwrap();
        let mut iter = TarIterator::new(source).unwrap();
        iter.validate().unwrap();
        let mut scan = |_p: SafePath, _i: Info| Ok(());
        let children = iter.recurse(&ctx(), &mut scan).unwrap();
        assert_eq!(children.len(), 1);
    }
}
