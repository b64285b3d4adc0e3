//! The `Gzip` iterator: decompresses a single-member gzip stream into the
//! cache directory, then yields a child iterator over the decompressed
//! file — a `Tar` if the output is a tarball, otherwise an `Fs` over the
//! single file.
//!
//! Multistream is explicitly disabled: a second gzip member after the
//! first is ignored, matching a plain "one compressed file in, one
//! decompressed file out" model rather than `zcat`'s concatenation.

use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;

use crate::cache::{CacheKind, ResourceGuard};
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::filesystem_uid;

use super::fs::FsIterator;
use super::tar::TarIterator;
use super::{IteratorImpl, ScanContext, ScanFn};

pub struct GzipIterator {
    source: SafePath,
    guard: Option<ResourceGuard>,
}

impl GzipIterator {
    pub fn new(source: SafePath) -> ScanResult<Self> {
        if !matches!(source, SafePath::AbsFile(_)) {
            return Err(ScanError::Programming("Gzip iterator source must be an absolute file".into()));
        }
        Ok(GzipIterator { source, guard: None })
    }
}

impl IteratorImpl for GzipIterator {
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
        let guard = ResourceGuard::acquire(CacheKind::Gzip, &source_str);

        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let dest_dir = ctx.cache.fresh_dir(CacheKind::Gzip, &source_str, now_ms);
        std::fs::create_dir_all(&dest_dir)?;
        let dest_root = SafePath::abs_dir(dest_dir.clone())?;

        let file = std::fs::File::open(self.source.as_path())?;
        let mut decoder = GzDecoder::new(file); // single-member: GzDecoder stops at the first member

        // The header is only populated once decoding begins, so prime the
        // decoder with an initial read before deciding the output name.
        let mut buf = [0u8; 64 * 1024];
        let first_n = decoder.read(&mut buf)?;
        let out_name = output_file_name(&self.source, decoder.header().and_then(|h| h.filename()));
        let dest_file = dest_dir.join(&out_name);
        let mut out = std::fs::File::create(&dest_file)?;
        if first_n > 0 {
            std::io::Write::write_all(&mut out, &buf[..first_n])?;
        }

        loop {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let n = decoder.read(&mut buf)?;
            if n == 0 {
                break;
            }
            std::io::Write::write_all(&mut out, &buf[..n])?;
        }
        drop(out);

        self.guard = Some(guard);

        if out_name.to_lowercase().ends_with(".tar") {
            let tar_path = SafePath::abs_file(dest_file)?;
            let child = TarIterator::new(tar_path)?;
            return Ok(vec![Box::new(child)]);
        }

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
        format!("gzip:{}", self.source)
    }
}

/// Output filename: the embedded gzip header name if present, else the
/// source's basename with its compression suffix stripped. A `.tgz`
/// source (header name or not) is renamed to end in `.tar` so the
/// decompressed stream is recognized and handed to a `Tar` iterator.
fn output_file_name(source: &SafePath, header_name: Option<&[u8]>) -> String {
    let name = source.as_path().file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let is_tgz = name.to_lowercase().ends_with(".tgz");

    let stripped = if is_tgz {
        name[..name.len() - 4].to_string()
    } else if let Some(s) = name.strip_suffix(".gz") {
        s.to_string()
    } else {
        name.clone()
    };

    let from_header = header_name
        .and_then(|b| std::str::from_utf8(b).ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let mut base = from_header.unwrap_or(stripped);
    if is_tgz && !base.to_lowercase().ends_with(".tar") {
        base = format!("{base}.tar");
    }
    if base.is_empty() {
        "decompressed".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tgz_source_without_header_name_renamed_to_tar() {
        let source = SafePath::abs_file("/tmp/archive.tgz").unwrap();
        assert_eq!(output_file_name(&source, None), "archive.tar");
    }

    #[test]
    fn plain_gz_uses_stripped_basename() {
        let source = SafePath::abs_file("/tmp/LICENSE.txt.gz").unwrap();
        assert_eq!(output_file_name(&source, None), "LICENSE.txt");
    }

    #[test]
    fn header_name_takes_precedence() {
        let source = SafePath::abs_file("/tmp/blob.gz").unwrap();
        assert_eq!(output_file_name(&source, Some(b"original.tar")), "original.tar");
    }
}
