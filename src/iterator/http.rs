//! The `Http` iterator: downloads a URL into the cache, stamps a
//! `scheme://host/path?now=…` UID, and yields a child iterator over the
//! download — a `Zip`/`Tar`/`Gzip` if the downloaded name has a
//! recognized archive extension, otherwise a plain `Fs`.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::{CacheKind, ResourceGuard};
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::http_uid;

use super::fs::FsIterator;
use super::gzip::GzipIterator;
use super::tar::TarIterator;
use super::zip::ZipIterator;
use super::{IteratorImpl, ScanContext, ScanFn};

pub struct HttpIterator {
    url: String,
    guard: Option<ResourceGuard>,
}

impl HttpIterator {
    pub fn new(url: impl Into<String>) -> Self {
        HttpIterator { url: url.into(), guard: None }
    }
}

impl IteratorImpl for HttpIterator {
    fn validate(&self) -> ScanResult<()> {
        if self.url.starts_with("http://") {
            // The allow_http policy check happens in recurse(), against
            // ScanContext, not here — validate() has no context argument.
            return Ok(());
        }
        if !self.url.starts_with("https://") {
            return Err(ScanError::Programming(format!("unsupported URL scheme: {}", self.url)));
        }
        Ok(())
    }

    fn recurse(
        &mut self,
        ctx: &ScanContext,
        _scan: &mut ScanFn<'_>,
    ) -> ScanResult<Vec<Box<dyn IteratorImpl>>> {
        if self.url.starts_with("http://") && !ctx.allow_http {
            return Err(ScanError::Resource(format!(
                "plain http is blocked by policy: {}",
                self.url
            )));
        }

        let guard = ResourceGuard::acquire(CacheKind::Http, &self.url);

        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let dest_dir = ctx.cache.fresh_dir(CacheKind::Http, &self.url, now_ms);
        std::fs::create_dir_all(&dest_dir)?;

        let client = reqwest::blocking::Client::builder().build()?;
        let mut resp = client.get(&self.url).send()?;
        if resp.status().as_u16() != 200 {
            return Err(ScanError::Resource(format!(
                "GET {} returned {}",
                self.url,
                resp.status()
            )));
        }

        let file_name = last_path_segment(&self.url).unwrap_or_else(|| ".unknown".to_string());
        let dest_file = dest_dir.join(&file_name);
        let mut out = std::fs::File::create(&dest_file)?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let n = std::io::Read::read(&mut resp, &mut buf).map_err(ScanError::Io)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
        }

        self.guard = Some(guard);

        if let Some(child) = archive_child_for(&dest_file, &file_name)? {
            return Ok(vec![child]);
        }

        let extraction_root = SafePath::abs_dir(dest_dir)?;
        let gen_uid = http_uid(&self.url, now_ms, extraction_root.clone());
        let child = FsIterator::new(extraction_root, gen_uid, format!("fs:{}", self.url))?;
        Ok(vec![Box::new(child)])
    }

    fn close(&mut self) -> ScanResult<()> {
        if let Some(guard) = &self.guard {
            guard.unlock();
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("http:{}", self.url)
    }
}

/// If the downloaded file's name carries a recognized archive extension,
/// build the matching `Zip`/`Tar`/`Gzip` iterator over it. Otherwise
/// `None`, so the caller falls back to walking the download directory
/// directly.
fn archive_child_for(dest_file: &std::path::Path, file_name: &str) -> ScanResult<Option<Box<dyn IteratorImpl>>> {
    let lower = file_name.to_lowercase();
    let source = SafePath::abs_file(dest_file.to_path_buf())?;
    if lower.ends_with(".zip") || lower.ends_with(".jar") || lower.ends_with(".whl") {
        Ok(Some(Box::new(ZipIterator::new(source)?)))
    } else if lower.ends_with(".tar") {
        Ok(Some(Box::new(TarIterator::new(source)?)))
    } else if lower.ends_with(".gz") || lower.ends_with(".gzip") || lower.ends_with(".tgz") {
        Ok(Some(Box::new(GzipIterator::new(source)?)))
    } else {
        Ok(None)
    }
}

/// Last URL path segment, or `None` if it is empty (caller substitutes
/// `.unknown`). The resulting filename
/// must not then look like a hidden dotfile that the Fs walk's skip
/// filter would prune — `.unknown` has no matching extension in the
/// skip list, so it is safe.
fn last_path_segment(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or("");
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment_extracted_from_path() {
        assert_eq!(last_path_segment("https://x.com/a/b/archive.zip"), Some("archive.zip".into()));
    }

    #[test]
    fn empty_segment_yields_none() {
        assert_eq!(last_path_segment("https://x.com/a/b/"), None);
    }

    #[test]
    fn plain_http_rejected_without_policy() {
        let iter = HttpIterator::new("http://insecure.example.com/a.zip");
        assert!(iter.validate().is_ok()); // validate allows it; recurse enforces the policy
    }

    #[test]
    fn archive_child_for_picks_zip_for_zip_extension() {
        let dest = std::path::Path::new("/tmp/does-not-exist/archive.zip");
        let child = archive_child_for(dest, "archive.zip").unwrap().unwrap();
        assert!(child.label().starts_with("zip:"));
    }

    #[test]
    fn archive_child_for_picks_tar_for_tar_extension() {
        let dest = std::path::Path::new("/tmp/does-not-exist/bundle.tar");
        let child = archive_child_for(dest, "bundle.tar").unwrap().unwrap();
        assert!(child.label().starts_with("tar:"));
    }

    #[test]
    fn archive_child_for_picks_gzip_for_tgz_extension() {
        let dest = std::path::Path::new("/tmp/does-not-exist/bundle.tgz");
        let child = archive_child_for(dest, "bundle.tgz").unwrap().unwrap();
        assert!(child.label().starts_with("gzip:"));
    }

    #[test]
    fn archive_child_for_is_none_for_a_plain_file() {
        let dest = std::path::Path::new("/tmp/does-not-exist/LICENSE");
        assert!(archive_child_for(dest, "LICENSE").unwrap().is_none());
    }
}
