//! The Parser: turns one free-form input descriptor into a root iterator.

use crate::error::{ScanError, ScanResult};
use crate::iterator::git::{GitIterator, GitRevision};
use crate::iterator::gzip::GzipIterator;
use crate::iterator::http::HttpIterator;
use crate::iterator::tar::TarIterator;
use crate::iterator::zip::ZipIterator;
use crate::iterator::IteratorImpl;
use crate::safepath::SafePath;

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar", "whl", "tar", "gz", "gzip", "tgz", "bz2"];
const GIT_HOST_ALLOWLIST: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Parse one descriptor string into its root iterator.
pub fn parse(descriptor: &str) -> ScanResult<Box<dyn IteratorImpl>> {
    if descriptor.is_empty() {
        return Err(ScanError::Programming("empty descriptor".into()));
    }

    if descriptor.starts_with("http://") {
        return Err(ScanError::Programming(format!(
            "plain http descriptors are blocked by policy: {descriptor}"
        )));
    }

    if let Some(rest) = descriptor.strip_prefix("git://") {
        return git_from_url(&format!("git://{rest}"));
    }

    if descriptor.starts_with("https://") {
        let ext = extension_of(descriptor);
        if ext.as_deref().is_some_and(|e| ARCHIVE_EXTENSIONS.contains(&e)) {
            return archive_from_url(descriptor, ext.unwrap());
        }
        if let Some(host) = host_of(descriptor) {
            if GIT_HOST_ALLOWLIST.contains(&host.as_str()) {
                return git_from_url(descriptor);
            }
        }
        return Err(ScanError::Programming(format!("unsupported https descriptor: {descriptor}")));
    }

    if !descriptor.contains("://") {
        return fs_from_path(descriptor);
    }

    Err(ScanError::Programming(format!("unsupported descriptor: {descriptor}")))
}

fn host_of(url: &str) -> Option<String> {
    let without_scheme = url.split("://").nth(1)?;
    let host = without_scheme.split(['/', '?']).next()?;
    Some(host.to_string())
}

fn extension_of(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next()?;
    let ext = segment.rsplit('.').next()?;
    if ext == segment {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

fn archive_from_url(url: &str, ext: String) -> ScanResult<Box<dyn IteratorImpl>> {
    // Archives referenced by URL are fetched via Http first; once the
    // download lands in the cache, Http's own recurse step picks the
    // matching Zip/Tar/Gzip iterator off the downloaded file's extension,
    // the same way it already does for an inline descriptor's extension.
    let _ = ext;
    Ok(Box::new(HttpIterator::new(url)))
}

fn git_from_url(url: &str) -> ScanResult<Box<dyn IteratorImpl>> {
    let (clone_url, hash) = extract_commit_hash(url);
    let revision = GitRevision { hash, git_ref: None, rev: None };
    Ok(Box::new(GitIterator::new(clone_url, revision)?))
}

/// Extracts a trailing `/commit/<40-hex>` path segment, trimming the URL
/// back to the repository root when found.
fn extract_commit_hash(url: &str) -> (String, Option<String>) {
    if let Some(idx) = url.find("/commit/") {
        let candidate = &url[idx + "/commit/".len()..];
        let hash: String = candidate.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        if hash.len() == 40 {
            return (url[..idx].to_string(), Some(hash));
        }
    }
    (url.to_string(), None)
}

fn fs_from_path(path: &str) -> ScanResult<Box<dyn IteratorImpl>> {
    let is_dir_asserted = path.ends_with('/');
    let abs = if std::path::Path::new(path).is_absolute() {
        std::path::PathBuf::from(path)
    } else {
        std::env::current_dir()
            .map_err(ScanError::Io)?
            .join(path)
    };

    let metadata = std::fs::metadata(&abs)
        .map_err(|e| ScanError::Resource(format!("cannot stat {}: {e}", abs.display())))?;

    if is_dir_asserted && !metadata.is_dir() {
        return Err(ScanError::Programming(format!(
            "{} ends in '/' but is not a directory",
            abs.display()
        )));
    }

    let root = if metadata.is_dir() {
        SafePath::abs_dir(abs)?
    } else {
        SafePath::abs_file(abs)?
    };

    match &root {
        SafePath::AbsDir(_) => {
            let gen_uid = crate::uid::filesystem_uid();
            Ok(Box::new(crate::iterator::fs::FsIterator::new(root, gen_uid, "fs:root".to_string())?))
        }
        SafePath::AbsFile(_) => archive_iterator_for_file(root),
        _ => unreachable!(),
    }
}

/// A bare filesystem path to an archive file is expanded directly,
/// without going through Http.
fn archive_iterator_for_file(path: SafePath) -> ScanResult<Box<dyn IteratorImpl>> {
    let name = path.as_path().to_string_lossy().to_lowercase();
    if name.ends_with(".zip") || name.ends_with(".jar") || name.ends_with(".whl") {
        Ok(Box::new(ZipIterator::new(path)?))
    } else if name.ends_with(".tar") {
        Ok(Box::new(TarIterator::new(path)?))
    } else if name.ends_with(".gz") || name.ends_with(".gzip") || name.ends_with(".tgz") {
        Ok(Box::new(GzipIterator::new(path)?))
    } else {
        let gen_uid = crate::uid::filesystem_uid();
        let parent = path
            .as_path()
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ScanError::Programming("file has no parent directory".into()))?;
        Ok(Box::new(crate::iterator::fs::FsIterator::new(
            SafePath::abs_dir(parent)?,
            gen_uid,
            "fs:root".to_string(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_descriptor_is_error() {
        assert!(parse("").is_err());
    }

    #[test]
    fn plain_http_is_blocked() {
        assert!(parse("http://example.com/a.zip").is_err());
    }

    #[test]
    fn https_archive_extension_yields_http_iterator() {
        let iter = parse("https://example.com/a/b/archive.zip").unwrap();
        assert!(iter.label().starts_with("http:"));
    }

    #[test]
    fn recognized_git_host_yields_git_iterator() {
        let iter = parse("https://github.com/rust-lang/rust").unwrap();
        assert!(iter.label().starts_with("git:"));
    }

    #[test]
    fn commit_url_extracts_hash_and_trims_root() {
        let hash = "a".repeat(40);
        let url = format!("https://github.com/x/y/commit/{hash}");
        let (clone_url, extracted) = extract_commit_hash(&url);
        assert_eq!(clone_url, "https://github.com/x/y");
        assert_eq!(extracted, Some(hash));
    }

    #[test]
    fn unrecognized_https_host_is_unsupported() {
        assert!(parse("https://example.com/readme").is_err());
    }

    #[test]
    fn absolute_directory_path_with_trailing_slash() {
        let tmp = tempfile::tempdir().unwrap();
        let path_str = format!("{}/", tmp.path().display());
        let iter = parse(&path_str).unwrap();
        assert!(iter.label().starts_with("fs:"));
    }

    #[test]
    fn trailing_slash_on_non_directory_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("a.txt");
        std::fs::write(&file_path, "x").unwrap();
        let path_str = format!("{}/", file_path.display());
        assert!(parse(&path_str).is_err());
    }
}
