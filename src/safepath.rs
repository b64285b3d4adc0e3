//! `SafePath` — the authoritative representation of any filesystem location
//! the pipeline touches. Four variants (absolute/relative x file/directory);
//! joining and prefix-stripping are the only ways to move between them, and
//! both refuse to construct a path that would escape a declared root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ScanError, ScanResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SafePath {
    AbsDir(PathBuf),
    AbsFile(PathBuf),
    RelDir(PathBuf),
    RelFile(PathBuf),
}

impl SafePath {
    /// Wrap an absolute directory path. Errors if `path` is not absolute.
    pub fn abs_dir(path: impl Into<PathBuf>) -> ScanResult<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(ScanError::Programming(format!(
                "abs_dir: {} is not absolute",
                path.display()
            )));
        }
        Ok(SafePath::AbsDir(path))
    }

    /// Wrap an absolute file path. Errors if `path` is not absolute.
    pub fn abs_file(path: impl Into<PathBuf>) -> ScanResult<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(ScanError::Programming(format!(
                "abs_file: {} is not absolute",
                path.display()
            )));
        }
        Ok(SafePath::AbsFile(path))
    }

    /// Wrap a relative directory path. Errors if it would escape its root
    /// (contains a `..` component, or is itself absolute).
    pub fn rel_dir(path: impl Into<PathBuf>) -> ScanResult<Self> {
        let path = path.into();
        Self::check_no_escape(&path)?;
        Ok(SafePath::RelDir(path))
    }

    /// Wrap a relative file path. Errors if it would escape its root.
    pub fn rel_file(path: impl Into<PathBuf>) -> ScanResult<Self> {
        let path = path.into();
        Self::check_no_escape(&path)?;
        Ok(SafePath::RelFile(path))
    }

    fn check_no_escape(path: &Path) -> ScanResult<()> {
        if path.is_absolute() {
            return Err(ScanError::Programming(format!(
                "relative path {} is absolute",
                path.display()
            )));
        }
        for component in path.components() {
            if matches!(component, Component::ParentDir) {
                return Err(ScanError::Programming(format!(
                    "relative path {} escapes its root",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn is_dir_kind(&self) -> bool {
        matches!(self, SafePath::AbsDir(_) | SafePath::RelDir(_))
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, SafePath::AbsDir(_) | SafePath::AbsFile(_))
    }

    pub fn as_path(&self) -> &Path {
        match self {
            SafePath::AbsDir(p) | SafePath::AbsFile(p) | SafePath::RelDir(p) | SafePath::RelFile(p) => {
                p.as_path()
            }
        }
    }

    /// Join a relative path onto this directory, producing an absolute
    /// path of the matching file/dir kind. Total for any non-escaping
    /// relative path; fails only if `self` is not a directory or `rel`
    /// is not relative (e.g. came from an untrusted join).
    pub fn join_rel(&self, rel: &SafePath) -> ScanResult<SafePath> {
        let base = match self {
            SafePath::AbsDir(p) => p,
            _ => {
                return Err(ScanError::Programming(
                    "join_rel requires an absolute directory base".into(),
                ))
            }
        };
        let rel_path = match rel {
            SafePath::RelDir(p) | SafePath::RelFile(p) => p,
            _ => {
                return Err(ScanError::Programming(
                    "join_rel requires a relative path argument".into(),
                ))
            }
        };
        let joined = base.join(rel_path);
        if !joined.starts_with(base) {
            return Err(ScanError::Programming(format!(
                "{} would escape {}",
                joined.display(),
                base.display()
            )));
        }
        match rel {
            SafePath::RelDir(_) => SafePath::abs_dir(joined),
            SafePath::RelFile(_) => SafePath::abs_file(joined),
            _ => unreachable!(),
        }
    }

    /// Join a plain relative path string/PathBuf onto this absolute
    /// directory. Refuses anything that would escape the root.
    pub fn join_str(&self, rel: impl AsRef<Path>, is_dir: bool) -> ScanResult<SafePath> {
        let rel = rel.as_ref();
        if is_dir {
            self.join_rel(&SafePath::rel_dir(rel.to_path_buf())?)
        } else {
            self.join_rel(&SafePath::rel_file(rel.to_path_buf())?)
        }
    }

    /// Strip a known absolute-directory prefix, yielding the relative
    /// remainder. Partial: fails if `self` is not actually rooted at `root`.
    pub fn strip_prefix(&self, root: &SafePath) -> ScanResult<SafePath> {
        let root_path = match root {
            SafePath::AbsDir(p) => p,
            _ => {
                return Err(ScanError::Programming(
                    "strip_prefix requires an absolute directory root".into(),
                ))
            }
        };
        let stripped = self
            .as_path()
            .strip_prefix(root_path)
            .map_err(|_| ScanError::Programming(format!("{self:?} is not rooted at {root:?}")))?;
        if self.is_dir_kind() {
            SafePath::rel_dir(stripped.to_path_buf())
        } else {
            SafePath::rel_file(stripped.to_path_buf())
        }
    }

    /// `true` iff `self` is an absolute path contained within `prefix`
    /// (or equal to it).
    pub fn has_prefix(&self, prefix: &SafePath) -> bool {
        self.as_path().starts_with(prefix.as_path())
    }

    /// Case-insensitive suffix test, e.g. for extension matching.
    pub fn has_suffix_ci(&self, suffix: &str) -> bool {
        let s = self.as_path().to_string_lossy().to_lowercase();
        s.ends_with(&suffix.to_lowercase())
    }
}

impl std::fmt::Display for SafePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_stays_within_root() {
        let root = SafePath::abs_dir("/cache/git/abc").unwrap();
        let rel = SafePath::rel_file("a/b/LICENSE").unwrap();
        let joined = root.join_rel(&rel).unwrap();
        assert!(joined.has_prefix(&root));
        assert_eq!(joined.as_path(), Path::new("/cache/git/abc/a/b/LICENSE"));
    }

    #[test]
    fn rel_path_rejects_parent_traversal() {
        assert!(SafePath::rel_file("../../etc/passwd").is_err());
        assert!(SafePath::rel_dir("ok/../../nope").is_err());
    }

    #[test]
    fn strip_prefix_is_partial() {
        let root = SafePath::abs_dir("/cache/zip/xyz").unwrap();
        let other = SafePath::abs_dir("/somewhere/else").unwrap();
        assert!(other.strip_prefix(&root).is_err());

        let child = SafePath::abs_file("/cache/zip/xyz/a/LICENSE").unwrap();
        let rel = child.strip_prefix(&root).unwrap();
        assert_eq!(rel.as_path(), Path::new("a/LICENSE"));
    }

    #[test]
    fn suffix_match_is_case_insensitive() {
        let p = SafePath::abs_file("/a/b/README.MD").unwrap();
        assert!(p.has_suffix_ci(".md"));
    }
}
