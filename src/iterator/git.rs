//! The `Git` iterator: clone-or-open, resolve a commit,
//! check out, stamp a `git://…?sha1=…` UID onto every file below the
//! checkout, and yield a single child `Fs` iterator.

use git2::{Repository, RepositoryInitOptions};

use crate::cache::{CacheKind, ResourceGuard};
use crate::error::{ScanError, ScanResult};
use crate::safepath::SafePath;
use crate::uid::git_uid;

use super::fs::FsIterator;
use super::{IteratorImpl, ScanContext, ScanFn};

#[derive(Debug, Clone, Default)]
pub struct GitRevision {
    pub hash: Option<String>, // 40 hex
    pub git_ref: Option<String>,
    pub rev: Option<String>,
}

pub struct GitIterator {
    url: String,
    revision: GitRevision,
    guard: Option<ResourceGuard>,
    checkout_dir: Option<SafePath>,
}

impl GitIterator {
    pub fn new(url: impl Into<String>, revision: GitRevision) -> ScanResult<Self> {
        let set_count = [revision.hash.is_some(), revision.git_ref.is_some(), revision.rev.is_some()]
            .iter()
            .filter(|b| **b)
            .count();
        if set_count > 1 {
            return Err(ScanError::Programming(
                "GitIterator accepts at most one of hash/ref/rev".into(),
            ));
        }
        Ok(GitIterator { url: url.into(), revision, guard: None, checkout_dir: None })
    }
}

impl IteratorImpl for GitIterator {
    fn validate(&self) -> ScanResult<()> {
        if self.url.is_empty() {
            return Err(ScanError::Programming("git URL is empty".into()));
        }
        if let Some(hash) = &self.revision.hash {
            if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ScanError::Programming(format!("not a 40-hex commit hash: {hash}")));
            }
        }
        Ok(())
    }

    fn recurse(
        &mut self,
        ctx: &ScanContext,
        _scan: &mut ScanFn<'_>,
    ) -> ScanResult<Vec<Box<dyn IteratorImpl>>> {
        let dir = ctx.cache.git_dir(
            &self.url,
            self.revision.hash.as_deref().unwrap_or(""),
            self.revision.git_ref.as_deref().unwrap_or(""),
            self.revision.rev.as_deref().unwrap_or(""),
        );

        let guard = ResourceGuard::acquire(CacheKind::Git, &self.url);

        std::fs::create_dir_all(
            dir.parent().ok_or_else(|| ScanError::Programming("cache dir has no parent".into()))?,
        )?;

        let repo = if dir.join(".git").exists() {
            Repository::open(&dir).map_err(ScanError::Git)?
        } else {
            tracing::info!(url = %self.url, dest = %dir.display(), "cloning repository");
            clone_non_bare(&self.url, &dir)?
        };

        if ctx.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let resolved = resolve_commit(&repo, &self.revision)?;

        let head_oid = repo.head().ok().and_then(|h| h.target());
        if head_oid != Some(resolved) {
            checkout_commit(&repo, resolved)?;
        }

        let checkout_root = SafePath::abs_dir(dir.clone())?;
        self.checkout_dir = Some(checkout_root.clone());
        self.guard = Some(guard);

        let gen_uid = git_uid(&self.url, &resolved.to_string(), checkout_root.clone());
        let child = FsIterator::new(checkout_root, gen_uid, format!("fs:{}", self.url))?;

        Ok(vec![Box::new(child)])
    }

    fn close(&mut self) -> ScanResult<()> {
        if let Some(guard) = &self.guard {
            guard.unlock();
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("git:{}", self.url)
    }
}

fn clone_non_bare(url: &str, dest: &std::path::Path) -> ScanResult<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(false);
    let mut builder = git2::build::RepoBuilder::new();
    builder.clone(url, dest).map_err(ScanError::Git)
}

/// Resolve the desired commit: `hash` used literally, `ref` resolved to
/// its tip commit (dereferencing annotated tags), `rev` resolved via the
/// library, and if none was given, the remote HEAD.
fn resolve_commit(repo: &Repository, revision: &GitRevision) -> ScanResult<git2::Oid> {
    if let Some(hash) = &revision.hash {
        return git2::Oid::from_str(hash).map_err(ScanError::Git);
    }
    if let Some(git_ref) = &revision.git_ref {
        let reference = repo.find_reference(git_ref).map_err(ScanError::Git)?;
        let obj = reference.peel(git2::ObjectType::Commit).map_err(ScanError::Git)?;
        return Ok(obj.id());
    }
    if let Some(rev) = &revision.rev {
        let obj = repo.revparse_single(rev).map_err(ScanError::Git)?;
        let commit = obj.peel_to_commit().map_err(ScanError::Git)?;
        return Ok(commit.id());
    }
    // No revision given: determine the remote HEAD.
    let mut remote = repo.find_remote("origin").map_err(ScanError::Git)?;
    remote.connect(git2::Direction::Fetch).map_err(ScanError::Git)?;
    let head = remote
        .list()
        .map_err(ScanError::Git)?
        .iter()
        .find(|h| h.name() == "HEAD")
        .map(|h| h.oid())
        .ok_or_else(|| ScanError::Resource("remote has no advertised HEAD".into()))?;
    remote.disconnect().ok();
    Ok(head)
}

fn checkout_commit(repo: &Repository, oid: git2::Oid) -> ScanResult<()> {
    let commit = repo.find_commit(oid).map_err(ScanError::Git)?;
    repo.checkout_tree(commit.as_object(), None).map_err(ScanError::Git)?;
    repo.set_head_detached(oid).map_err(ScanError::Git)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_multiple_revision_selectors() {
        let rev = GitRevision {
            hash: Some("a".repeat(40)),
            git_ref: Some("refs/heads/main".into()),
            rev: None,
        };
        assert!(GitIterator::new("https://example.com/x/y", rev).is_err());
    }

    #[test]
    fn validate_rejects_short_hash() {
        let rev = GitRevision { hash: Some("abc".into()), ..Default::default() };
        let iter = GitIterator::new("https://example.com/x/y", rev).unwrap();
        assert!(iter.validate().is_err());
    }

    #[test]
    fn cache_dir_shares_storage_for_identical_requests() {
        let prefix = crate::cache::CachePrefix::for_program("licensescope-test");
        let a = prefix.git_dir("https://example.com/x/y", "deadbeef", "", "");
        let b = prefix.git_dir("https://example.com/x/y", "deadbeef", "", "");
        assert_eq!(a, b);
        let c = prefix.git_dir("https://example.com/x/y", "cafed00d", "", "");
        assert_ne!(a, c);
    }
}
