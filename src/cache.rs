//! Cache layout and the per-resource mutual-exclusion discipline that
//! protects it.
//!
//! Two-level locking: a map-guard `Mutex` protects insertion into a
//! per-kind `HashMap<resource-identity, Arc<ResourceLock>>`; the returned
//! per-key lock guards the actual long-lived materialization.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, OnceLock};

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Git,
    Http,
    Zip,
    Tar,
    Gzip,
}

impl CacheKind {
    fn dirname(self) -> &'static str {
        match self {
            CacheKind::Git => "git",
            CacheKind::Http => "http",
            CacheKind::Zip => "zip",
            CacheKind::Tar => "tar",
            CacheKind::Gzip => "gzip",
        }
    }
}

/// Absolute cache prefix, conventionally `<user-cache>/<program>/`.
#[derive(Debug, Clone)]
pub struct CachePrefix(pub PathBuf);

impl CachePrefix {
    pub fn for_program(program: &str) -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        CachePrefix(base.join(program))
    }

    pub fn kind_dir(&self, kind: CacheKind) -> PathBuf {
        self.0.join(kind.dirname())
    }

    /// Git: name = SHA-256 of `url + "\n" + hash + "\n" + ref + "\n" + rev`.
    pub fn git_dir(&self, url: &str, hash: &str, git_ref: &str, rev: &str) -> PathBuf {
        let digest = sha256_hex(&format!("{url}\n{hash}\n{git_ref}\n{rev}"));
        self.kind_dir(CacheKind::Git).join(digest)
    }

    /// Http/Zip/Tar/Gzip: name = SHA-256 of `(url or source path) + now_ms`.
    pub fn fresh_dir(&self, kind: CacheKind, source: &str, now_ms: u128) -> PathBuf {
        let digest = sha256_hex(&format!("{source}{now_ms}"));
        self.kind_dir(kind).join(digest)
    }
}

pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// A single resource's exclusion primitive. Built on a `Mutex<bool>` +
/// `Condvar` rather than holding a `MutexGuard` across an `Iterator`'s
/// lifetime, since `MutexGuard` is not `Send` and iterators are passed
/// between the producer and collector threads.
struct ResourceLock {
    locked: Mutex<bool>,
    released: Condvar,
}

impl ResourceLock {
    fn new() -> Self {
        ResourceLock { locked: Mutex::new(false), released: Condvar::new() }
    }

    fn acquire(&self) {
        let mut locked = self.locked.lock().unwrap();
        while *locked {
            locked = self.released.wait(locked).unwrap();
        }
        *locked = true;
    }

    fn release(&self) {
        let mut locked = self.locked.lock().unwrap();
        if *locked {
            *locked = false;
            self.released.notify_one();
        }
    }
}

/// Process-wide per-kind lock map. Entries are created once and never
/// removed; contention is expected only between concurrent requests for
/// the same resource identity.
pub struct ResourceLocks {
    maps: Mutex<HashMap<CacheKind, HashMap<String, Arc<ResourceLock>>>>,
}

impl ResourceLocks {
    fn new() -> Self {
        ResourceLocks { maps: Mutex::new(HashMap::new()) }
    }

    pub fn global() -> &'static ResourceLocks {
        static LOCKS: OnceLock<ResourceLocks> = OnceLock::new();
        LOCKS.get_or_init(ResourceLocks::new)
    }

    fn entry(&self, kind: CacheKind, identity: &str) -> Arc<ResourceLock> {
        let mut maps = self.maps.lock().unwrap();
        let per_kind = maps.entry(kind).or_default();
        per_kind.entry(identity.to_string()).or_insert_with(|| Arc::new(ResourceLock::new())).clone()
    }
}

/// Holds a resource's lock for as long as it is alive. `unlock` (called
/// from `Close`) is idempotent — a once-guarded release.
pub struct ResourceGuard {
    lock: Arc<ResourceLock>,
    released: Mutex<bool>,
}

impl ResourceGuard {
    pub fn acquire(kind: CacheKind, identity: &str) -> ResourceGuard {
        let lock = ResourceLocks::global().entry(kind, identity);
        lock.acquire();
        ResourceGuard { lock, released: Mutex::new(false) }
    }

    /// Release the resource lock. Safe to call more than once; only the
    /// first call has an effect.
    pub fn unlock(&self) {
        let mut released = self.released.lock().unwrap();
        if !*released {
            self.lock.release();
            *released = true;
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_identity_serializes() {
        let locks = ResourceLocks::global();
        let a = locks.entry(CacheKind::Git, "https://example.com/x/y-same");
        let b = locks.entry(CacheKind::Git, "https://example.com/x/y-same");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_identity_is_independent() {
        let locks = ResourceLocks::global();
        let a = locks.entry(CacheKind::Git, "https://example.com/a-indep");
        let b = locks.entry(CacheKind::Git, "https://example.com/b-indep");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unlock_is_idempotent() {
        let guard = ResourceGuard::acquire(CacheKind::Http, "http://x/y");
        guard.unlock();
        guard.unlock();
    }

    #[test]
    fn fresh_dir_is_hash_of_source_and_time() {
        let prefix = CachePrefix::for_program("licensescope-test");
        let a = prefix.fresh_dir(CacheKind::Http, "http://x/y.zip", 1);
        let b = prefix.fresh_dir(CacheKind::Http, "http://x/y.zip", 2);
        assert_ne!(a, b);
    }
}
