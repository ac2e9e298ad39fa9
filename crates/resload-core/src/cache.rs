//! Revalidation cache for remote resources.
//!
//! Stores the last validators (`ETag`, `Last-Modified`) and body seen for
//! each remote reference. Entries have no TTL and are never evicted; the
//! cache lives as long as its owner.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Last successful response for a remote reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Opaque entity tag, exactly as the server sent it.
    pub etag: Option<String>,
    /// `Last-Modified` timestamp, exactly as the server sent it.
    pub last_modified: Option<String>,
    /// Decoded response body.
    pub body: String,
}

impl CacheEntry {
    /// Whether the entry carries any validator worth revalidating with.
    #[must_use]
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// Conditional request headers built from a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    /// Value for `If-None-Match`.
    pub if_none_match: Option<String>,
    /// Value for `If-Modified-Since`.
    pub if_modified_since: Option<String>,
}

impl ConditionalHeaders {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }
}

/// Process-scoped store keyed by resolved remote reference.
#[derive(Debug, Default)]
pub struct RevalidationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl RevalidationCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty cache behind an `Arc`, ready to share.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Look up the entry for a reference.
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
    }

    /// Store or replace the entry for a reference.
    pub fn insert(&self, reference: impl Into<String>, entry: CacheEntry) {
        let reference = reference.into();
        debug!(
            reference = %reference,
            etag = entry.etag.as_deref().unwrap_or("-"),
            last_modified = entry.last_modified.as_deref().unwrap_or("-"),
            "Caching response"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference, entry);
    }

    /// Remove the entry for a reference.
    ///
    /// The reference's lock goes too unless a caller is holding it.
    pub fn remove(&self, reference: &str) -> Option<CacheEntry> {
        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(reference)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(reference);
        }
        drop(locks);

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference)
    }

    /// Drop every entry, and every lock no caller is holding.
    pub fn clear(&self) {
        self.locks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Conditional headers for a reference, empty if nothing is cached or
    /// the cached entry has no validators.
    #[must_use]
    pub fn conditional_headers(&self, reference: &str) -> ConditionalHeaders {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(reference)
            .map(|entry| ConditionalHeaders {
                if_none_match: entry.etag.clone(),
                if_modified_since: entry.last_modified.clone(),
            })
            .unwrap_or_default()
    }

    /// Acquire the per-reference lock.
    ///
    /// Holding the guard across a request/response cycle makes the next
    /// caller for the same reference observe this caller's cache write.
    pub async fn lock(&self, reference: &str) -> OwnedMutexGuard<()> {
        let existing = self
            .locks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned();

        let lock = match existing {
            Some(lock) => lock,
            None => self
                .locks
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(reference.to_string())
                .or_default()
                .clone(),
        };

        lock.lock_owned().await
    }
}
