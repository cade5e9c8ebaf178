//! Result and schema caching.
//!
//! The data layer talks to caches through the [`Cache`] trait and stores
//! JSON values. [`MemoryCache`] is the in-process implementation; other
//! backends plug in by implementing the trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

/// Tags attached to a cache entry; invalidating a tag drops every entry
/// carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDependency {
    tags: Vec<String>,
}

impl CacheDependency {
    /// Dependency on the given tags.
    pub fn tags<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// The tags.
    #[must_use]
    pub fn tag_list(&self) -> &[String] {
        &self.tags
    }
}

/// Key/value store for cached query results and schema metadata.
pub trait Cache: fmt::Debug + Send + Sync {
    /// Returns the live value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value`; `ttl` of `None` never expires.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>, dependency: Option<&CacheDependency>);

    /// Removes `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> bool;

    /// Removes every entry.
    fn flush(&self);
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    tags: Vec<String>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process cache with TTL and tag invalidation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry tagged with any of `tags`.
    pub fn invalidate_tags(&self, tags: &[&str]) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| !entry.tags.iter().any(|t| tags.contains(&t.as_str())));
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// True when no live entry remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>, dependency: Option<&CacheDependency>) {
        let entry = Entry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            tags: dependency.map(|d| d.tags.clone()).unwrap_or_default(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn flush(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
