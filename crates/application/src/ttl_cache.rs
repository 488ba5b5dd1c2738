//! In-process key/value cache with per-entry expiration.
//!
//! Backs the memoized fine-grained checks. Operations are synchronous and
//! never hold the lock across an await point, so sessions can sweep a user's
//! entries from non-async paths such as sign-out. Keys follow the families
//! `user_permissions_{user}`, `user_modules_{user}`,
//! `permission_check_{user}_{permission}` and `module_access_{user}_{path}`.
//! The user segment is percent-encoded for `%` and `_`, so it never contains
//! the separator and keys of different users cannot collide.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use regex::Regex;
use tessera_core::{AppError, AppResult};
use tessera_domain::UserId;
use tracing::debug;

const USER_KEY_FAMILIES: &[&str] = &[
    "user_permissions",
    "user_modules",
    "permission_check",
    "module_access",
];

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Heterogeneous cache with lazy expiry and pattern invalidation.
#[derive(Default)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value unless it is missing, expired, or of another type.
    ///
    /// Expired entries are removed on read.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    let value = entry.value.downcast_ref::<T>().cloned();
                    if value.is_none() {
                        debug!(key, "cache entry holds a different type");
                    }
                    return value;
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
            debug!(key, "evicted expired cache entry");
        }

        None
    }

    /// Stores a value, replacing any previous entry under the key.
    pub fn set<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        self.entries.write().insert(
            key.into(),
            CacheEntry {
                value: Arc::new(value),
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Removes one key. Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every key matching the pattern. Returns the number removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        before - entries.len()
    }

    /// Removes every key family held for one user in a single sweep.
    pub fn invalidate_user_cache(&self, user_id: &UserId) -> AppResult<usize> {
        let pattern = user_key_pattern(user_id)?;
        let removed = self.invalidate_pattern(&pattern);
        debug!(user_id = %user_id, removed, "invalidated user cache entries");
        Ok(removed)
    }

    /// Drops expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Key under which a user's permission name set is memoized.
#[must_use]
pub fn user_permissions_key(user_id: &UserId) -> String {
    format!("user_permissions_{}", user_segment(user_id))
}

/// Key under which a user's accessible modules are memoized.
#[must_use]
pub fn user_modules_key(user_id: &UserId) -> String {
    format!("user_modules_{}", user_segment(user_id))
}

/// Key under which one permission check is memoized.
#[must_use]
pub fn permission_check_key(user_id: &UserId, permission_name: &str) -> String {
    format!("permission_check_{}_{permission_name}", user_segment(user_id))
}

/// Key under which one module access check is memoized.
#[must_use]
pub fn module_access_key(user_id: &UserId, path: &str) -> String {
    format!("module_access_{}_{path}", user_segment(user_id))
}

fn user_segment(user_id: &UserId) -> String {
    user_id.as_str().replace('%', "%25").replace('_', "%5F")
}

fn user_key_pattern(user_id: &UserId) -> AppResult<Regex> {
    let pattern = format!(
        "^(?:{})_{}(?:_|$)",
        USER_KEY_FAMILIES.join("|"),
        regex::escape(&user_segment(user_id))
    );

    Regex::new(pattern.as_str()).map_err(|error| {
        AppError::Internal(format!(
            "failed to build cache pattern for user '{user_id}': {error}"
        ))
    })
}
