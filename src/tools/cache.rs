//! In-process TTL cache
//!
//! Expired entries are dropped when read and swept on every write.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Upper bound on the TTL (one year) so expiry arithmetic cannot overflow
const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<V: Clone + Send + Sync> TtlCache<V> {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now()).await
    }

    pub async fn set(&self, key: &str, value: V) {
        self.set_at(key, value, Utc::now()).await
    }

    pub(crate) async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        None
    }

    pub(crate) async fn set_at(&self, key: &str, value: V, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
