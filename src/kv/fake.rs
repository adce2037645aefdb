use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{KvError, KvStore};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory `KvStore` for tests (spec.md's own design notes call for
/// dependency-injected fakes over a singleton KV client). TTLs are tracked
/// with `Instant` and checked lazily on access, mirroring Redis's own lazy
/// expiry semantics closely enough for debounce tests.
#[derive(Default)]
pub struct FakeKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl FakeKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.is_none_or(|at| at > Instant::now())
    }
}

#[async_trait]
impl KvStore for FakeKv {
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            if Self::is_live(existing) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            if Self::is_live(entry) {
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
        }
        Ok(None)
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut entries = self.entries.lock().unwrap();
        let next = match entries.get(key) {
            Some(entry) if Self::is_live(entry) => {
                entry.value.parse::<i64>().unwrap_or(0) + 1
            }
            _ => 1,
        };
        let expires_at = entries.get(key).and_then(|e| e.expires_at);
        entries.insert(
            key.to_string(),
            Entry { value: next.to_string(), expires_at },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, KvError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).and_then(|entry| {
            if !Self::is_live(entry) {
                return None;
            }
            entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()).as_secs() as i64)
        }))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nx_set_wins_once_then_loses_until_expiry() {
        let kv = FakeKv::new();
        assert!(kv.set_nx_ex("k", "1", 60).await.unwrap());
        assert!(!kv.set_nx_ex("k", "2", 60).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn incr_tracks_a_running_count() {
        let kv = FakeKv::new();
        assert_eq!(kv.incr("c").await.unwrap(), 1);
        assert_eq!(kv.incr("c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn del_clears_the_key() {
        let kv = FakeKv::new();
        kv.set_ex("k", "1", 60).await.unwrap();
        kv.del("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }
}
