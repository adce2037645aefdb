use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{KvError, KvStore};

/// Redis-backed `KvStore`. `ConnectionManager` reconnects transparently, so
/// a single clone lives for the app's lifetime the same way `AppContext`
/// carries a single pooled `db` handle.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// # Errors
    /// Returns `KvError` if the Redis URL can't be parsed or the initial
    /// connection fails. Treated as a `FatalConfig` error by callers
    /// (spec.md section 7).
    pub async fn connect(redis_url: &str) -> Result<Self, KvError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| KvError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(result.is_some())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs as i64)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, KvError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(if ttl < 0 { None } else { Some(ttl) })
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}
