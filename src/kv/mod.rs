//! A small key-value abstraction over the primitives the debounce protocol
//! needs: `SET ... NX EX`, `SET ... EX`, `GET`, `INCR`, `TTL`, `DEL` (spec.md
//! section 6, "KV contracts"). Kept as a trait so tests can inject an
//! in-memory fake instead of a real Redis instance, the way the teacher
//! passes an explicit `AppContext` instead of reaching for a singleton
//! (spec.md section 9, "Module-level DB session / singleton KV").

pub mod fake;
pub mod redis_kv;

use async_trait::async_trait;

pub use fake::FakeKv;
pub use redis_kv::RedisKv;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// `SET key value NX EX ttl_secs`. Returns `true` if the key was set
    /// (this call won the race), `false` if it already existed.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, KvError>;

    /// `SET key value EX ttl_secs`, unconditionally.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError>;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// `INCR key`, returning the post-increment value.
    async fn incr(&self, key: &str) -> Result<i64, KvError>;

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), KvError>;

    /// `TTL key` in seconds, or `None` if the key doesn't exist.
    async fn ttl(&self, key: &str) -> Result<Option<i64>, KvError>;

    async fn del(&self, key: &str) -> Result<(), KvError>;
}
