//! Delayed-enqueue primitive for `cluster_group` jobs (spec.md section 6,
//! "Queue contracts": queue `cluster` supports delayed enqueue).
//!
//! Redis has no native "enqueue after N seconds" command, so this is built
//! from a sorted set keyed by due-time and a poller that promotes due
//! entries to the real `loco-rs` worker queue once they're due. The KV
//! TTLs on `cluster:job:<group_id>` (see `debounce::mod`) remain the
//! liveness backstop if a poller process dies mid-flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::CoreError;

const SCHEDULE_KEY: &str = "cluster:schedule";

#[async_trait]
pub trait ClusterJobScheduler: Send + Sync {
    /// Schedule (or reschedule) `cluster_group { group_id, job_id, attempt }`
    /// to run `delay_secs` from now.
    async fn schedule(
        &self,
        group_id: i32,
        job_id: Uuid,
        delay_secs: u64,
        attempt: u32,
    ) -> Result<(), CoreError>;
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ScheduledJob {
    group_id: i32,
    job_id: Uuid,
    attempt: u32,
}

/// Final handoff target: whatever actually runs the `cluster_group` job
/// once it's due. Implemented by `workers::cluster_group` so this module
/// stays free of a dependency on `loco_rs::BackgroundWorker` internals.
#[async_trait]
pub trait ClusterJobDispatch: Send + Sync {
    async fn dispatch(&self, group_id: i32, job_id: Uuid, attempt: u32) -> Result<(), CoreError>;
}

#[derive(Clone)]
pub struct RedisClusterScheduler {
    conn: ConnectionManager,
}

impl RedisClusterScheduler {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Runs forever, polling for due jobs and handing them to `dispatch`.
    /// Intended to be spawned once per worker process as a detached task
    /// from an `Initializer::before_run` (see `initializers::cluster_scheduler`).
    pub async fn run_forever(&self, dispatch: Arc<dyn ClusterJobDispatch>, poll_interval: Duration) {
        loop {
            if let Err(e) = self.poll_once(dispatch.as_ref()).await {
                error!("cluster scheduler poll failed: {}", e);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn poll_once(&self, dispatch: &dyn ClusterJobDispatch) -> Result<(), CoreError> {
        let now = now_unix();
        let mut conn = self.conn.clone();
        let due: Vec<String> = conn
            .zrangebyscore(SCHEDULE_KEY, 0, now)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        for raw in due {
            // Best-effort ZREM before dispatch: if this races with another
            // poller (multiple worker processes), only one wins the ZREM
            // and only that one dispatches.
            let removed: i64 = conn
                .zrem(SCHEDULE_KEY, &raw)
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?;
            if removed == 0 {
                continue;
            }

            match serde_json::from_str::<ScheduledJob>(&raw) {
                Ok(job) => {
                    info!(
                        "dispatching cluster_group group_id={} job_id={} attempt={}",
                        job.group_id, job.job_id, job.attempt
                    );
                    if let Err(e) = dispatch.dispatch(job.group_id, job.job_id, job.attempt).await
                    {
                        error!("failed to dispatch cluster_group job: {}", e);
                    }
                }
                Err(e) => warn!("dropping unparseable scheduled job entry: {}", e),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ClusterJobScheduler for RedisClusterScheduler {
    async fn schedule(
        &self,
        group_id: i32,
        job_id: Uuid,
        delay_secs: u64,
        attempt: u32,
    ) -> Result<(), CoreError> {
        let due = now_unix() + delay_secs as i64;
        let payload = serde_json::to_string(&ScheduledJob { group_id, job_id, attempt })
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(SCHEDULE_KEY, payload, due)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
