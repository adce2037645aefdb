//! `DebounceCoordinator` (component C6): per-group single-flight scheduling
//! for cluster recomputation, built on top of a KV store with TTL and a
//! delayed-job primitive. See spec.md section 4.6 for the full protocol this
//! module implements.

pub mod scheduler;

pub use scheduler::{ClusterJobScheduler, RedisClusterScheduler};

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::errors::CoreError;
use crate::kv::KvStore;

#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    pub debounce_ttl: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
}

/// Outcome of `DebounceCoordinator::tick`, driving what `ClusterWorker`
/// (C8) does next (spec.md section 4.6, "On job execution").
#[derive(Debug, PartialEq, Eq)]
pub enum TickDecision {
    /// The burst is still live; the same job id was rescheduled.
    Rescheduled,
    /// The burst looked quiet; proceed with reconciliation.
    Proceed,
    /// Retries exhausted; proceed anyway (bounded-staleness concession).
    ForceProceed,
}

pub struct DebounceCoordinator {
    kv: Arc<dyn KvStore>,
    scheduler: Arc<dyn ClusterJobScheduler>,
    config: DebounceConfig,
}

fn pending_key(group_id: i32) -> String {
    format!("cluster:pending:{group_id}")
}

fn job_key(group_id: i32) -> String {
    format!("cluster:job:{group_id}")
}

fn count_key(group_id: i32) -> String {
    format!("cluster:count:{group_id}")
}

impl DebounceCoordinator {
    #[must_use]
    pub fn new(
        kv: Arc<dyn KvStore>,
        scheduler: Arc<dyn ClusterJobScheduler>,
        config: DebounceConfig,
    ) -> Self {
        Self { kv, scheduler, config }
    }

    /// Called on every upload that lands in `group_id` (spec.md 4.6, "On
    /// upload"). Non-blocking from the caller's perspective beyond three KV
    /// round-trips and, at most, one enqueue.
    ///
    /// # Errors
    /// Returns `CoreError::Transient` if the KV store or the scheduler is
    /// unreachable.
    pub async fn notify(&self, group_id: i32) -> Result<(), CoreError> {
        let ttl = self.config.debounce_ttl.as_secs();

        self.kv
            .set_ex(&pending_key(group_id), "1", ttl)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        self.kv
            .incr(&count_key(group_id))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        self.kv
            .expire(&count_key(group_id), ttl)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let job_id = Uuid::new_v4();
        let job_ttl = self.config.retry_delay.as_secs() + ttl + 10;
        let won = self
            .kv
            .set_nx_ex(&job_key(group_id), &job_id.to_string(), job_ttl)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        if won {
            self.scheduler
                .schedule(group_id, job_id, self.config.retry_delay.as_secs(), 0)
                .await?;
        }

        Ok(())
    }

    /// Called by `ClusterWorker` when a scheduled job fires (spec.md 4.6,
    /// "On job execution", step 1).
    ///
    /// # Errors
    /// Returns `CoreError::Transient` if the KV store or the scheduler is
    /// unreachable.
    pub async fn tick(
        &self,
        group_id: i32,
        job_id: Uuid,
        attempt: u32,
    ) -> Result<TickDecision, CoreError> {
        let still_pending = self
            .kv
            .get(&pending_key(group_id))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?
            .is_some();

        if !still_pending {
            return Ok(TickDecision::Proceed);
        }

        if attempt >= self.config.max_retries {
            return Ok(TickDecision::ForceProceed);
        }

        self.scheduler
            .schedule(
                group_id,
                job_id,
                self.config.retry_delay.as_secs(),
                attempt + 1,
            )
            .await?;
        Ok(TickDecision::Rescheduled)
    }

    /// Called by `ClusterWorker` after a successful reconciliation commits
    /// (spec.md 4.6, "On job execution", step 2).
    ///
    /// # Errors
    /// Returns `CoreError::Transient` if the KV store is unreachable.
    pub async fn finish(&self, group_id: i32) -> Result<(), CoreError> {
        self.kv
            .del(&job_key(group_id))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        self.kv
            .del(&count_key(group_id))
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::FakeKv;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingScheduler {
        calls: Mutex<Vec<(i32, u64, u32)>>,
    }

    #[async_trait::async_trait]
    impl ClusterJobScheduler for RecordingScheduler {
        async fn schedule(
            &self,
            group_id: i32,
            _job_id: Uuid,
            delay_secs: u64,
            attempt: u32,
        ) -> Result<(), CoreError> {
            self.calls.lock().unwrap().push((group_id, delay_secs, attempt));
            Ok(())
        }
    }

    fn config() -> DebounceConfig {
        DebounceConfig {
            debounce_ttl: Duration::from_secs(5),
            retry_delay: Duration::from_secs(3),
            max_retries: 2,
        }
    }

    #[tokio::test]
    async fn single_flight_only_one_job_scheduled_per_burst() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv, scheduler.clone(), config());

        for _ in 0..20 {
            coordinator.notify(42).await.unwrap();
        }

        assert_eq!(scheduler.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn independent_groups_each_get_their_own_job() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv, scheduler.clone(), config());

        coordinator.notify(1).await.unwrap();
        coordinator.notify(2).await.unwrap();
        coordinator.notify(1).await.unwrap();

        assert_eq!(scheduler.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tick_reschedules_while_burst_is_live() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv.clone(), scheduler, config());

        kv.set_ex("cluster:pending:7", "1", 60).await.unwrap();
        let decision = coordinator.tick(7, Uuid::new_v4(), 0).await.unwrap();
        assert_eq!(decision, TickDecision::Rescheduled);
    }

    #[tokio::test]
    async fn tick_proceeds_once_pending_expires() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv, scheduler, config());

        let decision = coordinator.tick(7, Uuid::new_v4(), 0).await.unwrap();
        assert_eq!(decision, TickDecision::Proceed);
    }

    #[tokio::test]
    async fn tick_forces_progress_after_max_retries() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv.clone(), scheduler, config());

        kv.set_ex("cluster:pending:7", "1", 60).await.unwrap();
        let decision = coordinator.tick(7, Uuid::new_v4(), 2).await.unwrap();
        assert_eq!(decision, TickDecision::ForceProceed);
    }

    #[tokio::test]
    async fn finish_clears_job_and_count_keys() {
        let kv = Arc::new(FakeKv::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let coordinator = DebounceCoordinator::new(kv.clone(), scheduler, config());

        coordinator.notify(9).await.unwrap();
        coordinator.finish(9).await.unwrap();

        assert_eq!(kv.get("cluster:job:9").await.unwrap(), None);
        assert_eq!(kv.get("cluster:count:9").await.unwrap(), None);
    }
}
