//! `ClusterWorker` (component C8). Consumes `cluster_group { group_id,
//! job_id, attempt }` jobs on queue `cluster`. See spec.md sections 4.6
//! ("On job execution") and 4.8.

use std::time::Duration;

use loco_rs::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::debounce::scheduler::ClusterJobDispatch;
use crate::debounce::TickDecision;
use crate::errors::CoreError;
use crate::repository;
use crate::state;

pub struct ClusterGroupWorker {
    pub ctx: AppContext,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WorkerArgs {
    pub group_id: i32,
    pub job_id: Uuid,
    pub attempt: u32,
}

#[async_trait]
impl BackgroundWorker<WorkerArgs> for ClusterGroupWorker {
    fn build(ctx: &AppContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    async fn perform(&self, args: WorkerArgs) -> Result<()> {
        let services = state::get();

        let decision = services.debounce.tick(args.group_id, args.job_id, args.attempt).await?;
        match decision {
            TickDecision::Rescheduled => Ok(()),
            TickDecision::Proceed | TickDecision::ForceProceed => {
                run_reconciliation(&self.ctx, args.group_id).await
            }
        }
    }
}

async fn run_reconciliation(ctx: &AppContext, group_id: i32) -> Result<()> {
    let services = state::get();
    let gap = services.settings.meeting_gap();
    let budget = Duration::from_secs(services.settings.cluster_job_timeout_secs);

    // On failure, `cluster:job:<group_id>` is deliberately left in place;
    // its TTL is the recovery path (spec.md 4.6, "On any failure").
    //
    // A timeout drops the in-flight `reconcile_meetings` future, which drops
    // its `DatabaseTransaction` before it's committed: sea-orm rolls the
    // transaction back, which releases a Postgres advisory lock taken with
    // `pg_advisory_xact_lock` and drops the in-process mutex guard fallback
    // (spec.md section 5, "Cancellation/timeout").
    match tokio::time::timeout(budget, repository::reconcile_meetings(&ctx.db, group_id, gap)).await
    {
        Ok(result) => result?,
        Err(_) => return Err(CoreError::Concurrency { group_id }.into()),
    }

    services.debounce.finish(group_id).await?;
    Ok(())
}

/// Hands a due scheduled job off to the real `loco-rs` worker queue, so
/// reconciliation always runs inside a genuine `ClusterGroupWorker::perform`
/// call rather than inline in the scheduler's poll loop (spec.md 4.6,
/// "the actual reconciliation is always performed on a worker, never
/// inline").
pub struct ClusterDispatch {
    pub ctx: AppContext,
}

#[async_trait]
impl ClusterJobDispatch for ClusterDispatch {
    async fn dispatch(&self, group_id: i32, job_id: Uuid, attempt: u32) -> Result<(), CoreError> {
        ClusterGroupWorker::perform_later(&self.ctx, WorkerArgs { group_id, job_id, attempt })
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))
    }
}
