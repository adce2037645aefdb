//! `ProcessWorker` (component C7). Consumes `process_photo { photo_id }`
//! jobs on queue `default`. See spec.md section 4.7.

use std::path::Path;
use std::time::Duration;

use loco_rs::prelude::*;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::metadata;
use crate::models::photos;
use crate::repository::{self, MetadataUpdate};
use crate::state::{self, CoreServices};
use crate::storage::{Kind, Storage};
use crate::thumbnail;

pub struct ProcessPhotoWorker {
    pub ctx: AppContext,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WorkerArgs {
    pub photo_id: Uuid,
}

#[async_trait]
impl BackgroundWorker<WorkerArgs> for ProcessPhotoWorker {
    fn build(ctx: &AppContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    async fn perform(&self, args: WorkerArgs) -> Result<()> {
        let services = state::get();
        let budget = Duration::from_secs(services.settings.process_job_timeout_secs);

        match tokio::time::timeout(budget, process_one(&self.ctx, &services, args.photo_id)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CoreError::Transient(format!(
                    "process_photo timed out after {}s for photo {}",
                    services.settings.process_job_timeout_secs, args.photo_id
                ))
                .into())
            }
        }
        Ok(())
    }
}

const MAX_READ_ATTEMPTS: u32 = 3;

async fn process_one(
    ctx: &AppContext,
    services: &CoreServices,
    photo_id: Uuid,
) -> Result<(), CoreError> {
    let photo = photos::Entity::find_by_id(photo_id)
        .one(&ctx.db)
        .await
        .map_err(CoreError::Database)?
        .ok_or_else(|| CoreError::Validation(format!("photo {photo_id} not found")))?;

    // Idempotent: a retried job or a duplicate enqueue is a no-op once
    // metadata has already landed.
    if photo.processed {
        return Ok(());
    }

    let update = match read_with_retry(&services.storage, &photo.original_path, photo.id).await {
        Ok(bytes) => build_metadata_update(services, &photo, &bytes).await,
        Err(e) => {
            warn!("giving up reading original for photo {}: {}", photo.id, e);
            MetadataUpdate {
                shot_at: None,
                gps: None,
                width: None,
                height: None,
                thumb_path: None,
                processing_error: Some(e.to_string()),
            }
        }
    };

    repository::update_photo_metadata(&ctx.db, photo.id, update).await?;
    services.debounce.notify(photo.group_id).await?;
    Ok(())
}

/// Retries transient I/O with exponential backoff and jitter, the same
/// shape as the teacher's `retry_with_backoff` (spec.md 4.7 step 6).
async fn read_with_retry(storage: &Storage, path: &str, photo_id: Uuid) -> Result<Vec<u8>, CoreError> {
    use rand::{thread_rng, Rng};

    let mut attempt = 0;
    loop {
        match storage.read(Path::new(path)).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt + 1 < MAX_READ_ATTEMPTS => {
                attempt += 1;
                let base_delay_ms = 200 * 2u64.pow(attempt);
                let jitter_ms = thread_rng().gen_range(0..=base_delay_ms / 2);
                let backoff = Duration::from_millis(base_delay_ms + jitter_ms);
                warn!(
                    "read attempt {} failed for photo {}: {}; retrying in {:?}",
                    attempt, photo_id, e, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Extraction and thumbnailing failures are non-fatal (`MetadataUnavailable`,
/// spec.md section 7): the photo still gets `processed=true` with whatever
/// fields could be filled in, routing to the default meeting if `shot_at`
/// stays null.
async fn build_metadata_update(
    services: &CoreServices,
    photo: &photos::Model,
    bytes: &[u8],
) -> MetadataUpdate {
    let (shot_at, gps, width, height, orientation) = match metadata::extract(bytes, &photo.mime) {
        Ok(extracted) => (
            extracted.shot_at,
            extracted.gps,
            extracted.width,
            extracted.height,
            extracted.orientation,
        ),
        Err(e) => {
            warn!("metadata unavailable for photo {}: {}", photo.id, e);
            (None, None, None, None, None)
        }
    };

    let thumb_path = match thumbnail::try_make_thumbnail(bytes, services.settings.thumb_max_edge, orientation) {
        Some(thumb_bytes) => {
            match services.storage.write(&photo.content_hash, Kind::Thumb, Some("jpg"), &thumb_bytes).await {
                Ok(path) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!("thumbnail write failed for photo {}: {}", photo.id, e);
                    None
                }
            }
        }
        None => None,
    };

    MetadataUpdate { shot_at, gps, width, height, thumb_path, processing_error: None }
}
