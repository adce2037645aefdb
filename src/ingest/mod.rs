//! `ingest_photo` (component C9, "IngestAPI (thin)"). See spec.md section 6,
//! "Ingest entry point".

use loco_rs::app::AppContext;
use uuid::Uuid;

use crate::common::content_hash::content_hash;
use crate::errors::CoreError;
use crate::metadata::is_supported_mime;
use crate::repository::{self, NewPhoto};
use crate::state;
use crate::storage::Kind;
use crate::workers::process_photo::{ProcessPhotoWorker, WorkerArgs};

pub struct IngestResult {
    pub photo_id: Uuid,
    pub status: &'static str,
}

/// Computes the content hash, writes the original via Storage, inserts the
/// row (idempotent on `(group_id, content_hash)`), and enqueues processing.
/// Returns immediately: metadata extraction and clustering happen later on
/// background workers.
///
/// # Errors
/// Returns `CoreError::Validation` for an unsupported mime type; any other
/// error is a storage or database failure.
pub async fn ingest_photo(
    ctx: &AppContext,
    group_id: i32,
    uploader_id: i32,
    bytes: &[u8],
    declared_mime: &str,
) -> Result<IngestResult, CoreError> {
    if !is_supported_mime(declared_mime) {
        return Err(CoreError::Validation(format!(
            "unsupported mime type: {declared_mime}"
        )));
    }

    let services = state::get();
    let hash = content_hash(bytes);
    let original_path = services
        .storage
        .write(&hash, Kind::Original, extension_for_mime(declared_mime), bytes)
        .await?;

    let (photo, inserted) = repository::insert_photo_if_absent(
        &ctx.db,
        NewPhoto {
            group_id,
            uploader_id,
            content_hash: hash,
            original_path: original_path.to_string_lossy().into_owned(),
            mime: declared_mime.to_string(),
            bytes: bytes.len() as i64,
        },
    )
    .await?;

    if inserted {
        ProcessPhotoWorker::perform_later(ctx, WorkerArgs { photo_id: photo.id })
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;
    }

    Ok(IngestResult {
        photo_id: photo.id,
        status: if inserted { "accepted" } else { "duplicate" },
    })
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/tiff" => Some("tiff"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        _ => None,
    }
}
