//! Streams originals and thumbnails by `photo_id` (component C3 consumer).
//! Grounded on the same streaming pattern as the teacher's media download
//! controller: open the file, sniff its mime from the extension, stream the
//! body without buffering the whole file in memory.

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use loco_rs::prelude::*;
use sea_orm::EntityTrait;
use tokio::fs::File;
use tokio::io::ErrorKind;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::error;
use uuid::Uuid;

use crate::models::photos;
use crate::storage::Kind;

async fn get_original(
    State(ctx): State<AppContext>,
    AxumPath(photo_id): AxumPath<Uuid>,
) -> Result<impl IntoResponse> {
    stream_photo(&ctx, photo_id, Kind::Original).await
}

async fn get_thumb(
    State(ctx): State<AppContext>,
    AxumPath(photo_id): AxumPath<Uuid>,
) -> Result<impl IntoResponse> {
    stream_photo(&ctx, photo_id, Kind::Thumb).await
}

async fn stream_photo(ctx: &AppContext, photo_id: Uuid, kind: Kind) -> Result<impl IntoResponse> {
    let photo = photos::Entity::find_by_id(photo_id)
        .one(&ctx.db)
        .await?
        .ok_or(Error::NotFound)?;

    let path: PathBuf = match kind {
        Kind::Original => PathBuf::from(&photo.original_path),
        Kind::Thumb => photo.thumb_path.as_ref().map(PathBuf::from).ok_or(Error::NotFound)?,
    };

    let file = File::open(&path).await.map_err(|e| {
        error!("failed to open {}: {}", path.display(), e);
        match e.kind() {
            ErrorKind::NotFound => Error::NotFound,
            _ => Error::InternalServerError,
        }
    })?;

    let mime_type = mime_guess::from_path(&path).first().unwrap_or(mime::APPLICATION_OCTET_STREAM);
    let stream = FramedRead::new(file, BytesCodec::new());

    Ok(axum::response::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type.to_string())
        .body(Body::from_stream(stream))
        .map_err(|_| Error::InternalServerError)?)
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("/download")
        .add("/original/:photo_id", get(get_original))
        .add("/thumb/:photo_id", get(get_thumb))
}
