//! Thin upload endpoint (component C9). Accepts a multipart upload and
//! hands it straight to `ingest::ingest_photo`; no business logic lives
//! here (spec.md section 1, "Out of scope: HTTP/auth endpoints" — this
//! controller is the minimal glue the spec assumes already exists).

use axum::extract::{Multipart, Query, State};
use loco_rs::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::ingest_photo;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub group_id: i32,
    pub uploader_id: i32,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub photo_id: Uuid,
    pub status: String,
}

async fn upload(
    State(ctx): State<AppContext>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut declared_mime = mime::APPLICATION_OCTET_STREAM.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?
    {
        if field.name() == Some("photo") {
            if let Some(content_type) = field.content_type() {
                declared_mime = content_type.to_string();
            }
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| Error::BadRequest(e.to_string()))?
                    .to_vec(),
            );
        }
    }

    let bytes = bytes.ok_or_else(|| Error::BadRequest("missing 'photo' field".to_string()))?;

    let result = ingest_photo(&ctx, query.group_id, query.uploader_id, &bytes, &declared_mime).await?;

    format::json(UploadResponse { photo_id: result.photo_id, status: result.status.to_string() })
}

pub fn routes() -> Routes {
    Routes::new().prefix("/photos").add("/", post(upload))
}
