use loco_rs::bgworker::BackgroundWorker;
use loco_rs::testing::prelude::*;
use photo_timeline::app::App;
use photo_timeline::ingest::ingest_photo;
use photo_timeline::models::photos;
use photo_timeline::workers::process_photo::ProcessPhotoWorker;
use sea_orm::EntityTrait;
use serial_test::serial;

use crate::helpers;

const ONE_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
    0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0xB0, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

// Runs in `ForegroundBlocking` mode (config/test.yaml), so by the time
// `ingest_photo` returns the `process_photo` job has already completed and
// the row carries its extracted metadata.
#[tokio::test]
#[serial]
async fn ingest_enqueues_process_photo_and_fills_metadata() {
    let boot = boot_test::<App>().await.unwrap();

    let result = ingest_photo(&boot.app_context, 1, 1, ONE_PIXEL_PNG, "image/png")
        .await
        .unwrap();
    assert_eq!(result.status, "accepted");

    let photo = photos::Entity::find_by_id(result.photo_id)
        .one(&boot.app_context.db)
        .await
        .unwrap()
        .unwrap();

    assert!(photo.processed);
    assert_eq!(photo.width, Some(1));
    assert_eq!(photo.height, Some(1));

    helpers::teardown(&boot.app_context.db).await;
}

#[tokio::test]
#[serial]
async fn duplicate_upload_is_not_reprocessed() {
    let boot = boot_test::<App>().await.unwrap();

    let first = ingest_photo(&boot.app_context, 2, 1, ONE_PIXEL_PNG, "image/png")
        .await
        .unwrap();
    let second = ingest_photo(&boot.app_context, 2, 1, ONE_PIXEL_PNG, "image/png")
        .await
        .unwrap();

    assert_eq!(first.photo_id, second.photo_id);
    assert_eq!(second.status, "duplicate");

    let args = photo_timeline::workers::process_photo::WorkerArgs { photo_id: second.photo_id };
    assert!(ProcessPhotoWorker::perform_later(&boot.app_context, args).await.is_ok());

    helpers::teardown(&boot.app_context.db).await;
}
