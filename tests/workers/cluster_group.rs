use loco_rs::testing::prelude::*;
use photo_timeline::app::App;
use photo_timeline::ingest::ingest_photo;
use photo_timeline::models::meetings;
use photo_timeline::repository::{update_photo_metadata, MetadataUpdate};
use photo_timeline::workers::cluster_group::{ClusterGroupWorker, WorkerArgs};
use chrono::{TimeZone, Utc};
use loco_rs::bgworker::BackgroundWorker;
use serial_test::serial;
use uuid::Uuid;

use crate::helpers;

const ONE_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
    0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0xB0, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

// Exercises `ClusterGroupWorker` directly rather than through the debounce
// scheduler: with no `cluster:pending:<group_id>` key set, `tick` decides
// `Proceed` on the first call, so this runs reconciliation immediately.
#[tokio::test]
#[serial]
async fn cluster_worker_groups_timed_photos_into_a_meeting() {
    let boot = boot_test::<App>().await.unwrap();
    let group_id = 42;

    let p1 = ingest_photo(&boot.app_context, group_id, 1, ONE_PIXEL_PNG, "image/png")
        .await
        .unwrap();
    let p2 = ingest_photo(&boot.app_context, group_id, 1, &[ONE_PIXEL_PNG, b"x".as_slice()].concat(), "image/png")
        .await
        .unwrap();

    let base = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
    update_photo_metadata(
        &boot.app_context.db,
        p1.photo_id,
        MetadataUpdate {
            shot_at: Some(base),
            gps: None,
            width: Some(1),
            height: Some(1),
            thumb_path: None,
            processing_error: None,
        },
    )
    .await
    .unwrap();
    update_photo_metadata(
        &boot.app_context.db,
        p2.photo_id,
        MetadataUpdate {
            shot_at: Some(base + chrono::Duration::minutes(10)),
            gps: None,
            width: Some(1),
            height: Some(1),
            thumb_path: None,
            processing_error: None,
        },
    )
    .await
    .unwrap();

    ClusterGroupWorker::perform_later(
        &boot.app_context,
        WorkerArgs { group_id, job_id: Uuid::new_v4(), attempt: 0 },
    )
    .await
    .unwrap();

    let non_default = meetings::Entity::list_non_default(&boot.app_context.db, group_id)
        .await
        .unwrap();
    assert_eq!(non_default.len(), 1);
    assert_eq!(non_default[0].photo_count, 2);

    helpers::teardown(&boot.app_context.db).await;
}
