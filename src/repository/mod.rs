//! `PhotoRepository` (component C4): transactional persistence of `Photo`
//! and `Meeting` rows. See spec.md section 4.4.

pub mod lock;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::cluster::engine::Cluster;
use crate::cluster::{auto_title, cluster_photos, TimedPhoto};
use crate::errors::CoreError;
use crate::models::{meetings, photos};
use lock::acquire_group_lock;

pub struct NewPhoto {
    pub group_id: i32,
    pub uploader_id: i32,
    pub content_hash: String,
    pub original_path: String,
    pub mime: String,
    pub bytes: i64,
}

/// Inserts a photo row unless `(group_id, content_hash)` already exists
/// (invariant 6). Returns the row and whether it was newly inserted.
///
/// # Errors
/// Returns `CoreError::Database` on any failure other than the expected
/// unique-constraint race, which is resolved by re-reading the row.
pub async fn insert_photo_if_absent(
    db: &DatabaseConnection,
    new: NewPhoto,
) -> Result<(photos::Model, bool), CoreError> {
    if let Some(existing) =
        photos::Entity::find_by_group_and_hash(db, new.group_id, &new.content_hash)
            .await
            .map_err(CoreError::Database)?
    {
        return Ok((existing, false));
    }

    let active = photos::ActiveModel {
        id: Set(Uuid::new_v4()),
        group_id: Set(new.group_id),
        uploader_id: Set(new.uploader_id),
        content_hash: Set(new.content_hash.clone()),
        original_path: Set(new.original_path),
        mime: Set(new.mime),
        bytes: Set(new.bytes),
        processed: Set(false),
        ..Default::default()
    };

    match active.insert(db).await {
        Ok(model) => Ok((model, true)),
        Err(e) => {
            // Another request may have won the (group_id, content_hash)
            // unique-index race between the lookup above and this insert.
            match photos::Entity::find_by_group_and_hash(db, new.group_id, &new.content_hash)
                .await
                .map_err(CoreError::Database)?
            {
                Some(existing) => Ok((existing, false)),
                None => Err(CoreError::Database(e)),
            }
        }
    }
}

pub struct MetadataUpdate {
    pub shot_at: Option<DateTime<Utc>>,
    pub gps: Option<(f64, f64)>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumb_path: Option<String>,
    pub processing_error: Option<String>,
}

/// Fills in extracted metadata and marks the photo processed (spec.md 4.4,
/// 4.7 step 4).
///
/// # Errors
/// Returns `CoreError::Validation` if the photo doesn't exist, otherwise
/// `CoreError::Database`.
pub async fn update_photo_metadata(
    db: &DatabaseConnection,
    photo_id: Uuid,
    update: MetadataUpdate,
) -> Result<(), CoreError> {
    let photo = photos::Entity::find_by_id(photo_id)
        .one(db)
        .await
        .map_err(CoreError::Database)?
        .ok_or_else(|| CoreError::Validation(format!("photo {photo_id} not found")))?;

    let mut active: photos::ActiveModel = photo.into();
    active.shot_at = Set(update.shot_at.map(Into::into));
    active.gps_lat = Set(update.gps.map(|(lat, _)| lat));
    active.gps_lon = Set(update.gps.map(|(_, lon)| lon));
    active.width = Set(update.width.map(|w| w as i32));
    active.height = Set(update.height.map(|h| h as i32));
    if let Some(thumb_path) = update.thumb_path {
        active.thumb_path = Set(Some(thumb_path));
    }
    active.processed = Set(true);
    active.processing_error = Set(update.processing_error);
    active.update(db).await.map_err(CoreError::Database)?;
    Ok(())
}

/// # Errors
/// Returns `CoreError::Database` if the query fails.
pub async fn list_group_photos_ordered(
    db: &DatabaseConnection,
    group_id: i32,
) -> Result<Vec<photos::Model>, CoreError> {
    photos::Entity::list_group_ordered(db, group_id)
        .await
        .map_err(CoreError::Database)
}

/// Idempotently ensures the group's default meeting row exists, without
/// touching membership. Used by callers that need a `meeting_id` to hand
/// out before any reconciliation has run; the cluster worker's own default-
/// meeting handling (inside `reconcile_meetings`) stays the source of truth
/// for membership and `photo_count`.
///
/// # Errors
/// Returns `CoreError::Database` if the query or insert fails.
pub async fn ensure_default_meeting(
    db: &DatabaseConnection,
    group_id: i32,
) -> Result<Uuid, CoreError> {
    if let Some(meeting) = meetings::Entity::find_default(db, group_id)
        .await
        .map_err(CoreError::Database)?
    {
        return Ok(meeting.id);
    }

    let id = Uuid::new_v4();
    let active = meetings::ActiveModel {
        id: Set(id),
        group_id: Set(group_id),
        title: Set(meetings::DEFAULT_MEETING_TITLE.to_string()),
        photo_count: Set(0),
        ..Default::default()
    };
    active.insert(db).await.map_err(CoreError::Database)?;
    Ok(id)
}

/// Runs the full C8 reconciliation for one group: acquires the group's
/// advisory lock, fetches a consistent snapshot, re-clusters, diffs against
/// the current meetings, and commits. The lock must be held across the
/// fetch (spec.md 4.8 steps 1-2), so the whole pipeline lives inside this
/// one transaction rather than accepting a pre-computed assignment from a
/// caller that fetched outside the lock.
///
/// # Errors
/// Returns `CoreError::Database` on any failure; the transaction is rolled
/// back and the lock released, leaving `cluster:job:<group_id>`'s TTL as
/// the recovery path (spec.md 4.6, "On any failure").
pub async fn reconcile_meetings(
    db: &DatabaseConnection,
    group_id: i32,
    gap: chrono::Duration,
) -> Result<(), CoreError> {
    let txn = db.begin().await.map_err(CoreError::Database)?;
    let _lock = acquire_group_lock(&txn, group_id).await?;

    let all_photos = photos::Entity::list_group_ordered(&txn, group_id)
        .await
        .map_err(CoreError::Database)?;

    let mut current_members: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for photo in &all_photos {
        if let Some(meeting_id) = photo.meeting_id {
            current_members.entry(meeting_id).or_default().insert(photo.id);
        }
    }

    let (timed, untimed): (Vec<_>, Vec<_>) =
        all_photos.into_iter().partition(|p| p.shot_at.is_some());

    let timed_photos: Vec<TimedPhoto> = timed
        .iter()
        .map(|p| TimedPhoto {
            photo_id: p.id,
            shot_at: p.shot_at.expect("partitioned on is_some").with_timezone(&Utc),
            gps: p.gps_lat.zip(p.gps_lon),
        })
        .collect();

    let desired = cluster_photos(timed_photos, gap);
    let current = meetings::Entity::list_non_default(&txn, group_id)
        .await
        .map_err(CoreError::Database)?;

    apply_meeting_diff(&txn, group_id, &desired, current, &current_members).await?;
    ensure_default_meeting_membership(&txn, group_id, &untimed).await?;

    txn.commit().await.map_err(CoreError::Database)?;
    info!(
        "reconciled group {}: {} meetings, {} unrouted photos",
        group_id,
        desired.len(),
        untimed.len()
    );
    Ok(())
}

/// Matches each desired cluster to the current meeting with the highest
/// Jaccard overlap of member ids, reusing `meeting_id` when the overlap is
/// at least 50% (spec.md 4.8 step 6; SPEC_FULL.md section 12 resolves the
/// tie to Jaccard overlap rather than the source's ambiguous phrasing).
/// Unmatched current meetings are deleted; unmatched desired clusters get a
/// freshly generated id.
async fn apply_meeting_diff(
    txn: &DatabaseTransaction,
    group_id: i32,
    desired: &[Cluster],
    current: Vec<meetings::Model>,
    current_members: &HashMap<Uuid, HashSet<Uuid>>,
) -> Result<(), CoreError> {
    let mut used = vec![false; current.len()];
    let mut matched_index: Vec<Option<usize>> = vec![None; desired.len()];

    for (i, cluster) in desired.iter().enumerate() {
        let desired_set: HashSet<Uuid> = cluster.member_ids.iter().copied().collect();
        let mut best: Option<(usize, f64)> = None;

        for (j, meeting) in current.iter().enumerate() {
            if used[j] {
                continue;
            }
            let current_set = current_members.get(&meeting.id);
            let Some(current_set) = current_set else { continue };

            let intersection = desired_set.intersection(current_set).count();
            let union = desired_set.union(current_set).count();
            if union == 0 {
                continue;
            }
            let ratio = f64::from(intersection as u32) / f64::from(union as u32);
            if ratio >= 0.5 && best.map_or(true, |(_, b)| ratio > b) {
                best = Some((j, ratio));
            }
        }

        if let Some((j, _)) = best {
            used[j] = true;
            matched_index[i] = Some(j);
        }
    }

    for (j, meeting) in current.iter().enumerate() {
        if !used[j] {
            meetings::Entity::delete_by_id(meeting.id)
                .exec(txn)
                .await
                .map_err(CoreError::Database)?;
        }
    }

    for (i, cluster) in desired.iter().enumerate() {
        let meeting_id = matched_index[i].map_or_else(Uuid::new_v4, |j| current[j].id);
        upsert_meeting(txn, group_id, meeting_id, cluster).await?;

        photos::Entity::update_many()
            .col_expr(photos::Column::MeetingId, Expr::value(meeting_id))
            .filter(photos::Column::Id.is_in(cluster.member_ids.clone()))
            .exec(txn)
            .await
            .map_err(CoreError::Database)?;
    }

    Ok(())
}

async fn upsert_meeting(
    txn: &DatabaseTransaction,
    group_id: i32,
    meeting_id: Uuid,
    cluster: &Cluster,
) -> Result<(), CoreError> {
    let (min_lat, min_lon, max_lat, max_lon) = cluster
        .bbox
        .as_ref()
        .map_or((None, None, None, None), |b| {
            (Some(b.min_lat), Some(b.min_lon), Some(b.max_lat), Some(b.max_lon))
        });

    let track = serde_json::to_value(&cluster.track).map_err(|e| CoreError::Transient(e.to_string()))?;

    let active = meetings::ActiveModel {
        id: Set(meeting_id),
        group_id: Set(group_id),
        title: Set(auto_title(cluster.start)),
        start_time: Set(Some(cluster.start.into())),
        end_time: Set(Some(cluster.end.into())),
        meeting_date: Set(Some(cluster.start.date_naive())),
        photo_count: Set(cluster.member_ids.len() as i32),
        track: Set(Some(track)),
        bbox_min_lat: Set(min_lat),
        bbox_min_lon: Set(min_lon),
        bbox_max_lat: Set(max_lat),
        bbox_max_lon: Set(max_lon),
        ..Default::default()
    };

    meetings::Entity::insert(active)
        .on_conflict(
            OnConflict::column(meetings::Column::Id)
                .update_columns([
                    meetings::Column::Title,
                    meetings::Column::StartTime,
                    meetings::Column::EndTime,
                    meetings::Column::MeetingDate,
                    meetings::Column::PhotoCount,
                    meetings::Column::Track,
                    meetings::Column::BboxMinLat,
                    meetings::Column::BboxMinLon,
                    meetings::Column::BboxMaxLat,
                    meetings::Column::BboxMaxLon,
                ])
                .to_owned(),
        )
        .exec(txn)
        .await
        .map_err(CoreError::Database)?;
    Ok(())
}

/// Ensures the default meeting exists iff `untimed` is non-empty (spec.md
/// 4.8 step 7), deleting it when it would otherwise be left empty
/// (invariant: "an empty meeting must be deleted in the same transaction
/// that empties it").
async fn ensure_default_meeting_membership(
    txn: &DatabaseTransaction,
    group_id: i32,
    untimed: &[photos::Model],
) -> Result<(), CoreError> {
    let existing = meetings::Entity::find_default(txn, group_id)
        .await
        .map_err(CoreError::Database)?;

    if untimed.is_empty() {
        if let Some(meeting) = existing {
            meetings::Entity::delete_by_id(meeting.id)
                .exec(txn)
                .await
                .map_err(CoreError::Database)?;
        }
        return Ok(());
    }

    let meeting_id = existing.map_or_else(Uuid::new_v4, |m| m.id);
    let active = meetings::ActiveModel {
        id: Set(meeting_id),
        group_id: Set(group_id),
        title: Set(meetings::DEFAULT_MEETING_TITLE.to_string()),
        start_time: Set(None),
        end_time: Set(None),
        meeting_date: Set(None),
        photo_count: Set(untimed.len() as i32),
        track: Set(None),
        bbox_min_lat: Set(None),
        bbox_min_lon: Set(None),
        bbox_max_lat: Set(None),
        bbox_max_lon: Set(None),
        ..Default::default()
    };

    meetings::Entity::insert(active)
        .on_conflict(
            OnConflict::column(meetings::Column::Id)
                .update_columns([meetings::Column::PhotoCount])
                .to_owned(),
        )
        .exec(txn)
        .await
        .map_err(CoreError::Database)?;

    photos::Entity::update_many()
        .col_expr(photos::Column::MeetingId, Expr::value(meeting_id))
        .filter(photos::Column::Id.is_in(untimed.iter().map(|p| p.id).collect::<Vec<_>>()))
        .exec(txn)
        .await
        .map_err(CoreError::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use migration::Migrator;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    async fn memory_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn insert_photo_if_absent_is_idempotent_by_hash() {
        let db = memory_db().await;
        let new = || NewPhoto {
            group_id: 1,
            uploader_id: 1,
            content_hash: "abc123".to_string(),
            original_path: "original/ab/c1/abc123.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: 10,
        };

        let (first, inserted_first) = insert_photo_if_absent(&db, new()).await.unwrap();
        let (second, inserted_second) = insert_photo_if_absent(&db, new()).await.unwrap();

        assert!(inserted_first);
        assert!(!inserted_second);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn reconcile_meetings_clusters_and_routes_default() {
        let db = memory_db().await;
        let gap = chrono::Duration::hours(4);

        let with_time = |offset_minutes: i64| NewPhoto {
            group_id: 9,
            uploader_id: 1,
            content_hash: format!("hash-{offset_minutes}"),
            original_path: "p".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: 1,
        };

        let (p1, _) = insert_photo_if_absent(&db, with_time(0)).await.unwrap();
        let (p2, _) = insert_photo_if_absent(&db, with_time(30)).await.unwrap();
        let (p3, _) = insert_photo_if_absent(&db, NewPhoto {
            group_id: 9,
            uploader_id: 1,
            content_hash: "no-time".to_string(),
            original_path: "p".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: 1,
        }).await.unwrap();

        let base = chrono::Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap();
        update_photo_metadata(&db, p1.id, MetadataUpdate {
            shot_at: Some(base),
            gps: None,
            width: Some(100),
            height: Some(100),
            thumb_path: None,
            processing_error: None,
        }).await.unwrap();
        update_photo_metadata(&db, p2.id, MetadataUpdate {
            shot_at: Some(base + chrono::Duration::minutes(30)),
            gps: None,
            width: Some(100),
            height: Some(100),
            thumb_path: None,
            processing_error: None,
        }).await.unwrap();
        update_photo_metadata(&db, p3.id, MetadataUpdate {
            shot_at: None,
            gps: None,
            width: None,
            height: None,
            thumb_path: None,
            processing_error: None,
        }).await.unwrap();

        reconcile_meetings(&db, 9, gap).await.unwrap();

        let non_default = meetings::Entity::list_non_default(&db, 9).await.unwrap();
        assert_eq!(non_default.len(), 1);
        assert_eq!(non_default[0].photo_count, 2);

        let default = meetings::Entity::find_default(&db, 9).await.unwrap().unwrap();
        assert_eq!(default.photo_count, 1);
    }
}
