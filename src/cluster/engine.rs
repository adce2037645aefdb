//! Pure temporal clustering algorithm (component C5).
//!
//! Given a time-ordered sequence of photos, splits them into clusters
//! ("meetings") separated by a gap larger than `MEETING_GAP`. The function
//! does no I/O and is a total, deterministic, idempotent map from its input
//! to its output — see spec.md section 4.5 and the cluster purity property
//! in section 8.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A minimal view of a photo the engine needs. Callers build these from
/// `photos::Model` rows; the engine itself has no dependency on `sea_orm`.
#[derive(Debug, Clone)]
pub struct TimedPhoto {
    pub photo_id: Uuid,
    pub shot_at: DateTime<Utc>,
    pub gps: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub member_ids: Vec<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// GPS points in time order, for members that have them.
    pub track: Vec<(f64, f64)>,
    pub bbox: Option<BoundingBox>,
}

/// Splits a time-ordered photo sequence into clusters separated by gaps
/// larger than `gap`. Input does not need to be pre-sorted: this function
/// sorts by `(shot_at, photo_id)` itself, so ties break deterministically.
///
/// Photos with no `shot_at` must be filtered out by the caller before
/// calling this function (they are routed to the default meeting instead;
/// see spec.md invariant 2).
#[must_use]
pub fn cluster_photos(mut photos: Vec<TimedPhoto>, gap: chrono::Duration) -> Vec<Cluster> {
    if photos.is_empty() {
        return Vec::new();
    }

    photos.sort_by(|a, b| a.shot_at.cmp(&b.shot_at).then(a.photo_id.cmp(&b.photo_id)));

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut current = start_cluster(&photos[0]);

    for photo in &photos[1..] {
        let prev_end = current.end;
        if photo.shot_at - prev_end > gap {
            clusters.push(finish_cluster(current));
            current = start_cluster(photo);
        } else {
            extend_cluster(&mut current, photo);
        }
    }
    clusters.push(finish_cluster(current));

    clusters
}

fn start_cluster(photo: &TimedPhoto) -> Cluster {
    let mut cluster = Cluster {
        member_ids: vec![photo.photo_id],
        start: photo.shot_at,
        end: photo.shot_at,
        track: Vec::new(),
        bbox: None,
    };
    if let Some(point) = photo.gps {
        cluster.track.push(point);
    }
    cluster
}

fn extend_cluster(cluster: &mut Cluster, photo: &TimedPhoto) {
    cluster.member_ids.push(photo.photo_id);
    cluster.end = photo.shot_at;
    if let Some(point) = photo.gps {
        cluster.track.push(point);
    }
}

fn finish_cluster(mut cluster: Cluster) -> Cluster {
    cluster.bbox = bounding_box(&cluster.track);
    cluster
}

fn bounding_box(track: &[(f64, f64)]) -> Option<BoundingBox> {
    let mut iter = track.iter();
    let first = *iter.next()?;
    let mut bbox = BoundingBox {
        min_lat: first.0,
        min_lon: first.1,
        max_lat: first.0,
        max_lon: first.1,
    };
    for &(lat, lon) in iter {
        bbox.min_lat = bbox.min_lat.min(lat);
        bbox.min_lon = bbox.min_lon.min(lon);
        bbox.max_lat = bbox.max_lat.max(lat);
        bbox.max_lon = bbox.max_lon.max(lon);
    }
    Some(bbox)
}
