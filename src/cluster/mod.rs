pub mod engine;

pub use engine::{cluster_photos, BoundingBox, Cluster, TimedPhoto};

use chrono::{DateTime, Timelike, Utc};

/// Human-readable title for an auto-generated meeting, e.g.
/// `"2024-06-10 Afternoon"`. Not localized (see SPEC_FULL.md section 12).
#[must_use]
pub fn auto_title(start: DateTime<Utc>) -> String {
    format!("{} {}", start.format("%Y-%m-%d"), part_of_day(start.hour()))
}

fn part_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Morning",
        12..=16 => "Afternoon",
        17..=20 => "Evening",
        _ => "Night",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_date_and_part_of_day() {
        let t = Utc.with_ymd_and_hms(2024, 6, 10, 14, 30, 0).unwrap();
        assert_eq!(auto_title(t), "2024-06-10 Afternoon");
    }

    #[test]
    fn night_wraps_past_midnight() {
        let t = Utc.with_ymd_and_hms(2024, 6, 10, 2, 0, 0).unwrap();
        assert_eq!(auto_title(t), "2024-06-10 Night");
    }
}
