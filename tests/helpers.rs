use loco_rs::db::truncate_table;
use photo_timeline::models::{meetings, photos};
use sea_orm::DatabaseConnection;

pub async fn teardown(db: &DatabaseConnection) {
    truncate_table(db, photos::Entity).await.expect("truncate photos");
    truncate_table(db, meetings::Entity).await.expect("truncate meetings");
}
