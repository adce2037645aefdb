#![allow(elided_lifetimes_in_paths)]
#![allow(clippy::wildcard_imports)]
pub use sea_orm_migration::prelude::*;
mod m20240101_000001_create_meetings;
mod m20240101_000002_create_photos;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_meetings::Migration),
            Box::new(m20240101_000002_create_photos::Migration),
            // inject-above (do not remove this comment)
        ]
    }
}
