use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_meetings::Meetings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
enum Photos {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    GroupId,
    UploaderId,
    ContentHash,
    OriginalPath,
    ThumbPath,
    Mime,
    Bytes,
    Width,
    Height,
    ShotAt,
    GpsLat,
    GpsLon,
    MeetingId,
    Processed,
    ProcessingError,
    UploadedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Photos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Photos::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Photos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Photos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Photos::GroupId).integer().not_null())
                    .col(ColumnDef::new(Photos::UploaderId).integer().not_null())
                    .col(ColumnDef::new(Photos::ContentHash).string().not_null())
                    .col(ColumnDef::new(Photos::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Photos::ThumbPath).string().null())
                    .col(ColumnDef::new(Photos::Mime).string().not_null())
                    .col(ColumnDef::new(Photos::Bytes).big_integer().not_null())
                    .col(ColumnDef::new(Photos::Width).integer().null())
                    .col(ColumnDef::new(Photos::Height).integer().null())
                    .col(
                        ColumnDef::new(Photos::ShotAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Photos::GpsLat).double().null())
                    .col(ColumnDef::new(Photos::GpsLon).double().null())
                    .col(ColumnDef::new(Photos::MeetingId).uuid().null())
                    .col(
                        ColumnDef::new(Photos::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Photos::ProcessingError).text().null())
                    .col(
                        ColumnDef::new(Photos::UploadedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_photos_meeting_id")
                            .from(Photos::Table, Photos::MeetingId)
                            .to(Meetings::Table, Meetings::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_photos_group_content_hash")
                    .table(Photos::Table)
                    .col(Photos::GroupId)
                    .col(Photos::ContentHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_photos_group_shot_at_id")
                    .table(Photos::Table)
                    .col(Photos::GroupId)
                    .col(Photos::ShotAt)
                    .col(Photos::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_photos_meeting_id")
                    .table(Photos::Table)
                    .col(Photos::MeetingId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Photos::Table).to_owned())
            .await
    }
}
