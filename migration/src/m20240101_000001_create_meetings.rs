use sea_orm::EnumIter;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, EnumIter)]
pub enum Meetings {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    GroupId,
    Title,
    StartTime,
    EndTime,
    MeetingDate,
    PhotoCount,
    Track,
    BboxMinLat,
    BboxMinLon,
    BboxMaxLat,
    BboxMaxLon,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Meetings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Meetings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Meetings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Meetings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Meetings::GroupId).integer().not_null())
                    .col(ColumnDef::new(Meetings::Title).string().not_null())
                    .col(
                        ColumnDef::new(Meetings::StartTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Meetings::EndTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Meetings::MeetingDate).date().null())
                    .col(
                        ColumnDef::new(Meetings::PhotoCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Meetings::Track).json_binary().null())
                    .col(ColumnDef::new(Meetings::BboxMinLat).double().null())
                    .col(ColumnDef::new(Meetings::BboxMinLon).double().null())
                    .col(ColumnDef::new(Meetings::BboxMaxLat).double().null())
                    .col(ColumnDef::new(Meetings::BboxMaxLon).double().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meetings_group_id")
                    .table(Meetings::Table)
                    .col(Meetings::GroupId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meetings_group_start_time")
                    .table(Meetings::Table)
                    .col(Meetings::GroupId)
                    .col(Meetings::StartTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meetings::Table).to_owned())
            .await
    }
}
