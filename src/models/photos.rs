pub use super::_entities::photos::{ActiveModel, Column, Entity, Model};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;

pub type Photos = Entity;

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert && self.updated_at.is_unchanged() {
            let mut this = self;
            this.updated_at = Set(chrono::Utc::now().into());
            Ok(this)
        } else {
            Ok(self)
        }
    }
}

// implement your read-oriented logic here
impl Model {}

// implement your write-oriented logic here
impl ActiveModel {}

// implement your custom finders, selectors oriented logic here
impl Entity {
    /// Photos of a group in cluster order: `(shot_at asc nulls last, id asc)`.
    ///
    /// # Errors
    /// Returns `DbErr` if the query fails.
    pub async fn list_group_ordered<C>(db: &C, group_id: i32) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        // sea-orm has no portable "nulls last" ordering helper, so split the
        // query: timestamped photos first (sorted), then null-`shot_at`
        // photos appended afterwards, preserving the overall contract.
        let mut timestamped = Self::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::ShotAt.is_not_null())
            .order_by_asc(Column::ShotAt)
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        let untimed = Self::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::ShotAt.is_null())
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        timestamped.extend(untimed);
        Ok(timestamped)
    }

    /// # Errors
    /// Returns `DbErr` if the query fails.
    pub async fn find_by_group_and_hash<C>(
        db: &C,
        group_id: i32,
        content_hash: &str,
    ) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::ContentHash.eq(content_hash))
            .one(db)
            .await
    }
}
