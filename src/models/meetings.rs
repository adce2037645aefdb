pub use super::_entities::meetings::{ActiveModel, Column, Entity, Model};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;

pub type Meetings = Entity;

/// Sentinel title for the per-group catch-all meeting (invariant 2). No
/// other meeting may carry this title.
pub const DEFAULT_MEETING_TITLE: &str = "Default Meeting";

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
impl Model {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.title == DEFAULT_MEETING_TITLE
    }
}

// implement your write-oriented logic here
impl ActiveModel {}

// implement your custom finders, selectors oriented logic here
impl Entity {
    /// # Errors
    /// Returns `DbErr` if the query fails.
    pub async fn find_default<C>(db: &C, group_id: i32) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::Title.eq(DEFAULT_MEETING_TITLE))
            .one(db)
            .await
    }

    /// All non-default meetings for a group, ordered by `start_time`.
    ///
    /// # Errors
    /// Returns `DbErr` if the query fails.
    pub async fn list_non_default<C>(db: &C, group_id: i32) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::Title.ne(DEFAULT_MEETING_TITLE))
            .order_by_asc(Column::StartTime)
            .all(db)
            .await
    }
}
