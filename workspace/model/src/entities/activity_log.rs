use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::Serialize;

/// One append-only entry of the activity log.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub log_name: String,
    /// The lifecycle event, e.g. "updated".
    pub description: String,
    pub subject_type: String,
    pub subject_id: i32,
    /// The user who caused the change, when known.
    pub causer_id: Option<i32>,
    /// `{"attributes": {...}, "old": {...}}`
    pub properties: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(Utc::now());
        }
        Ok(self)
    }
}
