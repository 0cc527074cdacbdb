use super::user;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::Serialize;

/// An uploaded file on the public storage disk.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub file_name: String,
    /// Path relative to the public storage root.
    pub path: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    pub alt_text: Option<String>,
    /// The user who uploaded the file.
    pub uploaded_by: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploadedBy",
        to = "super::user::Column::Id"
    )]
    Uploader,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

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
