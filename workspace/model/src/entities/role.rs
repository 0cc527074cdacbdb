use super::{user, user_role};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::Serialize;
use std::collections::BTreeSet;

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const CONTENT_MANAGER: &str = "content_manager";
pub const EDITOR: &str = "editor";

/// Roles allowed into the administration area.
pub const ADMIN_ROLES: [&str; 2] = [SUPER_ADMIN, ADMIN];
/// Roles allowed to create and edit pages, posts and media.
pub const CONTENT_ROLES: [&str; 4] = [SUPER_ADMIN, ADMIN, CONTENT_MANAGER, EDITOR];
/// Roles seeded into a fresh database.
pub const BUILT_IN_ROLES: [&str; 4] = CONTENT_ROLES;

/// A named permission group that can be assigned to users.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_role::Entity")]
    UserRole,
}

impl Related<user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserRole.def()
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        user_role::Relation::User.def()
    }
    fn via() -> Option<RelationDef> {
        Some(user_role::Relation::Role.def().rev())
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

/// The set of role names held by one user, ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_role(name))
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN)
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&ADMIN_ROLES)
    }

    pub fn can_manage_content(&self) -> bool {
        self.has_any_role(&CONTENT_ROLES)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<Model>> for RoleSet {
    fn from(roles: Vec<Model>) -> Self {
        roles.into_iter().map(|role| role.name).collect()
    }
}
