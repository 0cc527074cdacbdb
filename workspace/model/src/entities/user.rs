use super::{media, page, post, role, user_role};
use crate::activity::{LogOptions, Loggable};
use crate::password::{self, PasswordError};
use crate::settings::{non_empty, AppSettings};
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{QueryFilter, Select, Set};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use validator::{Validate, ValidationError};

use super::role::RoleSet;

/// Query-string of the generated placeholder avatar, after the name.
const PLACEHOLDER_AVATAR_COLORS: &str = "color=7F9CF5&background=EBF4FF";
const PLACEHOLDER_AVATAR_BASE: &str = "https://ui-avatars.com/api/";

/// Format of `last_login` in the localized summary.
pub const LAST_LOGIN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An authenticated user of the CMS.
///
/// `password` and `remember_token` never leave the process through serde.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Unique among users that are not soft-deleted.
    pub email: String,
    /// Argon2 PHC string. Only ever written through [`ActiveModel::set_password`].
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
    /// Path relative to the public storage disk.
    pub avatar: Option<String>,
    /// ISO locale code; see [`Model::resolved_language`].
    pub language: Option<String>,
    /// IANA timezone name; see [`Model::resolved_timezone`].
    pub timezone: Option<String>,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub last_login_at: Option<DateTimeUtc>,
    /// `None` until the email address has been verified.
    pub email_verified_at: Option<DateTimeUtc>,
    /// Free-form extension data.
    pub profile_data: Option<Json>,
    #[serde(skip_serializing)]
    pub remember_token: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Soft-delete marker. Set rows are hidden by [`UserScopes::without_trashed`].
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Pages created by the user.
    #[sea_orm(has_many = "super::page::Entity")]
    Page,
    /// Posts created by the user.
    #[sea_orm(has_many = "super::post::Entity")]
    Post,
    /// Files uploaded by the user.
    #[sea_orm(has_many = "super::media::Entity")]
    Media,
    /// Relation for the many-to-many relationship with roles.
    #[sea_orm(has_many = "super::user_role::Entity")]
    UserRole,
}

impl Related<page::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Page.def()
    }
}

impl Related<post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl Related<media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Media.def()
    }
}

impl Related<user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserRole.def()
    }
}

impl Related<role::Entity> for Entity {
    fn to() -> RelationDef {
        user_role::Relation::Role.def()
    }
    fn via() -> Option<RelationDef> {
        Some(user_role::Relation::User.def().rev())
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            is_active: Set(true),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

impl ActiveModel {
    /// Hashes `plain` and stores the hash. The plain text is not kept.
    pub fn set_password(&mut self, plain: &str) -> Result<(), PasswordError> {
        self.password = Set(password::hash_password(plain)?);
        Ok(())
    }
}

/// Composable filters over the `users` table.
pub trait UserScopes: Sized {
    /// Excludes soft-deleted users.
    fn without_trashed(self) -> Self;
    /// Keeps only soft-deleted users.
    fn only_trashed(self) -> Self;
    /// Keeps users whose `is_active` flag is set.
    fn active(self) -> Self;
    /// Keeps users holding the role with exactly this name.
    fn with_role(self, role: &str) -> Self;
}

impl UserScopes for Select<Entity> {
    fn without_trashed(self) -> Self {
        self.filter(Column::DeletedAt.is_null())
    }

    fn only_trashed(self) -> Self {
        self.filter(Column::DeletedAt.is_not_null())
    }

    fn active(self) -> Self {
        self.filter(Column::IsActive.eq(true))
    }

    fn with_role(self, role: &str) -> Self {
        self.inner_join(role::Entity)
            .filter(role::Column::Name.eq(role))
    }
}

impl Entity {
    /// Finds a user by id, ignoring soft-deleted rows.
    pub fn find_live_by_id(id: i32) -> Select<Entity> {
        Self::find_by_id(id).without_trashed()
    }

    /// Finds a user by email, ignoring soft-deleted rows.
    pub fn find_live_by_email(email: &str) -> Select<Entity> {
        Self::find().filter(Column::Email.eq(email)).without_trashed()
    }
}

/// External-facing projection of a user, localized for the current request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub language: String,
    pub avatar_url: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    /// `YYYY-MM-DD HH:MM:SS` in UTC; absent when the user never logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl Model {
    /// Display name. Currently the stored name verbatim.
    pub fn full_name(&self) -> &str {
        &self.name
    }

    /// The stored language, or the current locale when none is stored.
    pub fn resolved_language(&self, settings: &AppSettings) -> String {
        non_empty(self.language.as_deref())
            .unwrap_or_else(|| settings.locale())
            .to_string()
    }

    /// The stored timezone, or the configured default (`"UTC"` if unconfigured).
    pub fn resolved_timezone(&self, settings: &AppSettings) -> String {
        non_empty(self.timezone.as_deref())
            .unwrap_or_else(|| settings.timezone())
            .to_string()
    }

    pub fn prefers_arabic(&self, settings: &AppSettings) -> bool {
        self.resolved_language(settings) == "ar"
    }

    /// URL of the uploaded avatar, or of a generated placeholder built from the name.
    pub fn avatar_url(&self, settings: &AppSettings) -> String {
        match non_empty(self.avatar.as_deref()) {
            Some(path) => settings.storage_url(path),
            None => format!(
                "{}?name={}&{}",
                PLACEHOLDER_AVATAR_BASE,
                urlencoding::encode(&self.name),
                PLACEHOLDER_AVATAR_COLORS
            ),
        }
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn check_password(&self, plain: &str) -> Result<bool, PasswordError> {
        password::verify_password(plain, &self.password)
    }

    pub fn to_localized_summary(&self, roles: &RoleSet, settings: &AppSettings) -> LocalizedSummary {
        LocalizedSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            language: self.resolved_language(settings),
            avatar_url: self.avatar_url(settings),
            is_active: self.is_active,
            roles: roles.names(),
            last_login: self
                .last_login_at
                .map(|at| at.format(LAST_LOGIN_FORMAT).to_string()),
        }
    }

    /// Stamps `last_login_at` with the current time and persists it.
    pub async fn record_login<C: ConnectionTrait>(&mut self, db: &C) -> Result<(), DbErr> {
        let mut active: ActiveModel = self.clone().into();
        active.last_login_at = Set(Some(Utc::now()));
        *self = active.update(db).await?;
        Ok(())
    }

    /// Stamps `email_verified_at` unless it is already set.
    pub async fn mark_email_verified<C: ConnectionTrait>(&mut self, db: &C) -> Result<(), DbErr> {
        if self.is_email_verified() {
            return Ok(());
        }
        let mut active: ActiveModel = self.clone().into();
        active.email_verified_at = Set(Some(Utc::now()));
        *self = active.update(db).await?;
        Ok(())
    }

    /// Soft-deletes the user. Owned content is left untouched.
    pub async fn soft_delete<C: ConnectionTrait>(&mut self, db: &C) -> Result<(), DbErr> {
        let mut active: ActiveModel = self.clone().into();
        active.deleted_at = Set(Some(Utc::now()));
        *self = active.update(db).await?;
        Ok(())
    }

    /// Clears the soft-delete marker.
    pub async fn restore<C: ConnectionTrait>(&mut self, db: &C) -> Result<(), DbErr> {
        let mut active: ActiveModel = self.clone().into();
        active.deleted_at = Set(None);
        *self = active.update(db).await?;
        Ok(())
    }

    pub async fn roles<C: ConnectionTrait>(&self, db: &C) -> Result<RoleSet, DbErr> {
        let roles = self.find_related(role::Entity).all(db).await?;
        Ok(RoleSet::from(roles))
    }

    pub async fn pages<C: ConnectionTrait>(&self, db: &C) -> Result<Vec<page::Model>, DbErr> {
        self.find_related(page::Entity).all(db).await
    }

    pub async fn posts<C: ConnectionTrait>(&self, db: &C) -> Result<Vec<post::Model>, DbErr> {
        self.find_related(post::Entity).all(db).await
    }

    pub async fn media_uploads<C: ConnectionTrait>(&self, db: &C) -> Result<Vec<media::Model>, DbErr> {
        self.find_related(media::Entity).all(db).await
    }
}

impl Loggable for Model {
    fn log_options() -> LogOptions {
        LogOptions::defaults()
            .log_only(&["name", "email", "is_active"])
            .log_only_dirty()
            .dont_submit_empty_logs()
    }

    fn subject_type() -> &'static str {
        "users"
    }

    fn subject_id(&self) -> i32 {
        self.id
    }

    fn attribute_values(&self) -> Map<String, Json> {
        let mut values = Map::new();
        values.insert("name".to_string(), json!(self.name));
        values.insert("email".to_string(), json!(self.email));
        values.insert("phone".to_string(), json!(self.phone));
        values.insert("avatar".to_string(), json!(self.avatar));
        values.insert("language".to_string(), json!(self.language));
        values.insert("timezone".to_string(), json!(self.timezone));
        values.insert("is_active".to_string(), json!(self.is_active));
        values
    }
}

/// Everything needed to create a user. `password` is plain text and is
/// hashed by [`NewUser::into_active_model`].
#[derive(Clone, Debug, Default, Validate)]
pub struct NewUser {
    #[validate(
        length(min = 1, max = 255, message = "name must not be empty"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    /// Defaults to active when not given.
    pub is_active: Option<bool>,
    pub profile_data: Option<Json>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn into_active_model(self) -> Result<ActiveModel, PasswordError> {
        let mut active = ActiveModel {
            name: Set(self.name.trim().to_string()),
            email: Set(self.email.trim().to_string()),
            phone: Set(self.phone.and_then(optional)),
            avatar: Set(self.avatar.and_then(optional)),
            language: Set(self.language.and_then(optional)),
            timezone: Set(self.timezone.and_then(optional)),
            profile_data: Set(self.profile_data),
            ..Default::default()
        };
        if let Some(is_active) = self.is_active {
            active.is_active = Set(is_active);
        }
        active.set_password(&self.password)?;
        Ok(active)
    }
}

/// A partial update of a user. Absent fields are left untouched; an empty
/// string clears an optional text field.
#[derive(Clone, Debug, Default, Validate)]
pub struct UserChanges {
    #[validate(
        length(min = 1, max = 255, message = "name must not be empty"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
    pub profile_data: Option<Json>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.phone.is_none()
            && self.avatar.is_none()
            && self.language.is_none()
            && self.timezone.is_none()
            && self.is_active.is_none()
            && self.profile_data.is_none()
    }

    /// Writes the present fields into `active` and returns their names.
    pub fn apply_to(self, active: &mut ActiveModel) -> Result<Vec<&'static str>, PasswordError> {
        let mut touched = Vec::new();

        if let Some(name) = self.name {
            active.name = Set(name.trim().to_string());
            touched.push("name");
        }
        if let Some(email) = self.email {
            active.email = Set(email.trim().to_string());
            touched.push("email");
        }
        if let Some(plain) = self.password {
            active.set_password(&plain)?;
            touched.push("password");
        }
        if let Some(phone) = self.phone {
            active.phone = Set(optional(phone));
            touched.push("phone");
        }
        if let Some(avatar) = self.avatar {
            active.avatar = Set(optional(avatar));
            touched.push("avatar");
        }
        if let Some(language) = self.language {
            active.language = Set(optional(language));
            touched.push("language");
        }
        if let Some(timezone) = self.timezone {
            active.timezone = Set(optional(timezone));
            touched.push("timezone");
        }
        if let Some(is_active) = self.is_active {
            active.is_active = Set(is_active);
            touched.push("is_active");
        }
        if let Some(profile_data) = self.profile_data {
            active.profile_data = Set(Some(profile_data));
            touched.push("profile_data");
        }

        Ok(touched)
    }
}

/// Names are stored trimmed, so whitespace alone counts as empty.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("name must not be empty".into());
        return Err(error);
    }
    Ok(())
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
