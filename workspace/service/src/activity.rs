use async_trait::async_trait;
use model::activity::{ActivityEvent, ChangeSet, Loggable};
use model::entities::activity_log;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, instrument, trace};

use crate::error::Result;

/// An activity entry built from a [`Loggable`] subject, not yet stored.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingActivity {
    pub log_name: &'static str,
    pub event: ActivityEvent,
    pub subject_type: &'static str,
    pub subject_id: i32,
    pub causer_id: Option<i32>,
    pub changes: ChangeSet,
    /// False when the subject asked not to log empty change sets and this one is empty.
    pub submit: bool,
}

impl PendingActivity {
    fn build<T: Loggable>(subject: &T, event: ActivityEvent, changes: ChangeSet, causer_id: Option<i32>) -> Self {
        Self {
            log_name: T::log_options().log_name,
            event,
            subject_type: T::subject_type(),
            subject_id: subject.subject_id(),
            causer_id,
            submit: changes.should_submit::<T>(),
            changes,
        }
    }

    pub fn created<T: Loggable>(subject: &T, causer_id: Option<i32>) -> Self {
        Self::build(subject, ActivityEvent::Created, ChangeSet::snapshot(subject), causer_id)
    }

    pub fn updated<T: Loggable>(before: &T, after: &T, causer_id: Option<i32>) -> Self {
        Self::build(after, ActivityEvent::Updated, ChangeSet::between(before, after), causer_id)
    }

    pub fn deleted<T: Loggable>(subject: &T, causer_id: Option<i32>) -> Self {
        Self::build(subject, ActivityEvent::Deleted, ChangeSet::snapshot(subject), causer_id)
    }

    pub fn restored<T: Loggable>(subject: &T, causer_id: Option<i32>) -> Self {
        Self::build(subject, ActivityEvent::Restored, ChangeSet::snapshot(subject), causer_id)
    }
}

/// Append-only log of field-level changes.
#[async_trait]
pub trait ActivityLogService: Send + Sync {
    /// Stores the entry inside `txn`, or returns `None` when it is empty and must not be submitted.
    /// The entry becomes visible only once the caller commits, together with the change it describes.
    async fn record(&self, txn: &DatabaseTransaction, activity: PendingActivity) -> Result<Option<activity_log::Model>>;

    /// Entries about one subject, newest first.
    async fn for_subject(&self, subject_type: &str, subject_id: i32) -> Result<Vec<activity_log::Model>>;
}

/// [`ActivityLogService`] writing to the `activity_log` table.
#[derive(Clone, Debug)]
pub struct DbActivityLog {
    db: DatabaseConnection,
}

impl DbActivityLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityLogService for DbActivityLog {
    #[instrument(skip(self, txn, activity), fields(subject_type = activity.subject_type, subject_id = activity.subject_id, event = activity.event.as_str()))]
    async fn record(&self, txn: &DatabaseTransaction, activity: PendingActivity) -> Result<Option<activity_log::Model>> {
        if !activity.submit {
            trace!("Skipping empty activity entry");
            return Ok(None);
        }

        let entry = activity_log::ActiveModel {
            log_name: Set(activity.log_name.to_string()),
            description: Set(activity.event.as_str().to_string()),
            subject_type: Set(activity.subject_type.to_string()),
            subject_id: Set(activity.subject_id),
            causer_id: Set(activity.causer_id),
            properties: Set(activity.changes.into_properties()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        debug!("Recorded activity entry {}", entry.id);
        Ok(Some(entry))
    }

    #[instrument(skip(self))]
    async fn for_subject(&self, subject_type: &str, subject_id: i32) -> Result<Vec<activity_log::Model>> {
        let entries = activity_log::Entity::find()
            .filter(activity_log::Column::SubjectType.eq(subject_type))
            .filter(activity_log::Column::SubjectId.eq(subject_id))
            .order_by_desc(activity_log::Column::Id)
            .all(&self.db)
            .await?;
        Ok(entries)
    }
}
