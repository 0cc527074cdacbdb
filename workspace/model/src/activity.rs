//! Change-tracking contract between an entity and the activity log.
//!
//! An entity implements [`Loggable`] to describe which of its attributes are
//! recorded and how; [`ChangeSet`] turns one or two snapshots of the entity
//! into the `attributes`/`old` payload stored by the activity log.

use serde_json::{Map, Value};

/// Name of the log stream entries are written to unless told otherwise.
pub const DEFAULT_LOG_NAME: &str = "default";

/// What to record for an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogOptions {
    /// Attributes to record. Empty means every attribute the entity exposes.
    pub log_only: Vec<&'static str>,
    /// Record only attributes whose value changed.
    pub log_only_dirty: bool,
    /// Write an entry even when nothing was recorded.
    pub submit_empty_logs: bool,
    pub log_name: &'static str,
}

impl LogOptions {
    pub fn defaults() -> Self {
        Self {
            log_only: Vec::new(),
            log_only_dirty: false,
            submit_empty_logs: true,
            log_name: DEFAULT_LOG_NAME,
        }
    }

    pub fn log_only(mut self, attributes: &[&'static str]) -> Self {
        self.log_only = attributes.to_vec();
        self
    }

    pub fn log_only_dirty(mut self) -> Self {
        self.log_only_dirty = true;
        self
    }

    pub fn dont_submit_empty_logs(mut self) -> Self {
        self.submit_empty_logs = false;
        self
    }

    fn keeps(&self, attribute: &str) -> bool {
        self.log_only.is_empty() || self.log_only.contains(&attribute)
    }
}

/// Lifecycle events that produce activity entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityEvent {
    Created,
    Updated,
    Deleted,
    Restored,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::Created => "created",
            ActivityEvent::Updated => "updated",
            ActivityEvent::Deleted => "deleted",
            ActivityEvent::Restored => "restored",
        }
    }
}

/// An entity whose changes are written to the activity log.
pub trait Loggable {
    fn log_options() -> LogOptions;

    /// Stable name of the entity kind, stored next to its id.
    fn subject_type() -> &'static str;

    fn subject_id(&self) -> i32;

    /// Every attribute that may appear in a log entry. Secrets must not be returned.
    fn attribute_values(&self) -> Map<String, Value>;
}

/// Recorded attribute values of one activity entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub attributes: Map<String, Value>,
    pub old: Map<String, Value>,
}

impl ChangeSet {
    /// The recorded attributes of a single state, used for create/delete/restore.
    pub fn snapshot<T: Loggable>(subject: &T) -> Self {
        let options = T::log_options();
        Self {
            attributes: filtered(subject.attribute_values(), &options),
            old: Map::new(),
        }
    }

    /// The before/after diff of an update.
    pub fn between<T: Loggable>(before: &T, after: &T) -> Self {
        let options = T::log_options();
        let mut old = filtered(before.attribute_values(), &options);
        let mut attributes = filtered(after.attribute_values(), &options);

        if options.log_only_dirty {
            let unchanged: Vec<String> = attributes
                .iter()
                .filter(|(key, value)| old.get(key.as_str()) == Some(*value))
                .map(|(key, _)| key.clone())
                .collect();
            for key in unchanged {
                attributes.remove(&key);
                old.remove(&key);
            }
        }

        Self { attributes, old }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.old.is_empty()
    }

    /// Whether an entry should be written for this change set.
    pub fn should_submit<T: Loggable>(&self) -> bool {
        !self.is_empty() || T::log_options().submit_empty_logs
    }

    /// JSON payload stored in the `properties` column.
    pub fn into_properties(self) -> Value {
        let mut properties = Map::new();
        properties.insert("attributes".to_string(), Value::Object(self.attributes));
        if !self.old.is_empty() {
            properties.insert("old".to_string(), Value::Object(self.old));
        }
        Value::Object(properties)
    }
}

fn filtered(values: Map<String, Value>, options: &LogOptions) -> Map<String, Value> {
    values
        .into_iter()
        .filter(|(key, _)| options.keeps(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Article {
        id: i32,
        title: String,
        body: String,
        views: i64,
    }

    impl Loggable for Article {
        fn log_options() -> LogOptions {
            LogOptions::defaults()
                .log_only(&["title", "body"])
                .log_only_dirty()
                .dont_submit_empty_logs()
        }

        fn subject_type() -> &'static str {
            "articles"
        }

        fn subject_id(&self) -> i32 {
            self.id
        }

        fn attribute_values(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("title".into(), json!(self.title));
            map.insert("body".into(), json!(self.body));
            map.insert("views".into(), json!(self.views));
            map
        }
    }

    fn article(title: &str, body: &str, views: i64) -> Article {
        Article {
            id: 7,
            title: title.to_string(),
            body: body.to_string(),
            views,
        }
    }

    #[test]
    fn test_snapshot_respects_log_only() {
        let changes = ChangeSet::snapshot(&article("Hello", "World", 3));
        assert_eq!(changes.attributes.len(), 2);
        assert!(changes.attributes.contains_key("title"));
        assert!(!changes.attributes.contains_key("views"));
        assert!(changes.old.is_empty());
    }

    #[test]
    fn test_between_keeps_only_dirty_logged_fields() {
        let before = article("Hello", "World", 3);
        let after = article("Hello again", "World", 99);
        let changes = ChangeSet::between(&before, &after);

        assert_eq!(changes.attributes, json!({"title": "Hello again"}).as_object().unwrap().clone());
        assert_eq!(changes.old, json!({"title": "Hello"}).as_object().unwrap().clone());
    }

    #[test]
    fn test_unlogged_change_is_empty_and_not_submitted() {
        let before = article("Hello", "World", 3);
        let after = article("Hello", "World", 4);
        let changes = ChangeSet::between(&before, &after);

        assert!(changes.is_empty());
        assert!(!changes.should_submit::<Article>());
    }

    #[test]
    fn test_properties_omit_empty_old() {
        let properties = ChangeSet::snapshot(&article("A", "B", 0)).into_properties();
        assert_eq!(properties, json!({"attributes": {"title": "A", "body": "B"}}));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ActivityEvent::Created.as_str(), "created");
        assert_eq!(ActivityEvent::Updated.as_str(), "updated");
        assert_eq!(ActivityEvent::Deleted.as_str(), "deleted");
        assert_eq!(ActivityEvent::Restored.as_str(), "restored");
    }
}
