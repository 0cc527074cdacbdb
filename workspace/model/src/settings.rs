//! Application-wide defaults consumed by the user resolvers.

/// Locale used when neither the user nor the configuration provides one.
pub const DEFAULT_LOCALE: &str = "en";
/// Timezone used when neither the user nor the configuration provides one.
pub const DEFAULT_TIMEZONE: &str = "UTC";
/// Base URL used for public storage assets when none is configured.
pub const DEFAULT_ASSET_URL: &str = "http://localhost";

/// Settings the user entity falls back on when a per-user value is missing.
///
/// Built once from configuration and handed to the resolvers explicitly, so
/// a request can swap the current locale without touching global state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    locale: String,
    timezone: Option<String>,
    asset_url: String,
}

impl AppSettings {
    pub fn new(
        locale: impl Into<String>,
        timezone: Option<String>,
        asset_url: impl Into<String>,
    ) -> Self {
        Self {
            locale: locale.into(),
            timezone,
            asset_url: asset_url.into(),
        }
    }

    /// Returns a copy of these settings with a different current locale.
    pub fn with_locale(&self, locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            ..self.clone()
        }
    }

    /// The current locale. Never empty.
    pub fn locale(&self) -> &str {
        non_empty(Some(&self.locale)).unwrap_or(DEFAULT_LOCALE)
    }

    /// The configured default timezone, or `"UTC"` when none is configured.
    pub fn timezone(&self) -> &str {
        non_empty(self.timezone.as_deref()).unwrap_or(DEFAULT_TIMEZONE)
    }

    /// Public base URL without a trailing slash.
    pub fn asset_url(&self) -> &str {
        let trimmed = self.asset_url.trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_ASSET_URL
        } else {
            trimmed
        }
    }

    /// URL of a file on the public storage disk.
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/{}", self.asset_url(), path.trim_start_matches('/'))
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE, None, DEFAULT_ASSET_URL)
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
