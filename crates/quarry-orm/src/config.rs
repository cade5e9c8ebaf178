//! Connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`Connection`](crate::Connection).
///
/// Deserializable so it can be embedded in an application's config file:
///
/// ```
/// use quarry_orm::ConnectionConfig;
///
/// let config: ConnectionConfig = serde_json::from_str(
///     r#"{"dsn": "sqlite::memory:", "table_prefix": "tbl_", "enable_query_cache": true}"#,
/// ).unwrap();
/// assert_eq!(config.query_cache_duration, 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Driver URL: `sqlite::memory:`, `sqlite://app.db`,
    /// `postgres://host/db`, `mysql://host/db`.
    pub dsn: String,
    /// Username injected into server DSNs that carry none.
    pub username: Option<String>,
    /// Password injected together with `username`.
    pub password: Option<String>,
    /// Replaces `%` in `{{%table}}` markers.
    pub table_prefix: String,
    /// Cache query results when a cache component is attached.
    pub enable_query_cache: bool,
    /// Query cache lifetime in seconds; 0 never expires.
    pub query_cache_duration: u64,
    /// Store table metadata in the cache component.
    pub enable_schema_cache: bool,
    /// Schema cache lifetime in seconds; 0 never expires.
    pub schema_cache_duration: u64,
    /// Tables whose metadata is never cached.
    pub schema_cache_exclude: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            username: None,
            password: None,
            table_prefix: String::new(),
            enable_query_cache: false,
            query_cache_duration: 3600,
            enable_schema_cache: false,
            schema_cache_duration: 3600,
            schema_cache_exclude: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    /// Configuration for `dsn` with defaults elsewhere.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the table prefix.
    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Enables the query cache with a lifetime in seconds.
    #[must_use]
    pub const fn with_query_cache(mut self, duration_secs: u64) -> Self {
        self.enable_query_cache = true;
        self.query_cache_duration = duration_secs;
        self
    }

    /// Enables the schema cache with a lifetime in seconds.
    #[must_use]
    pub const fn with_schema_cache(mut self, duration_secs: u64) -> Self {
        self.enable_schema_cache = true;
        self.schema_cache_duration = duration_secs;
        self
    }

    pub(crate) const fn query_cache_ttl(&self) -> Option<Duration> {
        ttl(self.query_cache_duration)
    }

    pub(crate) const fn schema_cache_ttl(&self) -> Option<Duration> {
        ttl(self.schema_cache_duration)
    }
}

const fn ttl(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::new("sqlite::memory:");
        assert!(!config.enable_query_cache);
        assert_eq!(config.query_cache_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.with_query_cache(0).query_cache_ttl(), None);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"dsn": "postgres://localhost/app", "username": "app"}"#).unwrap();
        assert_eq!(config.username.as_deref(), Some("app"));
        assert!(config.password.is_none());
        assert_eq!(config.schema_cache_duration, 3600);
    }
}
