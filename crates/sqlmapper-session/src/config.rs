//! Session configuration.
//!
//! A [`Configuration`] is built once and shared read-only by every session
//! opened from it. It can be assembled with the builder methods or loaded
//! from JSON:
//!
//! ```
//! use sqlmapper_session::{Configuration, LocalCacheScope};
//!
//! let config = Configuration::from_json(
//!     r#"{ "local_cache_scope": "STATEMENT", "environment": { "id": "dev" } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.local_cache_scope, LocalCacheScope::Statement);
//! assert_eq!(config.environment_id(), Some("dev"));
//! ```

use serde::{Deserialize, Serialize};
use sqlmapper_core::{DataSource, DatabaseIdProvider, Result};

use crate::backend::ExecutorType;

/// How long local cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocalCacheScope {
    /// Until the session commits, rolls back, updates or closes
    #[default]
    Session,
    /// Until the outermost query completes
    Statement,
}

/// The environment sessions run in. Its id takes part in cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
}

impl Environment {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Settings shared by every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub local_cache_scope: LocalCacheScope,
    pub environment: Option<Environment>,
    /// Seconds; used when a statement declares no timeout of its own.
    pub default_statement_timeout: Option<u32>,
    pub default_executor_type: ExecutorType,
    pub database_id: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            local_cache_scope: LocalCacheScope::Session,
            environment: None,
            default_statement_timeout: None,
            default_executor_type: ExecutorType::Simple,
            database_id: None,
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn local_cache_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_cache_scope = scope;
        self
    }

    #[must_use]
    pub fn environment(mut self, id: impl Into<String>) -> Self {
        self.environment = Some(Environment::new(id));
        self
    }

    /// Default statement timeout in seconds.
    #[must_use]
    pub fn default_statement_timeout(mut self, seconds: u32) -> Self {
        self.default_statement_timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn default_executor_type(mut self, kind: ExecutorType) -> Self {
        self.default_executor_type = kind;
        self
    }

    #[must_use]
    pub fn database_id(mut self, id: impl Into<String>) -> Self {
        self.database_id = Some(id.into());
        self
    }

    /// Ask `provider` for the database id of `source` and record it.
    #[must_use]
    pub fn resolve_database_id(
        mut self,
        provider: &dyn DatabaseIdProvider,
        source: &dyn DataSource,
    ) -> Self {
        self.database_id = provider.database_id(source);
        self
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment.as_ref().map(|env| env.id.as_str())
    }
}
