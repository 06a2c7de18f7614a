//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the store and the
//! HTTP layer. Request handlers never read process-wide environment variables, which keeps
//! behaviour consistent across multi-threaded runtimes and test harnesses.

use crate::constants::{DEFAULT_DATABASE_PATH, DEFAULT_PLUGIN_PREFIX};
use crate::{RosterError, RosterResult};
use roster_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    plugin_prefix: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `plugin_prefix` is normalised to start with `/` and to carry no trailing `/`. The root
    /// prefix `/` normalises to the empty string.
    pub fn new(database_path: PathBuf, plugin_prefix: &str) -> RosterResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(RosterError::InvalidInput(
                "database_path cannot be empty".into(),
            ));
        }

        Ok(Self {
            database_path,
            plugin_prefix: normalise_prefix(plugin_prefix)?,
        })
    }

    /// Build configuration from optional raw values, applying defaults for missing or blank ones.
    ///
    /// This is the entry point binaries use after reading `ROSTER_DATABASE` and
    /// `ROSTER_PLUGIN_PREFIX` from the environment.
    pub fn from_env_values(
        database: Option<String>,
        plugin_prefix: Option<String>,
    ) -> RosterResult<Self> {
        let database = NonEmptyText::optional(database.as_deref())
            .map(|d| PathBuf::from(d.as_str()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
        let prefix = NonEmptyText::optional(plugin_prefix.as_deref())
            .map(|p| p.to_string())
            .unwrap_or_else(|| DEFAULT_PLUGIN_PREFIX.to_string());

        Self::new(database, &prefix)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn plugin_prefix(&self) -> &str {
        &self.plugin_prefix
    }
}

fn normalise_prefix(prefix: &str) -> RosterResult<String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let ok = trimmed
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'/' | b'-' | b'_'));
    if !ok {
        return Err(RosterError::InvalidInput(
            "plugin prefix contains invalid characters (only alphanumeric, '/', '-', '_' allowed)"
                .into(),
        ));
    }

    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}
