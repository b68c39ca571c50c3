//! Configuration management using Figment
//!
//! Sources, lowest to highest precedence:
//! 1. Default values
//! 2. `./crudbase.toml` (or the file named by `CRUDBASE_CONFIG`)
//! 3. Environment variables prefixed `CRUDBASE_`, `__` separating nested keys,
//!    e.g. `CRUDBASE_BACKENDS__SECONDARY_A__URL`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::BackendId;

const DEFAULT_CONFIG_FILE: &str = "crudbase.toml";
const CONFIG_FILE_ENV: &str = "CRUDBASE_CONFIG";
const ENV_PREFIX: &str = "CRUDBASE_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("backend `{0}` must be configured")]
    MissingBackend(BackendId),
}

/// Process-wide settings, built once at start-up and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_name: String,
    /// Prefix every route is mounted under (the application root path).
    pub root_path: String,
    /// Version prefix for resource routes, below `root_path`.
    pub api_prefix: String,
    pub bind_addr: String,
    /// Default tracing filter; `RUST_LOG` wins when set.
    pub log_level: String,
    /// Reject payload keys outside a resource's allow-list instead of dropping them.
    pub strict_payloads: bool,
    pub backends: BackendsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_name: "crudbase".to_string(),
            root_path: "/Template".to_string(),
            api_prefix: "/api/v1".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            log_level: "info".to_string(),
            strict_payloads: false,
            backends: BackendsConfig::default(),
        }
    }
}

impl Settings {
    /// The layered figment the settings are extracted from.
    #[must_use]
    pub fn figment() -> Figment {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and check the settings.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or the primary backend is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// # Errors
    ///
    /// See [`Settings::load`].
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: Self = figment.extract().map_err(Box::new)?;
        if settings.backends.primary.is_none() {
            return Err(ConfigError::MissingBackend(BackendId::Primary));
        }
        Ok(settings)
    }

    /// Full mount point of the versioned resource routes.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!(
            "{}{}",
            self.root_path.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/')
        )
    }
}

/// One optional connection block per backend identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub primary: Option<BackendConfig>,
    pub primary_async: Option<BackendConfig>,
    pub secondary_a: Option<BackendConfig>,
    pub secondary_b: Option<BackendConfig>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            primary: Some(BackendConfig::new("sqlite::memory:")),
            primary_async: None,
            secondary_a: None,
            secondary_b: None,
        }
    }
}

impl BackendsConfig {
    #[must_use]
    pub fn get(&self, id: BackendId) -> Option<&BackendConfig> {
        match id {
            BackendId::Primary => self.primary.as_ref(),
            BackendId::PrimaryAsync => self.primary_async.as_ref(),
            BackendId::SecondaryA => self.secondary_a.as_ref(),
            BackendId::SecondaryB => self.secondary_b.as_ref(),
        }
    }

    /// Configured backends, in declaration order.
    pub fn configured(&self) -> impl Iterator<Item = (BackendId, &BackendConfig)> {
        BackendId::ALL
            .into_iter()
            .filter_map(|id| self.get(id).map(|config| (id, config)))
    }
}

/// Connection settings of one backend
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Sea-ORM connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// New connection timeout
    pub connect_timeout_secs: u64,
    /// Pool acquisition timeout
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Ping the pool once after connecting
    pub pre_ping: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            pre_ping: true,
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// The URL with its password masked, safe for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let url = &self.url;
        if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
            let credentials = &url[scheme_end + 3..at_pos];
            if let Some(colon) = credentials.find(':') {
                return format!(
                    "{}{}:***{}",
                    &url[..scheme_end + 3],
                    &credentials[..colon],
                    &url[at_pos..]
                );
            }
        }
        url.clone()
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.redacted_url())
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("pre_ping", &self.pre_ping)
            .finish()
    }
}
