//! Configuration management for the schema migrator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (migrator.toml)
//! - Environment variables (MIGRATOR__*)
//!
//! ## Example config file (migrator.toml):
//! ```toml
//! [registry]
//! url = "http://localhost:8081"
//! group = "default"
//!
//! [registry.bearer]
//! issuer_endpoint_url = "http://localhost:8080/realms/kafka/protocol/openid-connect/token"
//! client_id = "schema-migrator"
//! client_secret = "change-me"
//!
//! [subject]
//! strategy = "TopicRecordNameStrategy"
//!
//! [[topics.mappings]]
//! name = "orders"
//! location = "schemas/orders"
//! ```
//!
//! Loaded values are checked once by [`MigratorConfig::validate`], which yields
//! the [`Settings`] the migrator runs with.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MigrationError, Result};
use crate::resolver::{ResolutionPolicy, TopicMapping, TopicResolver, DEFAULT_EXTENSION};
use crate::subject::SubjectNameStrategy;

/// Main configuration for the migrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Registry connection settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Subject naming settings
    #[serde(default)]
    pub subject: SubjectConfig,

    /// Topic resolution settings
    #[serde(default)]
    pub topics: TopicsConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the schema registry
    #[serde(default)]
    pub url: Option<String>,

    /// Value of the `X-Registry-GroupId` header
    #[serde(default)]
    pub group: Option<String>,

    /// OAuth client-credentials settings
    #[serde(default)]
    pub bearer: BearerConfig,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of cached schema ids
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// OAuth client-credentials configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BearerConfig {
    #[serde(default)]
    pub issuer_endpoint_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Subject naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Strategy name; unknown values fall back to TopicRecordNameStrategy
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

/// Topic resolution configuration
///
/// `mappings` wins over `names`, which wins over plain `root` discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Explicit topic → location mappings
    #[serde(default)]
    pub mappings: Vec<TopicMapping>,

    /// Topic names, each read from `root/<name>`
    #[serde(default)]
    pub names: Vec<String>,

    /// Directory (or `embedded:` path) holding one subdirectory per topic
    #[serde(default)]
    pub root: Option<String>,

    /// Schema file extension
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Validated registry settings
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub url: String,
    pub group: Option<String>,
    pub bearer: BearerSettings,
    pub timeout: Duration,
    pub cache_capacity: usize,
}

/// Validated OAuth settings
#[derive(Debug, Clone)]
pub struct BearerSettings {
    pub issuer_endpoint_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

/// Everything a migration run needs, checked up front
#[derive(Debug, Clone)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub strategy: SubjectNameStrategy,
    pub resolver: TopicResolver,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    16
}

fn default_strategy() -> String {
    SubjectNameStrategy::default().as_str().to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            group: None,
            bearer: BearerConfig::default(),
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            mappings: Vec::new(),
            names: Vec::new(),
            root: None,
            extension: default_extension(),
        }
    }
}

impl MigratorConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file when given
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["migrator.toml", ".migrator.toml", "config/migrator.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "avro", "schema-migrator") {
            let xdg_config = config_dir.config_dir().join("migrator.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (MIGRATOR__*)
        builder = builder.add_source(
            Environment::with_prefix("MIGRATOR")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("topics.names")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, config_crate::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Copy with the client secret masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.registry.bearer.client_secret.is_some() {
            copy.registry.bearer.client_secret = Some("********".to_string());
        }
        copy
    }

    /// Subject naming strategy, with fallback for unknown names
    pub fn subject_strategy(&self) -> SubjectNameStrategy {
        SubjectNameStrategy::from_config(self.subject.strategy.trim())
    }

    /// Topic resolver for the configured policy
    pub fn topic_resolver(&self) -> Result<TopicResolver> {
        let topics = &self.topics;
        let root = non_blank(topics.root.as_deref());

        let policy = if !topics.mappings.is_empty() {
            ResolutionPolicy::ExplicitMapping(topics.mappings.clone())
        } else if !topics.names.is_empty() {
            let root = root.ok_or_else(|| {
                MigrationError::configuration("topics.root", "required when topics.names is set")
            })?;
            ResolutionPolicy::ExplicitListWithRoot {
                root,
                topics: topics.names.clone(),
            }
        } else if let Some(root) = root {
            ResolutionPolicy::AutoDiscover { root }
        } else {
            return Err(MigrationError::configuration(
                "topics",
                "no mappings, names or root configured",
            ));
        };

        let extension = topics.extension.trim();
        if extension.is_empty() {
            return Err(MigrationError::configuration("topics.extension", "must not be empty"));
        }

        Ok(TopicResolver::new(policy).with_extension(extension))
    }

    /// Validated registry connection settings
    pub fn registry_settings(&self) -> Result<RegistrySettings> {
        let registry = &self.registry;
        let url = required("registry.url", registry.url.as_deref())?;
        if reqwest::Url::parse(&url).is_err() {
            return Err(MigrationError::configuration("registry.url", format!("'{}' is not a valid URL", url)));
        }

        let bearer = &registry.bearer;
        let bearer = BearerSettings {
            issuer_endpoint_url: required(
                "registry.bearer.issuer_endpoint_url",
                bearer.issuer_endpoint_url.as_deref(),
            )?,
            client_id: required("registry.bearer.client_id", bearer.client_id.as_deref())?,
            client_secret: required("registry.bearer.client_secret", bearer.client_secret.as_deref())?,
            scope: non_blank(bearer.scope.as_deref()),
        };

        if registry.timeout_secs == 0 {
            return Err(MigrationError::configuration("registry.timeout_secs", "must be positive"));
        }

        Ok(RegistrySettings {
            url,
            group: non_blank(registry.group.as_deref()),
            bearer,
            timeout: Duration::from_secs(registry.timeout_secs),
            cache_capacity: registry.cache_capacity,
        })
    }

    /// Check every mandatory setting
    pub fn validate(&self) -> Result<Settings> {
        Ok(Settings {
            registry: self.registry_settings()?,
            strategy: self.subject_strategy(),
            resolver: self.topic_resolver()?,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(key: &str, value: Option<&str>) -> Result<String> {
    non_blank(value).ok_or_else(|| MigrationError::configuration(key, "missing"))
}
