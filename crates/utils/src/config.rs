use std::{
    collections::{HashMap, HashSet},
    env, fs,
    path::Path,
};

use serde::Deserialize;
use tracing::info;

use crate::{RecipientRouter, RewriteOptions, RoutingTable, DEFAULT_FORWARDED_BY};

/// Top-level configuration for the forwarder.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub forwarder: ForwarderConfig,
}

/// Forwarding configuration, loaded once per process and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderConfig {
    /// Domain the forwarder receives mail for, used to derive the
    /// default from address.
    #[serde(default)]
    pub domain: String,

    /// Address used in the `From` header of forwarded copies, defaults
    /// to `noreply@<domain>`.
    #[serde(default)]
    pub from_address: Option<String>,

    /// Whether forwarded copies carry a `Reply-To` pointing at the
    /// original sender.
    #[serde(default)]
    pub preserve_reply_to: bool,

    /// Value of the `X-Forwarded-By` marker header.
    #[serde(default = "default_forwarded_by")]
    pub forwarded_by: String,

    #[serde(default)]
    pub routing: RoutingConfig,

    pub source: SourceConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

/// Local-part to address mapping plus the optional catch-all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mapping: HashMap<String, String>,

    #[serde(default)]
    pub catch_all: Option<String>,
}

/// Where the raw inbound messages are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Directory holding one file per message, named `<prefix><message_id>`.
    #[serde(rename = "file_storage")]
    FileStorage {
        path: String,
        #[serde(default = "default_source_prefix")]
        prefix: String,
    },
}

/// Where the rewritten messages are sent to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum SinkConfig {
    /// Writes every forwarded copy as an `.eml` file under an outbox directory.
    #[serde(rename = "file_storage")]
    FileStorage {
        #[serde(default = "default_outbox_path")]
        path: String,
    },

    /// Relays every forwarded copy through an SMTP server.
    #[serde(rename = "smtp")]
    Smtp {
        host: String,
        #[serde(default = "default_smtp_port")]
        port: u16,
        #[serde(default)]
        tls: bool,
        username: Option<String>,
        password: Option<String>,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::FileStorage {
            path: default_outbox_path(),
        }
    }
}

impl ForwarderConfig {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from named variables resolved through
    /// `lookup`, empty values are treated as unset.
    ///
    /// `FORWARD_MAPPING` (a JSON object) and `SOURCE_PATH` are required.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let mapping_json =
            var("FORWARD_MAPPING").ok_or(ConfigError::Missing("FORWARD_MAPPING"))?;
        let mapping: HashMap<String, String> =
            serde_json::from_str(&mapping_json).map_err(ConfigError::Json)?;

        let source = SourceConfig::FileStorage {
            path: var("SOURCE_PATH").ok_or(ConfigError::Missing("SOURCE_PATH"))?,
            prefix: var("SOURCE_PREFIX").unwrap_or_else(default_source_prefix),
        };

        let sink = match var("SMTP_HOST") {
            Some(host) => SinkConfig::Smtp {
                host,
                port: match var("SMTP_PORT") {
                    Some(port) => port.parse().map_err(|_| ConfigError::Invalid("SMTP_PORT"))?,
                    None => default_smtp_port(),
                },
                tls: var("SMTP_TLS").as_deref() == Some("true"),
                username: var("SMTP_USERNAME"),
                password: var("SMTP_PASSWORD"),
            },
            None => SinkConfig::FileStorage {
                path: var("OUTBOX_PATH").unwrap_or_else(default_outbox_path),
            },
        };

        let config = Self {
            domain: var("DOMAIN_NAME").unwrap_or_default(),
            from_address: var("FROM_EMAIL"),
            preserve_reply_to: var("PRESERVE_REPLY_TO").as_deref() == Some("true"),
            forwarded_by: var("FORWARDED_BY").unwrap_or_else(default_forwarded_by),
            routing: RoutingConfig {
                mapping,
                catch_all: var("CATCH_ALL_FORWARD"),
            },
            source,
            sink,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that a from address can be derived and that no two mapping
    /// keys differ only by case.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_from_address()?;

        let mut seen = HashSet::new();
        for key in self.routing.mapping.keys() {
            let local_part = key.to_lowercase();
            if !seen.insert(local_part.clone()) {
                return Err(ConfigError::DuplicateRoute(local_part));
            }
        }
        Ok(())
    }

    /// Returns the configured from address, falling back to
    /// `noreply@<domain>`.
    pub fn resolved_from_address(&self) -> Result<String, ConfigError> {
        match self.from_address.as_deref() {
            Some(address) if !address.is_empty() => Ok(address.to_string()),
            _ if !self.domain.is_empty() => Ok(format!("noreply@{}", self.domain)),
            _ => Err(ConfigError::Missing("FROM_EMAIL or DOMAIN_NAME")),
        }
    }

    /// Returns the routing table built from the configured mapping.
    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::new(&self.routing.mapping)
    }

    /// Returns the catch-all address, an empty value counts as absent.
    pub fn catch_all(&self) -> Option<&str> {
        self.routing
            .catch_all
            .as_deref()
            .filter(|catch_all| !catch_all.is_empty())
    }

    /// Returns the recipient router described by this configuration.
    pub fn router(&self) -> RecipientRouter {
        RecipientRouter::new(self.routing_table(), self.catch_all().map(String::from))
    }

    /// Returns the rewrite options described by this configuration.
    pub fn rewrite_options(&self) -> Result<RewriteOptions, ConfigError> {
        let options = RewriteOptions::new(self.resolved_from_address()?, self.preserve_reply_to)
            .with_forwarded_by(self.forwarded_by.clone());
        info!(
            from_address = %options.from_address,
            preserve_reply_to = options.preserve_reply_to,
            "Rewrite options loaded"
        );
        Ok(options)
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
    config.forwarder.validate()?;
    Ok(config)
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred reading the file.
    Io(std::io::Error),
    /// A parse error occurred deserializing TOML.
    Parse(toml::de::Error),
    /// The forward mapping is not a valid JSON object of strings.
    Json(serde_json::Error),
    /// A required value is missing.
    Missing(&'static str),
    /// A value could not be interpreted.
    Invalid(&'static str),
    /// Two mapping keys resolve to the same lower-cased local-part.
    DuplicateRoute(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
            ConfigError::Json(e) => write!(f, "Config mapping error: {e}"),
            ConfigError::Missing(name) => write!(f, "Config value missing: {name}"),
            ConfigError::Invalid(name) => write!(f, "Config value invalid: {name}"),
            ConfigError::DuplicateRoute(key) => {
                write!(f, "Config mapping has duplicate local-part: {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_forwarded_by() -> String {
    DEFAULT_FORWARDED_BY.to_string()
}

fn default_source_prefix() -> String {
    "emails/".to_string()
}

fn default_outbox_path() -> String {
    "outbox".to_string()
}

fn default_smtp_port() -> u16 {
    25
}
