use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O or YAML parsing error occurred while loading the file.
    Load(String),
    /// An environment override could not be converted.
    InvalidEnv { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::InvalidEnv { key, value } => {
                write!(f, "Invalid value for {key}: '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Behaviour switches for a [`RouteFactory`](crate::RouteFactory).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FactoryOptions {
    /// Check handler output against the declared response schemas.
    pub validate_response: bool,
}

impl FactoryOptions {
    pub fn with_validate_response(mut self, enabled: bool) -> Self {
        self.validate_response = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Document-level settings for the emitted OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenApiConfig {
    pub openapi: String,
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub servers: Vec<ServerConfig>,
    /// Prefix applied to every path key of the document.
    pub base_path: Option<String>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self::new("API", "1.0.0")
    }
}

impl OpenApiConfig {
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            openapi: "3.1.0".to_string(),
            title: title.to_string(),
            version: version.to_string(),
            description: None,
            servers: Vec::new(),
            base_path: None,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_server(mut self, url: &str) -> Self {
        self.servers.push(ServerConfig {
            url: url.to_string(),
            description: None,
        });
        self
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = Some(base_path.to_string());
        self
    }

    pub fn with_openapi_version(mut self, version: &str) -> Self {
        self.openapi = version.to_string();
        self
    }
}

/// Combined configuration file:
///
/// ```yaml
/// factory:
///   validate_response: true
/// openapi:
///   title: Items API
///   version: 0.3.0
///   base_path: /v1
/// ```
///
/// Resolution order (lowest to highest priority):
/// 1. the YAML file, when it exists
/// 2. `.env` (loaded into the process environment, never overwriting it)
/// 3. `OAR_VALIDATE_RESPONSE`, `OAR_BASE_PATH`, `OAR_TITLE`, `OAR_VERSION`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OarConfig {
    pub factory: FactoryOptions,
    pub openapi: OpenApiConfig,
}

impl OarConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
            Self::from_yaml_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Overlay `OAR_*` variables read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("OAR_VALIDATE_RESPONSE") {
            self.factory.validate_response = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                key: "OAR_VALIDATE_RESPONSE",
                value,
            })?;
        }
        if let Some(value) = lookup("OAR_BASE_PATH") {
            self.openapi.base_path = Some(value);
        }
        if let Some(value) = lookup("OAR_TITLE") {
            self.openapi.title = value;
        }
        if let Some(value) = lookup("OAR_VERSION") {
            self.openapi.version = value;
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
