// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::directive::ParserLimits;

/// Built-in source backend names that always exist.
pub const BUILTIN_SOURCES: &[&str] = &["local", "s3", "facebook", "youtube", "vimeo"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Named directive templates selectable by a single path keyword
    #[serde(default)]
    pub presets: HashMap<String, PresetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

/// Image transformation defaults and response cache lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Default encode quality when no q token is present (1-100)
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Optional hard cap applied to every requested dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dimension: Option<u32>,

    /// Cache lifetime for regular image responses
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,

    /// Cache lifetime for sources whose upstream content is mutable
    /// (social thumbnails)
    #[serde(default = "default_expiry_seconds_short")]
    pub expiry_seconds_short: u64,

    /// Cache lifetime for JSON metadata responses
    #[serde(default = "default_json_expiry_seconds")]
    pub json_expiry_seconds: u64,

    /// Optional image served as the body of 404 responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_404: Option<PathBuf>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
            max_dimension: None,
            expiry_seconds: default_expiry_seconds(),
            expiry_seconds_short: default_expiry_seconds_short(),
            json_expiry_seconds: default_json_expiry_seconds(),
            fallback_404: None,
        }
    }
}

fn default_quality() -> u8 {
    80
}

/// 30 days
fn default_expiry_seconds() -> u64 {
    2_592_000
}

/// 10 minutes
fn default_expiry_seconds_short() -> u64 {
    600
}

/// 1 day
fn default_json_expiry_seconds() -> u64 {
    86_400
}

/// Source backend wiring: which backends exist, which is the default, and
/// which are blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Backend used when the directive carries no override
    #[serde(default = "default_source")]
    pub default: String,

    /// Backends that short-circuit with 403 before any fetch
    #[serde(default)]
    pub excluded: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSourceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3SourceConfig>,

    /// Named external HTTP backends: name -> URL prefix
    #[serde(default)]
    pub external: HashMap<String, String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default: default_source(),
            excluded: Vec::new(),
            local: None,
            s3: None,
            external: HashMap::new(),
        }
    }
}

fn default_source() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSourceConfig {
    /// Directory image paths resolve under
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3SourceConfig {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// A named directive template. Populated fields behave exactly like their
/// token counterparts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gravity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap() // Safe because we checked above
        });

        let config: Config = serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.images.default_quality == 0 || self.images.default_quality > 100 {
            return Err(format!(
                "images.default_quality must be in [1, 100], got {}",
                self.images.default_quality
            ));
        }

        if let Some(max) = self.images.max_dimension {
            if max == 0 {
                return Err("images.max_dimension must be greater than 0".to_string());
            }
        }

        if !self.source_is_known(&self.sources.default) {
            return Err(format!(
                "sources.default '{}' is not a known source backend",
                self.sources.default
            ));
        }

        for (name, prefix) in &self.sources.external {
            if name.is_empty() {
                return Err("External source name cannot be empty".to_string());
            }
            if !prefix.starts_with("http://") && !prefix.starts_with("https://") {
                return Err(format!(
                    "External source '{}' prefix '{}' must start with http:// or https://",
                    name, prefix
                ));
            }
        }

        for (name, preset) in &self.presets {
            if name.is_empty() {
                return Err("Preset name cannot be empty".to_string());
            }
            if let Some(gravity) = &preset.gravity {
                if crate::directive::Gravity::from_code(gravity).is_none() {
                    return Err(format!(
                        "Preset '{}' has invalid gravity '{}'",
                        name, gravity
                    ));
                }
            }
            if let Some(crop) = &preset.crop {
                if crop != "fill" && crop != "pad" {
                    return Err(format!(
                        "Preset '{}' has invalid crop mode '{}' (expected fill or pad)",
                        name, crop
                    ));
                }
            }
            if let Some(q) = preset.quality {
                if q == 0 || q > 100 {
                    return Err(format!(
                        "Preset '{}' quality must be in [1, 100], got {}",
                        name, q
                    ));
                }
            }
            if let Some(source) = &preset.source {
                if !self.source_is_known(source) {
                    return Err(format!(
                        "Preset '{}' references unknown source '{}'",
                        name, source
                    ));
                }
            }
        }

        Ok(())
    }

    /// True when a name matches a built-in backend or a configured external
    /// prefix.
    pub fn source_is_known(&self, name: &str) -> bool {
        BUILTIN_SOURCES.contains(&name) || self.sources.external.contains_key(name)
    }

    /// The limits the directive parser consumes.
    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            default_quality: self.images.default_quality,
            max_dimension: self.images.max_dimension,
        }
    }
}
