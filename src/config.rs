use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::MetadataError;

/// Where the metadata fragment of an element is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    /// The value of the attribute named by the configured name
    Attr,
    /// Inside `{ }` in the class attribute (default)
    #[default]
    Class,
    /// The text of the first descendant element with the configured tag name
    Elem,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Attr => "attr",
            Mode::Class => "class",
            Mode::Elem => "elem",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attr" => Ok(Mode::Attr),
            "class" => Ok(Mode::Class),
            "elem" => Ok(Mode::Elem),
            other => Err(MetadataError::Configuration(format!(
                "unknown extraction mode '{}', expected one of: attr, class, elem",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Active extraction settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataConfig {
    /// Extraction mode
    #[serde(default)]
    pub mode: Mode,
    /// Attribute name (`attr`) or child tag name (`elem`); unused for `class`
    #[serde(default = "default_name")]
    pub name: Option<String>,
    /// When set, the whole mapping is stored under this one property
    /// instead of being flattened onto the element
    #[serde(default)]
    pub single_property: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            name: default_name(),
            single_property: None,
        }
    }
}

fn default_name() -> Option<String> {
    Some("data".to_string())
}

impl MetadataConfig {
    /// Set the extraction mode and its name parameter.
    ///
    /// The name is replaced even when `None`; `attr` and `elem` extraction
    /// then find no fragment.
    pub fn set_mode(&mut self, mode: Mode, name: Option<&str>) {
        self.mode = mode;
        self.name = name.map(str::to_string);
    }

    /// Set the single property name; `None` or an empty name selects flattening
    pub fn set_single_property(&mut self, property: Option<&str>) {
        self.single_property = property.filter(|p| !p.is_empty()).map(str::to_string);
    }

    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with METADATA__ prefix
    /// 2. metadata.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: METADATA__SINGLE_PROPERTY
    pub fn load() -> Result<Self, MetadataError> {
        Ok(load_config()?)
    }

    fn normalized(mut self) -> Self {
        if self.single_property.as_deref() == Some("") {
            self.single_property = None;
        }
        self
    }
}

/// Load configuration from `metadata.toml` and `METADATA__*` environment variables
pub fn load_config() -> Result<MetadataConfig, ConfigError> {
    load_config_with_prefix("METADATA")
}

fn load_config_with_prefix(prefix: &str) -> Result<MetadataConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("metadata").required(false))
        // Use double underscore for nested keys: METADATA__SINGLE_PROPERTY
        .add_source(Environment::with_prefix(prefix).separator("__"))
        .build()?;

    let config = settings.try_deserialize::<MetadataConfig>()?.normalized();
    log::info!(
        "Loaded metadata config: mode={}, name={:?}, single_property={:?}",
        config.mode,
        config.name,
        config.single_property
    );
    Ok(config)
}
