//! TOML-based configuration for lakeshift.
//!
//! Supports a config file (lakeshift.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [defaults]
//! catalog = "main"
//! schema = "dbo"
//! profile = "dev"
//!
//! [profiles.dev]
//! catalog = "dev_lake"
//! schema = "sales"
//! warehouse_id = "${DATABRICKS_WAREHOUSE_ID}"
//!
//! [staging]
//! schema = "staging"
//!
//! [output]
//! directory = "./converted"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::convert::ConversionContext;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: DefaultSettings,

    /// Named warehouse profiles.
    pub profiles: BTreeMap<String, ProfileSettings>,

    pub staging: StagingSettings,

    pub output: OutputSettings,
}

/// Fallback catalog and schema, and the profile used when none is named.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultSettings {
    pub catalog: String,
    pub schema: String,
    pub profile: Option<String>,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            catalog: "main".to_string(),
            schema: "dbo".to_string(),
            profile: None,
        }
    }
}

/// A Databricks target.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileSettings {
    /// Overrides `defaults.catalog`.
    #[serde(default)]
    pub catalog: Option<String>,

    /// Overrides `defaults.schema`.
    #[serde(default)]
    pub schema: Option<String>,

    /// SQL warehouse used for live validation.
    #[serde(default)]
    pub warehouse_id: Option<String>,
}

/// Where external M sources are assumed to be staged.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StagingSettings {
    pub schema: String,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            schema: "staging".to_string(),
        }
    }
}

/// Output location for converted files.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `LAKESHIFT_CONFIG`
    /// 2. `./lakeshift.toml`
    /// 3. `~/.config/lakeshift/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("LAKESHIFT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("lakeshift.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lakeshift").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a profile by name.
    pub fn profile(&self, name: &str) -> Result<&ProfileSettings, SettingsError> {
        self.profiles
            .get(name)
            .ok_or_else(|| SettingsError::ProfileNotFound(name.to_string()))
    }

    /// Resolve the conversion context for a profile.
    ///
    /// `None` uses `defaults.profile`; with no profile at all the defaults
    /// apply directly. Values are expanded for environment variables.
    pub fn context(&self, profile: Option<&str>) -> Result<ConversionContext, SettingsError> {
        let profile = match profile.or(self.defaults.profile.as_deref()) {
            Some(name) => Some(self.profile(name)?),
            None => None,
        };
        let catalog = profile
            .and_then(|p| p.catalog.as_deref())
            .unwrap_or(&self.defaults.catalog);
        let schema = profile
            .and_then(|p| p.schema.as_deref())
            .unwrap_or(&self.defaults.schema);

        let catalog = expand_env_vars(catalog)?;
        let schema = expand_env_vars(schema)?;
        let staging = expand_env_vars(&self.staging.schema)?;
        for (key, value) in [("catalog", &catalog), ("schema", &schema), ("staging.schema", &staging)] {
            if value.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!("{} is empty", key)));
            }
        }

        Ok(ConversionContext::new(&catalog, &schema).with_staging_schema(&staging))
    }

    /// The warehouse id of a profile, expanded.
    pub fn warehouse_id(&self, profile: &str) -> Result<Option<String>, SettingsError> {
        self.profile(profile)?
            .warehouse_id
            .as_deref()
            .map(expand_env_vars)
            .transpose()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                var_name.push(ch);
            }
            if !closed {
                return Err(SettingsError::InvalidConfig(format!(
                    "unclosed ${{{} in {}",
                    var_name, s
                )));
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    var_name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
