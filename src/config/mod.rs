//! Configuration module for lakeshift.
//!
//! Resolves catalog, schema and staging schema from a TOML settings file and
//! named profiles into a [`ConversionContext`](crate::convert::ConversionContext).

mod settings;

pub use settings::{
    expand_env_vars, DefaultSettings, OutputSettings, ProfileSettings, Settings, SettingsError,
    StagingSettings,
};
