use crate::consts::DEFAULT_ENV_VAR_PREFIX;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug)]
pub enum ConfigErr {
    Read(config::ConfigError),
    MissingNeccessarySetting(String),
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "unable to read configuration: {}", e),
            Self::MissingNeccessarySetting(name) => write!(f, "missing setting: {}", name),
        }
    }
}

impl std::error::Error for ConfigErr {}

/// Layered configuration: an optional yaml file overridden by `DETECTOR__*`
/// environment variables.
pub struct ConfigCache {
    config: Config,
    config_path: String,
}

impl ConfigCache {
    pub fn new(config_path: &str) -> Result<Self, ConfigErr> {
        let config_cache = Self {
            config: Self::load_config(config_path)?,
            config_path: config_path.to_owned(),
        };

        Ok(config_cache)
    }

    fn load_config(config_path: &str) -> Result<Config, ConfigErr> {
        let base_config_builder = ConfigBuilder::<DefaultState>::default();
        base_config_builder
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix(DEFAULT_ENV_VAR_PREFIX).separator("__"))
            .build()
            .map_err(ConfigErr::Read)
    }

    pub fn path(&self) -> &str {
        &self.config_path
    }

    pub fn get_config<'d, T: Deserialize<'d>>(&self) -> Result<T, ConfigErr> {
        self.config
            .clone()
            .try_deserialize()
            .map_err(|e| match e {
                config::ConfigError::NotFound(key) => ConfigErr::MissingNeccessarySetting(key),
                // serde reports an absent struct field as "missing field `name`"
                config::ConfigError::Message(msg) => match msg.strip_prefix("missing field ") {
                    Some(field) => {
                        ConfigErr::MissingNeccessarySetting(field.trim_matches('`').to_owned())
                    }
                    None => ConfigErr::Read(config::ConfigError::Message(msg)),
                },
                e => ConfigErr::Read(e),
            })
    }
}
