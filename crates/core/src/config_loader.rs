use crate::config::EngineConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default location of the engine configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Undercut.toml";

/// Prefix for environment overrides, e.g. `UNDERCUT_READ_ONLY=true`.
pub const ENV_PREFIX: &str = "UNDERCUT_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration from [`DEFAULT_CONFIG_PATH`] and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or is invalid.
    pub fn load() -> Result<EngineConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads engine configuration by merging defaults, a TOML file, and
    /// `UNDERCUT_`-prefixed environment variables (nested keys split on `__`).
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
