use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::Path;

use super::{ConfigError, RunConfig};

/// Environment prefix for overrides, e.g. `BOLETA_DISPATCH__RETRY_BUDGET=3`.
const ENV_PREFIX: &str = "BOLETA_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<RunConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
