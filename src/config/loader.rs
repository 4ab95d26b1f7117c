//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: GuardConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finish(config, |key| std::env::var(key).ok())
}

/// Build configuration from defaults plus environment only.
pub fn load_from_env() -> Result<GuardConfig, ConfigError> {
    finish(GuardConfig::default(), |key| std::env::var(key).ok())
}

fn finish<F>(mut config: GuardConfig, lookup: F) -> Result<GuardConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay credentials and endpoints from the environment.
///
/// Secrets are expected to come from the environment in deployed setups;
/// the file only carries tunables.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mpesa = &mut config.mpesa;
    let string_vars: [(&str, &mut String); 5] = [
        ("MPESA_CONSUMER_KEY", &mut mpesa.consumer_key),
        ("MPESA_CONSUMER_SECRET", &mut mpesa.consumer_secret),
        ("MPESA_SHORTCODE", &mut mpesa.shortcode),
        ("MPESA_PASSKEY", &mut mpesa.passkey),
        ("MPESA_CALLBACK_URL", &mut mpesa.callback_url),
    ];
    for (var, slot) in string_vars {
        if let Some(value) = lookup(var) {
            *slot = value;
        }
    }

    if let Some(value) = lookup("MPESA_ENVIRONMENT") {
        mpesa.environment = value.parse().map_err(|message| ConfigError::Env {
            var: "MPESA_ENVIRONMENT",
            message,
        })?;
    }
    if let Some(value) = lookup("MPESA_BASE_URL") {
        mpesa.base_url = Some(value);
    }
    if let Some(value) = lookup("MPESA_GUARD_ADMIN_KEY") {
        config.admin.api_key = value;
        config.admin.enabled = true;
    }
    if let Some(value) = lookup("MPESA_GUARD_BIND") {
        config.server.bind_address = value;
    }

    Ok(())
}
