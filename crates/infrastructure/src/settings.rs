//! Settings loading.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `VELLUM__*` environment variables (`VELLUM__BASE_URL`,
//! `VELLUM__COOKIE__SECURE`, ...).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use vellum_domain::GatewaySettings;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "VELLUM";

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or merged.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged settings are unusable.
    #[error("invalid setting `{field}`: {message}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Loads settings from defaults, `path` (if it exists) and the environment.
///
/// # Errors
/// Returns an error if a source is malformed or the result is invalid.
pub fn load_settings(path: Option<&Path>) -> Result<GatewaySettings, ConfigError> {
    load_with_environment(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn load_with_environment(
    path: Option<&Path>,
    environment: Environment,
) -> Result<GatewaySettings, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&GatewaySettings::default())?);
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
    }

    let settings: GatewaySettings = builder.add_source(environment).build()?.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &GatewaySettings) -> Result<(), ConfigError> {
    let base = url::Url::parse(&settings.base_url).map_err(|e| ConfigError::Invalid {
        field: "base_url",
        message: e.to_string(),
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            field: "base_url",
            message: format!("unsupported scheme `{}`", base.scheme()),
        });
    }
    for (field, path) in [
        ("refresh_path", &settings.refresh_path),
        ("sign_out_path", &settings.sign_out_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field,
                message: format!("`{path}` must start with `/`"),
            });
        }
    }
    if settings.refresh_timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            field: "refresh_timeout_ms",
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
