//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto a configuration.
///
/// `lookup` abstracts the environment so tests do not touch process state.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("GEMINI_API_KEY") {
        config.upstream.api_key = key;
    }
    if let Some(model) = get("GEMINI_MODEL") {
        config.upstream.model = model;
    }
    if let Some(url) = get("GEMINI_BASE_URL") {
        config.upstream.base_url = url;
    }
    if let Some(key) = get("APP_API_KEY") {
        config.auth.api_key = key;
    }
    if let Some(value) = get("APP_DEVELOPMENT") {
        config.auth.development = parse_bool("APP_DEVELOPMENT", &value)?;
    }
    if let Some(url) = get("REDIS_URL") {
        config.rate_limit.redis_url = Some(url);
    }
    if let Some(origins) = get("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(addr) = get("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(port) = get("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            value: port.clone(),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.observability.log_format = match format.trim().to_lowercase().as_str() {
            "json" => crate::config::LogFormat::Json,
            "pretty" => crate::config::LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    var: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }

    Ok(())
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("GEMINI_API_KEY", "g-key"),
                ("APP_API_KEY", "app-key"),
                ("APP_DEVELOPMENT", "true"),
                ("REDIS_URL", "redis://127.0.0.1:6379"),
                ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
                ("PORT", "9000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.upstream.api_key, "g-key");
        assert_eq!(config.auth.api_key, "app-key");
        assert!(config.auth.development);
        assert_eq!(
            config.rate_limit.redis_url.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = GatewayConfig::default();
        config.auth.api_key = "from-file".into();
        apply_env_overrides(&mut config, env(&[("APP_API_KEY", "   ")])).unwrap();
        assert_eq!(config.auth.api_key, "from-file");
    }

    #[test]
    fn test_invalid_env_values_are_rejected() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err =
            apply_env_overrides(&mut config, env(&[("APP_DEVELOPMENT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "APP_DEVELOPMENT", .. }));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingApiKey,
            ValidationError::MissingModel,
        ]);
        let text = err.to_string();
        assert!(text.starts_with("Validation failed: "));
        assert!(text.contains(", "));
    }
}
