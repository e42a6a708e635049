use std::path::Path;

use crate::config::schema::{Config, ToolLimits};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` when given, otherwise starts from defaults, then applies
/// `DOCDESK_*` environment overrides and re-validates.
pub fn load_with_env(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;

    Ok(config)
}

/// Applies environment-style overrides using `lookup` to resolve variable names.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("DOCDESK_HOST") {
        config.server.host = host;
    }

    if let Some((name, value)) = lookup("DOCDESK_PORT")
        .map(|v| ("DOCDESK_PORT", v))
        .or_else(|| lookup("PORT").map(|v| ("PORT", v)))
    {
        config.server.port = parse_env(name, &value)?;
    }

    if let Some(dir) = lookup("DOCDESK_OUTPUT_DIR") {
        config.output_directory = dir;
    }

    if let Some(value) = lookup("DOCDESK_WORKERS") {
        config.worker_count = parse_env("DOCDESK_WORKERS", &value)?;
    }

    if let Some(value) = lookup("DOCDESK_OCR") {
        config.ocr.enabled = match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::EnvOverride {
                    name: "DOCDESK_OCR".to_string(),
                    value,
                })
            }
        };
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvOverride {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.output_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "output_directory must not be empty".to_string(),
        });
    }

    for (tool, limits) in config.tools.iter() {
        validate_limits(tool.slug(), limits)?;
    }

    Ok(())
}

fn validate_limits(tool: &str, limits: &ToolLimits) -> Result<(), ConfigError> {
    if limits.max_files == 0 {
        return Err(ConfigError::Validation {
            message: format!("{}: max_files must be at least 1", tool),
        });
    }

    if limits.max_file_size_bytes == 0 {
        return Err(ConfigError::Validation {
            message: format!("{}: max_file_size_bytes must be at least 1", tool),
        });
    }

    if limits.allowed_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: format!("{}: allowed_extensions must not be empty", tool),
        });
    }

    if let Some(ext) = limits
        .allowed_extensions
        .iter()
        .find(|ext| ext.starts_with('.') || ext.to_ascii_lowercase() != **ext)
    {
        return Err(ConfigError::Validation {
            message: format!(
                "{}: extension '{}' must be lowercase without a leading dot",
                tool, ext
            ),
        });
    }

    Ok(())
}
