use std::path::Path;

use crate::config::schema::{Config, RectConfig};
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

    if !(config.raster.scale.is_finite() && config.raster.scale > 0.0) {
        return Err(ConfigError::Validation {
            message: format!("Raster scale must be positive, got {}", config.raster.scale),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let calibration = &config.calibration;
    if calibration.reference_width == 0 {
        return Err(ConfigError::Validation {
            message: "Calibration reference width must be positive".to_string(),
        });
    }
    validate_rect("calibration.card", &calibration.card)?;
    validate_rect("calibration.photo", &calibration.photo)?;
    if calibration.photo_size.width == 0 || calibration.photo_size.height == 0 {
        return Err(ConfigError::Validation {
            message: "calibration.photo_size must be non-empty".to_string(),
        });
    }

    let extraction = &config.extraction;
    if extraction.template_marker.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "extraction.template_marker must not be empty".to_string(),
        });
    }

    if extraction.blocklist.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::InvalidPattern {
            name: "extraction.blocklist".to_string(),
            reason: "Blocklist phrases must not be empty".to_string(),
        });
    }

    if extraction.ocr_languages.is_empty() {
        return Err(ConfigError::Validation {
            message: "extraction.ocr_languages must name at least one language".to_string(),
        });
    }
    for lang in &extraction.ocr_languages {
        if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            return Err(ConfigError::InvalidPattern {
                name: lang.clone(),
                reason: "OCR language codes may only contain [a-z_]".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_rect(name: &str, rect: &RectConfig) -> Result<(), ConfigError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(ConfigError::Validation {
            message: format!("{} must have a non-zero width and height", name),
        });
    }
    Ok(())
}
