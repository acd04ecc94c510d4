// Configuration handling for file-variants
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConfigError, FileVariantsError, Result};

/// Key of this extension's section inside the host configuration
pub const EXTENSION_KEY: &str = "file_variants";

/// Host-wide configuration document with per-extension sections
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub extensions: HashMap<String, serde_yaml::Value>,
    pub logging: Option<LoggingSettings>,
}

/// Logging section of the host configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
    pub show_targets: Option<bool>,
}

/// Validated settings from the file_variants extension section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantsConfig {
    /// Uid of the storage that holds language variant copies
    pub variants_storage: i64,
    /// Storage-relative folder the copies are placed in
    pub variants_folder: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawVariantsSection {
    variants_storage: Option<serde_yaml::Value>,
    variants_folder: Option<serde_yaml::Value>,
}

impl HostConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FileVariantsError::Config(Box::new(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(
                    "Create a host configuration file with an extensions section".to_string(),
                ),
            })));
        }

        if !path.is_file() {
            return Err(FileVariantsError::Config(Box::new(
                ConfigError::InvalidValue {
                    message: "Configuration path is not a file".to_string(),
                    field: "config_path".to_string(),
                    value: path.display().to_string(),
                    expected: "file path".to_string(),
                },
            )));
        }

        let content = std::fs::read_to_string(path).map_err(FileVariantsError::Io)?;

        Self::from_yaml_with_context(&content, Some(path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_context(yaml, None)
    }

    fn from_yaml_with_context(yaml: &str, file_path: Option<&Path>) -> Result<Self> {
        let config: HostConfig = serde_yaml::from_str(yaml).map_err(|e| {
            let mut config_error = *Box::<ConfigError>::from(e);
            if let ConfigError::InvalidYaml {
                file_path: ref mut error_path,
                ..
            } = config_error
            {
                *error_path = file_path.map(Path::to_path_buf);
            }
            FileVariantsError::Config(Box::new(config_error))
        })?;

        Ok(config)
    }
}

impl VariantsConfig {
    /// Extract and validate this extension's section from the host configuration.
    ///
    /// The section is mandatory: the reference rewriting hooks refuse to
    /// construct without a storage uid and folder to place variant copies in.
    pub fn from_host(host: &HostConfig) -> Result<Self> {
        let section = host.extensions.get(EXTENSION_KEY).ok_or_else(|| {
            FileVariantsError::Config(Box::new(ConfigError::MissingSection {
                section: EXTENSION_KEY.to_string(),
                file_path: None,
                suggestion: Some(
                    "Add a file_variants section with variants_storage and variants_folder"
                        .to_string(),
                ),
            }))
        })?;

        let raw: RawVariantsSection = serde_yaml::from_value(section.clone())
            .map_err(|e| FileVariantsError::Config(Box::<ConfigError>::from(e)))?;

        let variants_storage = match raw.variants_storage {
            Some(value) => storage_uid_from_value(&value)?,
            None => return Err(missing_field("variants_storage")),
        };

        let variants_folder = match raw.variants_folder {
            Some(value) => folder_from_value(&value)?,
            None => return Err(missing_field("variants_folder")),
        };

        Ok(VariantsConfig {
            variants_storage,
            variants_folder,
        })
    }
}

fn missing_field(field: &str) -> FileVariantsError {
    FileVariantsError::Config(Box::new(ConfigError::MissingField {
        field: field.to_string(),
        section: EXTENSION_KEY.to_string(),
    }))
}

fn invalid_value(field: &str, value: String, expected: &str) -> FileVariantsError {
    FileVariantsError::Config(Box::new(ConfigError::InvalidValue {
        message: format!("Invalid value for '{field}'"),
        field: field.to_string(),
        value,
        expected: expected.to_string(),
    }))
}

// Host configurations deliver uids as numbers or numeric strings.
fn storage_uid_from_value(value: &serde_yaml::Value) -> Result<i64> {
    let uid = match value {
        serde_yaml::Value::Number(number) => number.as_i64(),
        serde_yaml::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    match uid {
        Some(uid) if uid >= 1 => Ok(uid),
        _ => Err(invalid_value(
            "variants_storage",
            yaml_value_display(value),
            "storage uid greater than zero",
        )),
    }
}

fn folder_from_value(value: &serde_yaml::Value) -> Result<String> {
    let folder = match value {
        serde_yaml::Value::String(text) => text.trim().trim_matches('/').to_string(),
        _ => String::new(),
    };

    if folder.is_empty() {
        return Err(invalid_value(
            "variants_folder",
            yaml_value_display(value),
            "non-empty storage-relative folder path",
        ));
    }

    Ok(folder)
}

fn yaml_value_display(value: &serde_yaml::Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}
