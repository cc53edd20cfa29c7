// Configuration loader for RecoBattle
//
// This module handles loading configuration from the TOML configuration file
// and environment variables with appropriate precedence.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use toml::Value;

const CONFIG_FILE_PATH: &str = "recobattle.conf";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "RECOBATTLE_CONFIG";

/// Loads configuration from TOML file and environment variables
///
/// Configuration precedence (highest to lowest):
/// 1. Environment variables
/// 2. Configuration file values
/// 3. Default values (applied by `config_validator`)
///
/// # Returns
///
/// Returns true if the config file was successfully loaded, false otherwise
pub fn load_config() -> bool {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE_PATH.to_string());
    let config_path = Path::new(&path);

    if !config_path.exists() {
        debug!("Configuration file not found at: {}", path);
        return false;
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read configuration file {}: {}", path, e);
            return false;
        }
    };

    let config_map = match parse_flat_toml(&config_content) {
        Some(map) => map,
        None => return false,
    };

    // Set environment variables from config file if they don't already exist
    for (key, value) in config_map {
        if env::var(&key).is_err() {
            debug!("Setting env var from config file: {}", key);
            env::set_var(key, value);
        } else {
            debug!("Env var already exists, skipping: {}", key);
        }
    }

    info!("Configuration loaded from {}", path);
    true
}

/// Convert a flat TOML document into key/value strings.
///
/// Arrays and nested tables are skipped. Returns `None` when the content is not
/// valid TOML.
pub fn parse_flat_toml(content: &str) -> Option<HashMap<String, String>> {
    let config_values: Value = match content.parse() {
        Ok(values) => values,
        Err(e) => {
            warn!("Failed to parse configuration file: {}", e);
            return None;
        }
    };

    let mut config_map = HashMap::new();

    if let Value::Table(table) = config_values {
        for (key, value) in table {
            match value {
                Value::String(s) => {
                    config_map.insert(key, s);
                }
                Value::Integer(i) => {
                    config_map.insert(key, i.to_string());
                }
                Value::Float(f) => {
                    config_map.insert(key, f.to_string());
                }
                Value::Boolean(b) => {
                    config_map.insert(key, b.to_string());
                }
                _ => {
                    warn!("Skipping unsupported TOML value type for key: {}", key);
                }
            }
        }
    }

    Some(config_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_values_become_strings() {
        let map = parse_flat_toml(
            r#"
RECOBATTLE_API_PORT = 9090
ENABLE_AUTHORIZATION = false
YANDEX_LANGUAGE = "en-US"
"#,
        )
        .unwrap();
        assert_eq!(map.get("RECOBATTLE_API_PORT").map(String::as_str), Some("9090"));
        assert_eq!(map.get("ENABLE_AUTHORIZATION").map(String::as_str), Some("false"));
        assert_eq!(map.get("YANDEX_LANGUAGE").map(String::as_str), Some("en-US"));
    }

    #[test]
    fn test_nested_values_are_skipped() {
        let map = parse_flat_toml(
            r#"
MAX_FILE_SIZE = 1024
LIST = [1, 2]

[section]
KEY = "value"
"#,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("MAX_FILE_SIZE"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(parse_flat_toml("this is = = not toml").is_none());
    }
}
