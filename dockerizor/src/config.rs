use log::{debug, info};
use serde_json::{json, Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    context::GeneratedFile,
    error::{Error, Result},
};

pub const APP_CONFIG_FILE: &str = "dockerizor.json";
pub const CENTER_CONFIG_FILE: &str = "dockerizor-center.json";

/// Answers remembered between runs, addressed by JSON pointer
/// (`/app_name`, `/extra_packages`).
///
/// The file is laid over a defaults document on load, so keys missing from
/// an older file still resolve. Unknown keys are kept as they are.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolConfig {
    /// File name relative to the working directory.
    pub path: PathBuf,
    values: Value,
}

impl ToolConfig {
    pub fn app(workdir: &Path) -> Result<ToolConfig> {
        ToolConfig::load(
            workdir,
            APP_CONFIG_FILE,
            json!({
                "app_name": null,
                "domain": null,
                "port": null,
                "database_system": null,
                "database_url": null,
                "database_name": null,
                "root_directory": null,
                "extra_extensions": [],
                "extra_packages": [],
            }),
        )
    }

    pub fn center(workdir: &Path) -> Result<ToolConfig> {
        ToolConfig::load(workdir, CENTER_CONFIG_FILE, json!({ "wildcard": null }))
    }

    pub fn load<P: Into<PathBuf>>(workdir: &Path, path: P, defaults: Value) -> Result<ToolConfig> {
        let path = path.into();
        let full_path = workdir.join(&path);

        let values = if full_path.exists() {
            info!("loading configuration {:?}", full_path);
            let text = fs::read_to_string(&full_path)?;
            let saved: Value = serde_json::from_str(&text)
                .map_err(|err| Error::format(format!("{:?}: {}", full_path, err)))?;
            merge(&defaults, &saved)
        } else {
            debug!("no configuration at {:?}, using defaults", full_path);
            defaults
        };

        Ok(ToolConfig { path, values })
    }

    /// The value at `pointer`; `null` counts as absent.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.values.pointer(pointer).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.get(pointer).and_then(Value::as_str)
    }

    pub fn get_port(&self, pointer: &str) -> Option<u16> {
        match self.get(pointer)? {
            Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// String items of the array at `pointer`, skipping anything else.
    pub fn get_strings(&self, pointer: &str) -> Vec<String> {
        self.get(pointer)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stores `value` at `pointer`, creating intermediate objects. A
    /// non-object on the way is replaced.
    pub fn set<V: Into<Value>>(&mut self, pointer: &str, value: V) -> Result<&mut Self> {
        let tokens = pointer
            .strip_prefix('/')
            .ok_or_else(|| Error::format(format!("invalid json pointer {:?}", pointer)))?
            .split('/')
            .map(|token| token.replace("~1", "/").replace("~0", "~"))
            .collect::<Vec<_>>();

        let mut current = &mut self.values;
        for token in tokens {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let map = current
                .as_object_mut()
                .ok_or_else(|| Error::format(format!("cannot descend into {:?}", pointer)))?;
            current = map.entry(token).or_insert(Value::Null);
        }
        *current = value.into();

        Ok(self)
    }

    pub fn to_file(&self) -> Result<GeneratedFile> {
        let mut contents = serde_json::to_string_pretty(&self.values)?;
        contents.push('\n');
        Ok(GeneratedFile::new(self.path.clone(), contents))
    }
}

/// Object keys merge recursively and `update` wins everywhere else.
fn merge(base: &Value, update: &Value) -> Value {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            let mut result = base_map.clone();
            for (key, value) in update_map.iter() {
                let merged = match base_map.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Value::Object(result)
        }
        _ => update.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolConfig::app(dir.path()).unwrap();

        assert_eq!(config.get("/app_name"), None);
        assert!(config.get_strings("/extra_packages").is_empty());
        assert_eq!(config.path, PathBuf::from(APP_CONFIG_FILE));
    }

    #[test]
    fn saved_values_win_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(APP_CONFIG_FILE),
            r#"{"app_name": "shop", "port": "8081", "extra_packages": ["git"], "custom": {"a": 1}}"#,
        )
        .unwrap();

        let config = ToolConfig::app(dir.path()).unwrap();

        assert_eq!(config.get_str("/app_name"), Some("shop"));
        assert_eq!(config.get_port("/port"), Some(8081));
        assert_eq!(config.get_strings("/extra_packages"), ["git"]);
        assert!(config.get_strings("/extra_extensions").is_empty());
        assert_eq!(config.get("/custom/a"), Some(&json!(1)));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ToolConfig::center(dir.path()).unwrap();

        config
            .set("/wildcard", "apps.test")
            .unwrap()
            .set("/services/mariadb~110", json!({"version": "10.5"}))
            .unwrap();

        assert_eq!(config.get_str("/wildcard"), Some("apps.test"));
        assert_eq!(config.get_str("/services/mariadb~110/version"), Some("10.5"));
        assert!(config.set("wildcard", "x").is_err());
    }

    #[test]
    fn file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ToolConfig::app(dir.path()).unwrap();
        config.set("/port", 8000).unwrap();

        let file = config.to_file().unwrap();
        fs::write(dir.path().join(&file.path), &file.contents).unwrap();

        assert_eq!(ToolConfig::app(dir.path()).unwrap(), config);
    }

    #[test]
    fn broken_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CENTER_CONFIG_FILE), "{").unwrap();

        assert!(matches!(ToolConfig::center(dir.path()), Err(Error::Format(_))));
    }
}
