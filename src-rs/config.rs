//! Viewer configuration: optional JSON file, then environment, then command-line flags.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::nav::Location;
use crate::store::DEFAULT_RECORD_ID;

const DEFAULT_RECORD_STORE: &str = "./json";
const DEFAULT_BASE_LOCATION: &str = "http://localhost/";
const DEFAULT_OUT_DIR: &str = ".addi-view";

pub const RECORD_STORE_ENV: &str = "ADDI_RECORD_STORE";
pub const DEFAULT_ID_ENV: &str = "ADDI_DEFAULT_ID";
pub const BASE_LOCATION_ENV: &str = "ADDI_BASE_LOCATION";
pub const OUT_DIR_ENV: &str = "ADDI_OUT_DIR";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ViewerConfigFile {
    record_store: Option<String>,
    default_id: Option<String>,
    base_location: Option<String>,
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Directory or `http(s)://` base holding `<id>.json` records.
    pub record_store: String,
    /// Record shown when the location names none.
    pub default_id: String,
    /// Location the viewer starts from; its `id` parameter selects the record.
    pub base_location: String,
    /// Where generated renders go when no output path is given.
    pub out_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::from_file(ViewerConfigFile::default())
    }
}

impl ViewerConfig {
    /// Defaults, overlaid by the file at `path`, overlaid by the `ADDI_*` environment
    /// variables. Callers validate once their own overrides are applied.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ViewerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env();
        Ok(cfg)
    }

    fn from_file(file: ViewerConfigFile) -> Self {
        Self {
            record_store: file
                .record_store
                .unwrap_or_else(|| DEFAULT_RECORD_STORE.to_string()),
            default_id: file
                .default_id
                .unwrap_or_else(|| DEFAULT_RECORD_ID.to_string()),
            base_location: file
                .base_location
                .unwrap_or_else(|| DEFAULT_BASE_LOCATION.to_string()),
            out_dir: file
                .out_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
        }
    }

    fn apply_env(&mut self) {
        if let Some(store) = non_blank_env(RECORD_STORE_ENV) {
            self.record_store = store;
        }
        if let Some(id) = non_blank_env(DEFAULT_ID_ENV) {
            self.default_id = id;
        }
        if let Some(location) = non_blank_env(BASE_LOCATION_ENV) {
            self.base_location = location;
        }
        if let Some(dir) = non_blank_env(OUT_DIR_ENV) {
            self.out_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_id.trim().is_empty() {
            return Err(anyhow!("default_id must not be empty"));
        }
        if self.record_store.trim().is_empty() {
            return Err(anyhow!("record_store must not be empty"));
        }
        Location::parse(&self.base_location).context("base_location must be an absolute URL")?;
        Ok(())
    }

    pub fn location(&self) -> Result<Location> {
        Location::parse(&self.base_location)
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ViewerConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config JSON: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ViewerConfig::default();
        assert_eq!(cfg.default_id, "2017877547");
        assert_eq!(cfg.record_store, "./json");
        cfg.validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults() {
        let file: ViewerConfigFile =
            serde_json::from_str(r#"{"record_store": "https://example.org/json", "default_id": "7"}"#)
                .unwrap();
        let cfg = ViewerConfig::from_file(file);
        assert_eq!(cfg.record_store, "https://example.org/json");
        assert_eq!(cfg.default_id, "7");
        assert_eq!(cfg.base_location, DEFAULT_BASE_LOCATION);
    }

    #[test]
    fn config_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        fs::write(&path, r#"{"out_dir": "renders", "base_location": "http://example.org/view"}"#)
            .unwrap();
        let cfg = ViewerConfig::load_from(Some(&path)).unwrap();
        assert_eq!(cfg.out_dir, PathBuf::from("renders"));
        assert_eq!(cfg.location().unwrap().current_id(), None);
        assert!(ViewerConfig::load_from(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_locations() {
        assert!(serde_json::from_str::<ViewerConfigFile>(r#"{"opacity": 3}"#).is_err());
        let cfg = ViewerConfig {
            base_location: "not a url".to_string(),
            ..ViewerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
