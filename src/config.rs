use crate::schedule::LayoutConfig;
use crate::storage::DEFAULT_PREFIX;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub key_prefix: String,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub pixels_per_hour: f64,
    pub min_event_height: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            key_prefix: DEFAULT_PREFIX.to_string(),
            day_start_hour: 6,
            day_end_hour: 23,
            pixels_per_hour: 80.0,
            min_event_height: 40.0,
        }
    }
}

impl AppConfig {
    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            day_start_hour: self.day_start_hour.min(23),
            day_end_hour: self.day_end_hour.clamp(self.day_start_hour.min(23), 23),
            pixels_per_hour: self.pixels_per_hour,
            min_height: self.min_event_height,
        }
    }
}

pub fn load_config(dir: &Path) -> Result<AppConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig =
        serde_yaml::from_str(&data).with_context(|| format!("parsing {:?}", path))?;
    if config.key_prefix.trim().is_empty() {
        anyhow::bail!("{:?}: key_prefix must not be empty", path);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILE), "day_start_hour: 8\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.day_start_hour, 8);
        assert_eq!(config.key_prefix, "focusflow");
        assert_eq!(config.layout().min_height, 40.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILE), "day_start_hour: [nope\n").unwrap();
        assert!(load_config(dir.path()).is_err());
    }

    #[test]
    fn layout_clamps_hours() {
        let config = AppConfig {
            day_start_hour: 30,
            day_end_hour: 2,
            ..AppConfig::default()
        };
        let layout = config.layout();
        assert_eq!(layout.day_start_hour, 23);
        assert_eq!(layout.day_end_hour, 23);
    }
}
