//! Settings for the Tasker automation agent.
//! Persisted in the platform-specific config directory via `directories::ProjectDirs`,
//! then overlaid by environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adb::DEFAULT_TASK_ACTION;
use crate::config::TASKER_PACKAGE;
use crate::model::ModelConfig;

/// Configuration errors. All of these are fatal and raised before any
/// device or model call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Device identifier is not set (DEVICE_SERIAL)")]
    MissingDeviceId,
    #[error("Model credentials are not set ({0})")]
    MissingCredentials(&'static str),
    #[error("Invalid screen size {0}x{1}")]
    InvalidScreenSize(u32, u32),
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Settings IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// ADB device serial
    pub device_id: String,
    /// Device screen width in pixels
    pub screen_width: u32,
    /// Device screen height in pixels
    pub screen_height: u32,
    /// Vision model API base URL
    pub base_url: String,
    /// Vision model API key
    pub api_key: String,
    /// Vision model name
    pub model_name: String,
    /// Planner model API base URL (falls back to the vision model)
    pub planner_base_url: String,
    /// Planner model API key (falls back to the vision model)
    pub planner_api_key: String,
    /// Planner model name (falls back to the vision model)
    pub planner_model_name: String,
    /// Package the navigator keeps in the foreground
    pub target_package: String,
    /// Broadcast action used to run tasks
    pub task_action: String,
    /// Where the latest capture is written
    pub screenshot_path: String,
    /// Timeout for a single ADB command in seconds
    pub command_timeout_secs: u64,
    /// Timeout for a single model request in seconds
    pub model_timeout_secs: u64,
    /// Maximum HTTP retries for model requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    /// Deadline for a whole workflow in seconds, 0 disables it
    pub workflow_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            screen_width: 1080,
            screen_height: 2400,
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key: String::new(),
            model_name: "gemini-2.5-flash".to_string(),
            planner_base_url: String::new(),
            planner_api_key: String::new(),
            planner_model_name: String::new(),
            target_package: TASKER_PACKAGE.to_string(),
            task_action: DEFAULT_TASK_ACTION.to_string(),
            screenshot_path: "current_screen.png".to_string(),
            command_timeout_secs: 15,
            model_timeout_secs: 60,
            max_retries: 3,
            retry_delay: 2,
            workflow_timeout_secs: 0,
        }
    }
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "vision-tasker", "vision-tasker")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file. Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::settings_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source.
    pub fn apply_vars<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |keys: &[&str]| keys.iter().find_map(|k| var(k).filter(|v| !v.is_empty()));

        if let Some(v) = text(&["DEVICE_SERIAL", "ADB_DEVICE_ID"]) {
            self.device_id = v;
        }
        if let Some(v) = text(&["MODEL_BASE_URL"]) {
            self.base_url = v;
        }
        if let Some(v) = text(&["MODEL_API_KEY", "GOOGLE_API_KEY"]) {
            self.api_key = v;
        }
        if let Some(v) = text(&["MODEL_NAME"]) {
            self.model_name = v;
        }
        if let Some(v) = text(&["PLANNER_MODEL_BASE_URL"]) {
            self.planner_base_url = v;
        }
        if let Some(v) = text(&["PLANNER_MODEL_API_KEY"]) {
            self.planner_api_key = v;
        }
        if let Some(v) = text(&["PLANNER_MODEL_NAME"]) {
            self.planner_model_name = v;
        }
        if let Some(v) = text(&["TARGET_PACKAGE"]) {
            self.target_package = v;
        }
        if let Some(v) = text(&["TASK_ACTION"]) {
            self.task_action = v;
        }
        if let Some(v) = text(&["SCREENSHOT_PATH"]) {
            self.screenshot_path = v;
        }

        let number = |key: &str| var(key).and_then(|s| s.trim().parse::<u64>().ok());
        // out-of-range values are ignored, never truncated
        let small = |key: &str| var(key).and_then(|s| s.trim().parse::<u32>().ok());

        if let Some(v) = small("DEVICE_WIDTH") {
            self.screen_width = v;
        }
        if let Some(v) = small("DEVICE_HEIGHT") {
            self.screen_height = v;
        }
        if let Some(v) = number("ADB_COMMAND_TIMEOUT") {
            self.command_timeout_secs = v;
        }
        if let Some(v) = number("MODEL_TIMEOUT") {
            self.model_timeout_secs = v;
        }
        if let Some(v) = small("MODEL_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = number("MODEL_RETRY_DELAY") {
            self.retry_delay = v;
        }
        if let Some(v) = number("WORKFLOW_TIMEOUT") {
            self.workflow_timeout_secs = v;
        }

        self
    }

    /// Check everything required before touching the device or a model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::MissingDeviceId);
        }
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ConfigError::InvalidScreenSize(
                self.screen_width,
                self.screen_height,
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("MODEL_API_KEY"));
        }
        Ok(())
    }

    /// Planner endpoint, model and key, each defaulting to the vision model's.
    pub fn planner_endpoint(&self) -> (String, String, String) {
        let pick = |own: &str, fallback: &str| {
            if own.is_empty() {
                fallback.to_string()
            } else {
                own.to_string()
            }
        };
        (
            pick(&self.planner_base_url, &self.base_url),
            pick(&self.planner_api_key, &self.api_key),
            pick(&self.planner_model_name, &self.model_name),
        )
    }

    /// Client configuration for the vision model.
    pub fn vision_model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
            .with_timeout(self.model_timeout_secs)
    }

    /// Client configuration for the planner, sharing the vision model's limits.
    pub fn planner_model_config(&self) -> ModelConfig {
        let (base_url, api_key, model_name) = self.planner_endpoint();
        self.vision_model_config()
            .with_base_url(base_url)
            .with_api_key(api_key)
            .with_model_name(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_fail_validation_without_device() {
        let err = AppSettings::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingDeviceId));
    }

    #[test]
    fn test_missing_credentials() {
        let settings = AppSettings::default().apply_vars(vars(&[("DEVICE_SERIAL", "abc")]));
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
    }

    #[test]
    fn test_env_overlay() {
        let settings = AppSettings::default().apply_vars(vars(&[
            ("DEVICE_SERIAL", "38181FDJH00ABC"),
            ("GOOGLE_API_KEY", "secret"),
            ("DEVICE_WIDTH", "1344"),
            ("DEVICE_HEIGHT", "2992"),
            ("MODEL_TIMEOUT", "not-a-number"),
        ]));

        assert_eq!(settings.device_id, "38181FDJH00ABC");
        assert_eq!(settings.api_key, "secret");
        assert_eq!((settings.screen_width, settings.screen_height), (1344, 2992));
        assert_eq!(settings.model_timeout_secs, 60);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_numbers_are_ignored() {
        let settings = AppSettings::default().apply_vars(vars(&[
            ("DEVICE_WIDTH", "4294968376"),
            ("DEVICE_HEIGHT", "-1"),
            ("MODEL_MAX_RETRIES", "4294967296"),
        ]));

        assert_eq!((settings.screen_width, settings.screen_height), (1080, 2400));
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn test_model_api_key_wins_over_google_key() {
        let settings = AppSettings::default().apply_vars(vars(&[
            ("MODEL_API_KEY", "primary"),
            ("GOOGLE_API_KEY", "fallback"),
        ]));
        assert_eq!(settings.api_key, "primary");
    }

    #[test]
    fn test_zero_screen_size_rejected() {
        let settings = AppSettings {
            device_id: "abc".to_string(),
            api_key: "k".to_string(),
            screen_width: 0,
            ..AppSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidScreenSize(0, 2400))
        ));
    }

    #[test]
    fn test_planner_endpoint_falls_back() {
        let settings = AppSettings {
            api_key: "k".to_string(),
            planner_model_name: "planner-model".to_string(),
            ..AppSettings::default()
        };
        let (base_url, api_key, model) = settings.planner_endpoint();
        assert_eq!(base_url, settings.base_url);
        assert_eq!(api_key, "k");
        assert_eq!(model, "planner-model");

        let planner = settings.planner_model_config();
        assert_eq!(planner.model_name, "planner-model");
        assert_eq!(planner.api_key, "k");
        assert_eq!(planner.max_retries, settings.max_retries);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            device_id: "emulator-5554".to_string(),
            workflow_timeout_secs: 90,
            ..AppSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn test_load_partial_file_backfills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"device_id": "abc"}"#).unwrap();

        let loaded = AppSettings::load_from(&path);
        assert_eq!(loaded.device_id, "abc");
        assert_eq!(loaded.screen_height, 2400);
    }
}
