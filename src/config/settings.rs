use crate::models::{FlagGrammar, HideDelays};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default settings embedded at compile time
const DEFAULT_SETTINGS: &str = include_str!("defaults.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid flag pattern: {0}")]
    FlagPattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub readiness: ReadinessSettings,
    pub clipboard: ClipboardSettings,
    pub submission: SubmissionSettings,
    pub lifecycle: LifecycleSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub protocol: String,
    pub request_timeout_ms: u64,
    /// Value of the dojo `session` cookie; requests are anonymous without it
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessSettings {
    pub interval_ms: u64,
    pub max_retries: u32,
    pub fallback_after: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipboardSettings {
    pub enabled: bool,
    pub poll_ms: u64,
    pub copy_check_delay_ms: u64,
    pub flag_pattern: String,
    pub max_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionSettings {
    pub debounce_ms: u64,
    pub detection_hide_ms: u64,
    pub clipboard_success_hide_ms: u64,
    pub manual_success_hide_ms: u64,
    pub error_hide_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleSettings {
    pub start_timeout_ms: u64,
    pub workspace_refetch_ms: u64,
}

impl ServerSettings {
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }

    pub fn api_base(&self) -> String {
        format!("{}/pwncollege_api/v1", self.origin())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ReadinessSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ClipboardSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn copy_check_delay(&self) -> Duration {
        Duration::from_millis(self.copy_check_delay_ms)
    }

    pub fn grammar(&self) -> Result<FlagGrammar, ConfigError> {
        Ok(FlagGrammar::new(&self.flag_pattern, self.max_len)?)
    }
}

impl SubmissionSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hide_delays(&self) -> HideDelays {
        HideDelays {
            detection: Duration::from_millis(self.detection_hide_ms),
            clipboard_success: Duration::from_millis(self.clipboard_success_hide_ms),
            manual_success: Duration::from_millis(self.manual_success_hide_ms),
            error: Duration::from_millis(self.error_hide_ms),
        }
    }
}

impl LifecycleSettings {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn workspace_refetch(&self) -> Duration {
        Duration::from_millis(self.workspace_refetch_ms)
    }
}

impl Settings {
    /// Parse settings, with `overlay` keys replacing the embedded defaults
    pub fn from_overlay(overlay: Option<&str>) -> Result<Self, ConfigError> {
        let mut base: toml::Value = toml::from_str(DEFAULT_SETTINGS)?;
        if let Some(overlay) = overlay {
            let overlay: toml::Value = toml::from_str(overlay)?;
            merge(&mut base, overlay);
        }
        let settings: Settings = base.try_into()?;
        // Surface a bad pattern at load time rather than on first clipboard read
        settings.clipboard.grammar()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Self::from_overlay(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_overlay(Some(&contents))
    }

    /// Load the user's settings file, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&user_config_path())
    }
}

#[cfg(test)]
impl Default for Settings {
    fn default() -> Self {
        Self::from_overlay(None).expect("embedded defaults are valid")
    }
}

fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dojo-workbench")
}

/// Get the path to the user's settings file
pub fn user_config_path() -> PathBuf {
    config_dir().join("config.toml")
}
