use crate::config;
use crate::models::Service;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User preferences that outlive a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub preferred_service: Service,
    #[serde(default = "default_clipboard_monitoring")]
    pub clipboard_monitoring: bool,
}

fn default_clipboard_monitoring() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            preferred_service: Service::Terminal,
            clipboard_monitoring: true,
        }
    }
}

/// Durable storage for the preferred service
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// JSON file under the user's config directory
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Self {
        Self::new(config::config_dir().join("preferences.json"))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        let preferences: Preferences = serde_json::from_str(&contents)?;
        Ok(preferences)
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            // Create directory if it doesn't exist
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let contents = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryPreferenceStore;

#[cfg(test)]
mod memory {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store; `failing` simulates a read-only disk
    #[derive(Default)]
    pub struct MemoryPreferenceStore {
        pub saved: Mutex<Option<Preferences>>,
        pub failing: bool,
    }

    impl MemoryPreferenceStore {
        pub fn failing() -> Self {
            Self {
                saved: Mutex::new(None),
                failing: true,
            }
        }

        pub fn with(preferences: Preferences) -> Self {
            Self {
                saved: Mutex::new(Some(preferences)),
                failing: false,
            }
        }
    }

    impl PreferenceStore for MemoryPreferenceStore {
        fn load(&self) -> Result<Preferences> {
            if self.failing {
                anyhow::bail!("preferences unavailable");
            }
            Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
        }

        fn save(&self, preferences: &Preferences) -> Result<()> {
            if self.failing {
                anyhow::bail!("preferences are read-only");
            }
            *self.saved.lock().unwrap() = Some(preferences.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("preferences.json"));
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("nested").join("preferences.json"));
        let preferences = Preferences {
            preferred_service: Service::Desktop,
            clipboard_monitoring: false,
        };
        store.save(&preferences).unwrap();
        assert_eq!(store.load().unwrap(), preferences);
    }

    #[test]
    fn test_older_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"preferred_service":"code"}"#).unwrap();
        let loaded = FilePreferenceStore::new(path).load().unwrap();
        assert_eq!(loaded.preferred_service, Service::Code);
        assert!(loaded.clipboard_monitoring);
    }
}
