mod settings;

pub use settings::{
    config_dir, user_config_path, ClipboardSettings, ConfigError, LifecycleSettings,
    ReadinessSettings, ServerSettings, Settings, SubmissionSettings,
};
