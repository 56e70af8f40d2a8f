use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Embedded view into the running sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    #[default]
    Terminal,
    Code,
    Desktop,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Terminal, Service::Code, Service::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Terminal => "terminal",
            Service::Code => "code",
            Service::Desktop => "desktop",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Terminal => "Terminal",
            Service::Code => "Code",
            Service::Desktop => "Desktop",
        }
    }

    /// Shown while the readiness prober is still waiting
    pub fn loading_hint(&self) -> &'static str {
        match self {
            Service::Terminal => "Initializing terminal session",
            Service::Code => "Starting VS Code environment",
            Service::Desktop => "Setting up desktop environment",
        }
    }

    /// Cycle to the next service (Tab in the TUI)
    pub fn next(&self) -> Service {
        match self {
            Service::Terminal => Service::Code,
            Service::Code => Service::Desktop,
            Service::Desktop => Service::Terminal,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "terminal" => Ok(Service::Terminal),
            "code" | "vscode" => Ok(Service::Code),
            "desktop" => Ok(Service::Desktop),
            other => Err(format!("unknown service: {other}")),
        }
    }
}
