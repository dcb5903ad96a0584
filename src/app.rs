use clap::Parser;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, ConfigError};
use crate::forms::DEFAULT_TEMPLATE_LANGUAGE;

fn default_poll_interval() -> u64 {
    5
}

fn default_template_language() -> String {
    DEFAULT_TEMPLATE_LANGUAGE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Pre-fills the PHONE_NUMBER_ID of both the chat and campaign forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_template_language")]
    pub template_language: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            email: None,
            phone_number_id: None,
            poll_interval_secs: default_poll_interval(),
            template_language: default_template_language(),
        }
    }
}

impl AppState {
    pub fn default_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("wa-console").join("config.toml"))
    }

    /// Reads the config at `path`. A missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            log::warn!("no config directory, starting with defaults");
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("ignoring config {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn has_server(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// Applies command line / environment overrides on top of the file.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(url) = &cli.base_url {
            self.base_url = crate::utils::normalize_url(url);
        } else {
            self.base_url = crate::utils::normalize_url(&self.base_url);
        }
        if let Some(token) = &cli.token {
            self.token = Some(token.clone());
        }
        if let Some(secs) = cli.poll_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(phone) = &cli.phone_number_id {
            self.phone_number_id = Some(phone.clone());
        }
    }
}

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "wa-console", version, about = "Conversations and campaigns for a WhatsApp API")]
pub struct Cli {
    /// Server base URL, e.g. https://console.example.com
    #[arg(long, env = "WA_CONSOLE_BASE_URL")]
    pub base_url: Option<String>,
    /// Bearer token; skips the login prompt
    #[arg(long, env = "WA_CONSOLE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// PHONE_NUMBER_ID used to pre-fill both forms
    #[arg(long, env = "WA_CONSOLE_PHONE_NUMBER_ID")]
    pub phone_number_id: Option<String>,
    /// Config file (defaults to the user config dir)
    #[arg(long, env = "WA_CONSOLE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Seconds between polls
    #[arg(long, env = "WA_CONSOLE_POLL_SECS")]
    pub poll_secs: Option<u64>,
}

/// Startup routing: log in first when there is no token, then open the
/// console.
pub fn run(cli: Cli) -> Result<(), AppError> {
    let config_path = cli.config.clone();
    let mut state = AppState::load(config_path.as_deref());
    state.apply(&cli);
    if !state.has_server() {
        state.base_url = crate::utils::normalize_url(&crate::ui::login::prompt_line("Server URL: ")?);
    }
    if state.token.is_none() {
        crate::ui::login::login_interactive(&mut state, config_path.as_deref())?;
    }
    crate::ui::main_window::show_main_window(state, config_path)
}
