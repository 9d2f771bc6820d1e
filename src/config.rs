use crate::event::DEFAULT_TITLE;
use crate::export::{ExportSettings, UnparseablePolicy};
use crate::parser::time_token::parse_clock;
use crate::parser::ParserDefaults;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 5000 }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub default_duration_minutes: i64,
    /// `HH:MM`, used when a phrase names a day but no time
    pub default_start_time: String,
    pub placeholder_title: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            default_start_time: "09:00".to_string(),
            placeholder_title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ParserConfig {
    pub fn defaults(&self) -> ParserDefaults {
        let fallback = ParserDefaults::default();
        let start_time = match parse_clock(&self.default_start_time) {
            Some(time) => time,
            None => {
                warn!(
                    "Invalid default_start_time '{}', using {}",
                    self.default_start_time,
                    fallback.start_time.format("%H:%M")
                );
                fallback.start_time
            }
        };
        let placeholder_title = if self.placeholder_title.trim().is_empty() {
            fallback.placeholder_title
        } else {
            self.placeholder_title.clone()
        };
        ParserDefaults {
            duration_minutes: self.default_duration_minutes,
            start_time,
            placeholder_title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where `.ics` files are written; `./exports` when unset
    pub directory: Option<PathBuf>,
    pub calendar_name: Option<String>,
    pub on_unparseable: UnparseablePolicy,
    pub default_duration_minutes: i64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: None,
            calendar_name: Some("CalendMe Schedule".to_string()),
            on_unparseable: UnparseablePolicy::Skip,
            default_duration_minutes: 60,
        }
    }
}

impl ExportConfig {
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| PathBuf::from("exports"))
    }

    pub fn settings(&self) -> ExportSettings {
        ExportSettings {
            policy: self.on_unparseable,
            default_duration_minutes: self.default_duration_minutes,
            calendar_name: self.calendar_name.clone(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    /// Load from `path`, writing the defaults there first if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Config::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "calendme", "calendme")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}
