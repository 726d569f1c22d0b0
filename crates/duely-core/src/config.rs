use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::TimeDelta;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::filter::FilterMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data_location: String,
    pub color: bool,
    pub default_filter: FilterMode,
    pub reminder: ReminderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_location: "~/.duely".to_string(),
            color: true,
            default_filter: FilterMode::All,
            reminder: ReminderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReminderConfig {
    pub tick_secs: u64,
    pub window_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            window_secs: 60,
        }
    }
}

impl ReminderConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn window(&self) -> TimeDelta {
        let secs = i64::try_from(self.window_secs).unwrap_or(i64::MAX);
        TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX)
    }
}

impl Config {
    #[tracing::instrument(skip(override_path))]
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = resolve_config_path(override_path) else {
            warn!("no config file found; using defaults");
            return Ok(Self::default());
        };

        info!(config = %path.display(), "loading config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            debug!(key = %key, value = %value, "applying override");
            match key.as_str() {
                "data_location" => self.data_location = value,
                "color" => self.color = parse_bool(&value),
                "default_filter" => self.default_filter = value.parse()?,
                "reminder.tick_secs" => {
                    self.reminder.tick_secs = value
                        .parse()
                        .with_context(|| format!("invalid reminder.tick_secs: {value}"))?;
                }
                "reminder.window_secs" => {
                    self.reminder.window_secs = value
                        .parse()
                        .with_context(|| format!("invalid reminder.window_secs: {value}"))?;
                }
                other => return Err(anyhow!("unknown config key: {other}")),
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else {
        expand_tilde(Path::new(&cfg.data_location))
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("DUELY_CONFIG") {
        if env_path == "/dev/null" {
            return None;
        }
        return Some(PathBuf::from(env_path));
    }

    let candidate = dirs::config_dir()?.join("duely").join("config.toml");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}
