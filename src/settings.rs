use crate::error::SettingsError;
use crate::layout::{LayoutConfig, RankDirection};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub theme: ThemeSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimulationSettings {
    pub growth_speed_ms: Option<u64>,
    pub weather_period_ms: Option<u64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LayoutSettings {
    pub node_width: Option<f64>,
    pub node_height: Option<f64>,
    pub rank_sep: Option<f64>,
    pub node_sep: Option<f64>,
    pub direction: Option<RankDirection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThemeSettings {
    pub name: Option<String>,  // Theme id, e.g. "cherry-blossom"
}

impl Settings {
    /// Load the user's settings, falling back to defaults when the file is absent or broken.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring settings file");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termgrove")
            .join("config.toml")
    }

    pub fn layout_config(&self) -> LayoutConfig {
        let defaults = LayoutConfig::default();
        let l = &self.layout;
        LayoutConfig {
            node_width: l.node_width.filter(|w| *w > 0.0).unwrap_or(defaults.node_width),
            node_height: l.node_height.filter(|h| *h > 0.0).unwrap_or(defaults.node_height),
            rank_sep: l.rank_sep.filter(|s| *s >= 0.0).unwrap_or(defaults.rank_sep),
            node_sep: l.node_sep.filter(|s| *s >= 0.0).unwrap_or(defaults.node_sep),
            direction: l.direction.unwrap_or(defaults.direction),
            ..defaults
        }
    }
}
