use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::warn;

use crate::{error::SettingsError, geometry::PlaybackGeometry};

pub const DEFAULT_SETTINGS_FILE: &str = "bookmark_list.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Viewport width assumed until the host reports a real one.
    pub viewport_width: f64,
    pub shown_size: usize,
    pub detail_path_prefix: String,
    pub share_min_width: f64,
    pub event_capacity: usize,
    pub playback: PlaybackGeometry,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            shown_size: 30,
            detail_path_prefix: "./personal/bookmarks".into(),
            share_min_width: 380.0,
            event_capacity: 16,
            playback: PlaybackGeometry::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.shown_size == 0 {
            return Err(SettingsError::Invalid {
                key: "shown_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(SettingsError::Invalid {
                key: "event_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.playback.aspect_width.is_nan() || self.playback.aspect_width <= 0.0 {
            return Err(SettingsError::Invalid {
                key: "playback.aspect_width",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Applies `APP__*` overrides. Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("APP__VIEWPORT_WIDTH") {
            match v.parse::<f64>() {
                Ok(parsed) => self.viewport_width = parsed,
                Err(_) => warn!(value = %v, "config: ignoring invalid APP__VIEWPORT_WIDTH"),
            }
        }
        if let Some(v) = lookup("APP__SHOWN_SIZE") {
            match v.parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.shown_size = parsed,
                _ => warn!(value = %v, "config: ignoring invalid APP__SHOWN_SIZE"),
            }
        }
        if let Some(v) = lookup("APP__DETAIL_PATH_PREFIX") {
            self.detail_path_prefix = v;
        }
    }
}

/// Defaults, then the settings file if one exists, then the environment.
pub fn load_settings() -> Settings {
    let path = std::env::var("APP__SETTINGS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    load_settings_from(&path, |key| std::env::var(key).ok())
}

pub fn load_settings_from(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = if path.exists() {
        match Settings::from_file(path) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "config: falling back to default settings");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    };
    settings.apply_overrides(lookup);
    settings
}
