// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! Settings are read from a YAML file. The path comes from the
//! `MANGAVOX_CONFIG` environment variable, falling back to `mangavox.yaml`
//! in the working directory. A missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MANGAVOX_CONFIG";

/// Default configuration file name.
pub const CONFIG_FILE: &str = "mangavox.yaml";

/// Canvas and interaction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    /// Height kept free below the image for the floating toolbar.
    pub toolbar_reserve: f64,
    /// Drawn regions must exceed this size on both axes.
    pub min_region_size: f64,
    /// Secondary presses shorter than this (without movement) open the context menu.
    pub context_menu_ms: u64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 20.0,
            zoom_step: 0.1,
            toolbar_reserve: 55.0,
            min_region_size: 10.0,
            context_menu_ms: 250,
        }
    }
}

impl CanvasConfig {
    /// Replace values the viewport cannot work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |value: f64| value.is_finite() && value > 0.0;

        if !positive(self.min_zoom) {
            self.min_zoom = defaults.min_zoom;
        }
        if !positive(self.max_zoom) {
            self.max_zoom = defaults.max_zoom.max(self.min_zoom);
        }
        if self.max_zoom < self.min_zoom {
            self.max_zoom = self.min_zoom;
        }
        if !positive(self.zoom_step) {
            self.zoom_step = defaults.zoom_step;
        }
        if !self.toolbar_reserve.is_finite() || self.toolbar_reserve < 0.0 {
            self.toolbar_reserve = defaults.toolbar_reserve;
        }
        if !self.min_region_size.is_finite() || self.min_region_size < 0.0 {
            self.min_region_size = defaults.min_region_size;
        }
        self
    }
}

/// Undo/redo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_size: usize,
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            debounce_ms: 200,
        }
    }
}

/// Sidecar persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub default_voice: String,
    pub concurrency: usize,
    /// Synthesis program, e.g. `edge-tts`.
    pub command: String,
    /// Arguments with `{text}`, `{voice}` and `{output}` placeholders.
    pub args: Vec<String>,
    /// Bitrate used to estimate clip durations.
    pub bitrate_kbps: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_voice: "zh-CN-XiaoxiaoNeural".to_string(),
            concurrency: 2,
            command: "edge-tts".to_string(),
            args: vec![
                "--voice".to_string(),
                "{voice}".to_string(),
                "--text".to_string(),
                "{text}".to_string(),
                "--write-media".to_string(),
                "{output}".to_string(),
            ],
            bitrate_kbps: 48,
        }
    }
}

/// Narration playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Clip player program, e.g. `ffplay`.
    pub command: String,
    /// Arguments with a `{file}` placeholder.
    pub args: Vec<String>,
    /// Pause held for a detail without audio, in seconds.
    pub gap_seconds: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command: "ffplay".to_string(),
            args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
                "{file}".to_string(),
            ],
            gap_seconds: 3.0,
        }
    }
}

/// OCR response import settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Preferred language key when a response carries several translations.
    pub target_lang: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_lang: "CHS".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub canvas: CanvasConfig,
    pub history: HistoryConfig,
    pub persistence: PersistenceConfig,
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub detector: DetectorConfig,
}

impl AppConfig {
    /// Resolve the configuration file path.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&yaml)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config.sanitized())
    }

    /// Repair values the app cannot work with.
    fn sanitized(mut self) -> Self {
        self.canvas = self.canvas.sanitized();
        self.history.max_size = self.history.max_size.max(1);
        self.audio.concurrency = self.audio.concurrency.max(1);
        if !self.playback.gap_seconds.is_finite() || self.playback.gap_seconds < 0.0 {
            self.playback.gap_seconds = PlaybackConfig::default().gap_seconds;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("none.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.canvas.max_zoom, 20.0);
        assert_eq!(config.history.max_size, 50);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mangavox.yaml");
        std::fs::write(&path, "canvas:\n  max_zoom: 8\naudio:\n  concurrency: 0\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.canvas.max_zoom, 8.0);
        assert_eq!(config.canvas.min_zoom, 0.1);
        assert_eq!(config.audio.concurrency, 1);
        assert_eq!(config.persistence.debounce_ms, 500);
    }

    #[test]
    fn test_non_finite_canvas_values_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mangavox.yaml");
        std::fs::write(
            &path,
            "canvas:\n  min_zoom: .nan\n  max_zoom: .nan\n  zoom_step: .inf\n  toolbar_reserve: -.inf\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.canvas, CanvasConfig::default());

        let mut viewport = crate::canvas::viewport::Viewport::new(
            &config.canvas,
            crate::canvas::events::EventBus::new(),
        );
        viewport.set_surface_size(800.0, 600.0);
        assert!(viewport.set_zoom(2.0, None));
    }

    #[test]
    fn test_inverted_zoom_bounds_collapse() {
        let config = CanvasConfig {
            min_zoom: 4.0,
            max_zoom: 2.0,
            ..CanvasConfig::default()
        }
        .sanitized();
        assert_eq!((config.min_zoom, config.max_zoom), (4.0, 4.0));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "canvas: [1, 2").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
