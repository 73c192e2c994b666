use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::layout::FitPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn is_vertical(self) -> bool {
        matches!(self, Orientation::Vertical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f32,
    pub mid: f32,
    pub max: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 1.0,
            mid: 1.75,
            max: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Movement below this distance keeps a pointer stream a tap candidate.
    pub touch_slop: f32,
    pub double_tap_timeout_ms: u64,
    pub long_press_timeout_ms: u64,
    /// Pixels per second.
    pub min_fling_velocity: f32,
    pub double_tap_enabled: bool,
    pub long_press_enabled: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            double_tap_timeout_ms: 300,
            long_press_timeout_ms: 500,
            min_fling_velocity: 50.0,
            double_tap_enabled: true,
            long_press_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub tile_size: f32,
    pub thumbnail_ratio: f32,
    pub preload_offset: f32,
    pub cache_capacity: usize,
    pub thumbnail_capacity: usize,
    pub best_quality: bool,
    pub annotation_rendering: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_size: 256.0,
            thumbnail_ratio: 0.3,
            preload_offset: 20.0,
            cache_capacity: 120,
            thumbnail_capacity: 8,
            best_quality: false,
            annotation_rendering: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub zoom: ZoomConfig,
    pub spacing: f32,
    /// Pads every page to the viewport length so each one sits centered on its own.
    pub auto_spacing: bool,
    pub fit_policy: FitPolicy,
    pub fit_each_page: bool,
    pub orientation: Orientation,
    pub page_snap: bool,
    pub page_fling: bool,
    pub animation_ms: u64,
    pub stamp_size: f32,
    pub handle_radius: f32,
    pub gestures: GestureConfig,
    pub render: RenderConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            spacing: 0.0,
            auto_spacing: false,
            fit_policy: FitPolicy::Width,
            fit_each_page: false,
            orientation: Orientation::Vertical,
            page_snap: false,
            page_fling: false,
            animation_ms: 400,
            stamp_size: 20.0,
            handle_radius: 10.0,
            gestures: GestureConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: ViewerConfig = toml::from_str(raw).context("failed to parse viewer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config file {:?}", path))
    }

    pub fn validate(&self) -> std::result::Result<(), ViewerError> {
        let zoom = &self.zoom;
        if !(zoom.min > 0.0 && zoom.min <= zoom.mid && zoom.mid <= zoom.max) {
            return Err(ViewerError::Config(format!(
                "zoom levels must satisfy 0 < min <= mid <= max (got {}/{}/{})",
                zoom.min, zoom.mid, zoom.max
            )));
        }
        if self.render.tile_size <= 0.0 {
            return Err(ViewerError::Config("tile_size must be positive".into()));
        }
        if !(self.render.thumbnail_ratio > 0.0 && self.render.thumbnail_ratio <= 1.0) {
            return Err(ViewerError::Config(
                "thumbnail_ratio must be within (0, 1]".into(),
            ));
        }
        if self.spacing < 0.0 {
            return Err(ViewerError::Config("spacing cannot be negative".into()));
        }
        Ok(())
    }
}
